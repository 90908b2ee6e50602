//! # TESSERA Replay
//!
//! Recording, persisting and verifying deterministic runs.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐  attach   ┌────────────────┐  write  ┌─────────────┐
//! │ ReplayStream │ ────────▶ │ ReplayRecorder │ ──────▶ │ replay file │
//! └──────────────┘  detach   └────────────────┘  read   └─────────────┘
//!         │                                                   │
//!         └──────────────────── verify ◀──────────────────────┘
//! ```
//!
//! A run that is fed the inputs of a recorded stream must reproduce its
//! hash snapshots and tick summaries exactly. [`verify`] reports the first
//! record where it did not.
//!
//! ## Example
//!
//! ```rust
//! use tessera_replay::{verify, Compression, ReplayRecorder, ReplayStream};
//!
//! let mut recorder = ReplayRecorder::new();
//! recorder.attach(ReplayStream::new(42));
//! recorder.record_hash_snapshot(0, 0x1234);
//! let stream = recorder.detach().unwrap_or_default();
//!
//! let mut file = Vec::new();
//! tessera_replay::write(&stream, &mut file, Compression::Lz4).unwrap();
//! let loaded = tessera_replay::read(&mut file.as_slice()).unwrap();
//! assert!(verify(&stream, &loaded).is_identical());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod file;
pub mod record;
pub mod stream;
pub mod verify;

pub use error::{ReplayError, ReplayResult};
pub use file::{read, write, Compression, ReplayFileHeader, MAX_REPLAY_BODY, REPLAY_MAGIC, REPLAY_VERSION};
pub use record::{InputHeader, ProbeSample, ReplayRecord, MAX_PROBE_BYTES};
pub use stream::{ReplayRecorder, ReplayStream};
pub use verify::{verify, Divergence, DivergenceKind, Verification};
