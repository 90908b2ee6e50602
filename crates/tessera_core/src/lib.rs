//! # TESSERA Core
//!
//! The deterministic simulation kernel. Everything that must produce the
//! same bits on every machine, every build and every replay lives here.
//!
//! ## Architecture Rules
//!
//! 1. **No floating point on a simulation path** - fixed-point only
//! 2. **No hidden state** - no globals, no thread-locals, no clocks
//! 3. **No logging, no panics** - every failure is a returned [`KernelError`]
//! 4. **Single owner per instance** - nothing here synchronises; the thread
//!    running the tick owns the counters, keys and items it touches
//!
//! ## Components (leaf first)
//!
//! | Module          | Purpose                                              |
//! |-----------------|------------------------------------------------------|
//! | [`fixed_point`] | Saturating 4.12 / 16.16 / 24.8 / 48.16 numbers       |
//! | [`hash`]        | 64-bit avalanche mixer                               |
//! | [`rng`]         | Seeded LCG and purpose-isolated stream bundle        |
//! | [`order_key`]   | Canonical total order over mutations                 |
//! | [`stride`]      | Deterministic "run this tick?" decimation            |
//! | [`work_item`]   | Immutable deferred scheduling record                 |
//! | [`counters`]    | Per-tick phase begin/end and delta counters          |
//! | [`tlv`]         | Tag-length-value parameter blobs                     |
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::{should_run, OrderKey, Phase, RngStream, RngStreams, WorkItem};
//!
//! let mut rng = RngStreams::from_root_seed(42);
//! let roll = rng.next_u32(RngStream::Simulation);
//!
//! if should_run(120, 0xC0FFEE, 4) {
//!     let key = OrderKey::new(Phase::SIMULATION, 1, 0, 7, 0, 3, 0);
//!     let item = WorkItem::new(key, 3, 1, 120).with_inline_payload(&roll.to_le_bytes());
//!     assert!(item.is_ok());
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod counters;
pub mod error;
pub mod fixed_point;
pub mod hash;
pub mod order_key;
pub mod rng;
pub mod stride;
pub mod tlv;
pub mod work_item;

pub use counters::{ReplayCounters, TickCounters};
pub use error::{KernelError, KernelResult};
pub use fixed_point::{FixedFormat, Fx16_16, Fx24_8, Fx48_16, Fx4_12};
pub use hash::{combine, hash_bytes, mix64};
pub use order_key::{MutationHeader, OrderKey, Phase};
pub use rng::{DetRng, RngStream, RngStreams};
pub use stride::{next_run_tick, should_run, StrideDomain};
pub use tlv::{TlvReader, TlvRecord, TlvWriter};
pub use work_item::{sort_work_items, WorkItem, INLINE_PAYLOAD_CAPACITY};
