//! # TESSERA
//!
//! Deterministic tick driver built on [`tessera_core`] and
//! [`tessera_replay`].
//!
//! ## Session Lifecycle
//!
//! 1. Load a [`KernelConfig`] (TOML or defaults)
//! 2. Populate a [`ContentRegistry`], then freeze it
//! 3. Build a [`TickDriver`] over the frozen registry
//! 4. Call [`TickDriver::run_tick`] with each tick's external inputs
//! 5. Detach the replay stream and persist it with [`tessera_replay::write`]
//!
//! A recorded stream is checked by re-running it with [`rerun`] and
//! comparing the two with [`tessera_replay::verify`].
//!
//! ## Example
//!
//! ```rust
//! use tessera::{rerun, ContentRegistry, ContentUnit, KernelConfig, TickDriver};
//! use tessera_core::Phase;
//!
//! let mut registry = ContentRegistry::new();
//! registry.register(ContentUnit::new(1, Phase::SIMULATION, 7).with_stride(2))?;
//! registry.freeze();
//!
//! let config = KernelConfig::default();
//! let mut driver = TickDriver::new(config.clone(), &registry)?;
//! driver.run_idle(8)?;
//! let recorded = driver.detach_replay().unwrap_or_default();
//!
//! let replayed = rerun(&config, &registry, &recorded)?;
//! assert!(tessera_replay::verify(&recorded, &replayed).is_identical());
//! # Ok::<(), tessera::TesseraError>(())
//! ```
//!
//! ## Logging
//!
//! The driver logs through `tracing` and never installs a subscriber.
//! `tessera_core` and `tessera_replay` do not log.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod driver;
pub mod error;
pub mod registry;

pub use config::{KernelConfig, ReplayConfig};
pub use driver::{rerun, CarryoverQueue, TickDriver, TickInput, TickReport, PROBE_CARRYOVER};
pub use error::{ConfigError, TesseraError, TesseraResult};
pub use registry::{ContentRegistry, ContentUnit};
