//! # TESSERA Error Types
//!
//! All errors the driver surfaces. Kernel and replay errors pass through
//! unchanged.

use std::path::PathBuf;

use thiserror::Error;

use tessera_core::KernelError;
use tessera_replay::ReplayError;

/// Errors from loading or validating a [`crate::KernelConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The TOML did not parse or had unknown fields.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Errors that can occur while building or running a session.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Kernel rejected an operation.
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// Replay persistence failed.
    #[error(transparent)]
    Replay(#[from] ReplayError),

    /// Registration attempted after [`crate::ContentRegistry::freeze`].
    #[error("content registry is frozen")]
    RegistryFrozen,

    /// A query or driver needed a frozen registry.
    #[error("content registry is not frozen")]
    RegistryNotFrozen,

    /// Two units share a stable id.
    #[error("duplicate content unit {0:#x}")]
    DuplicateUnit(u64),

    /// Two units would emit work under the same order key.
    #[error("content unit {stable_id:#x} targets the same slot as unit {existing:#x}")]
    KeyCollision {
        /// Unit being registered.
        stable_id: u64,
        /// Unit already holding the slot.
        existing: u64,
    },

    /// A unit cannot be scheduled.
    #[error("content unit {stable_id:#x} rejected: {reason}")]
    InvalidUnit {
        /// Offending unit.
        stable_id: u64,
        /// Why.
        reason: &'static str,
    },
}

/// Result type for driver operations.
pub type TesseraResult<T> = Result<T, TesseraError>;
