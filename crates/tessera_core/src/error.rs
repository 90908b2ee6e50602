//! # Kernel Error Types
//!
//! Every fallible kernel operation reports one of these. Nothing in the
//! kernel panics, logs, or aborts; the caller decides how loud a failure is.

use thiserror::Error;

/// Errors that can occur in the deterministic kernel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// A zero-sized or otherwise unusable argument to a well-formed call.
    ///
    /// Checked before anything else; the call has no side effects.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Data does not fit a fixed-capacity buffer.
    #[error("capacity exceeded: need {needed} bytes, capacity {capacity}")]
    CapacityExceeded {
        /// Bytes the caller tried to store.
        needed: usize,
        /// Bytes available.
        capacity: usize,
    },

    /// A persisted blob is truncated or points past its own end.
    #[error("malformed data at offset {offset}: {reason}")]
    Malformed {
        /// Byte offset where decoding stopped.
        offset: usize,
        /// What was wrong.
        reason: &'static str,
    },

    /// A scheduler phase was entered and exited a different number of times.
    ///
    /// The tick already ran; its results cannot be trusted for replay
    /// comparison.
    #[error("unbalanced phase {phase} on tick {tick}: {begins} begins, {ends} ends")]
    PhaseImbalance {
        /// Tick the counters belong to.
        tick: u64,
        /// Phase ordinal.
        phase: u8,
        /// `phase_begin` count.
        begins: u32,
        /// `phase_end` count.
        ends: u32,
    },
}

impl KernelError {
    /// Shorthand for a [`KernelError::Malformed`].
    #[inline]
    #[must_use]
    pub const fn malformed(offset: usize, reason: &'static str) -> Self {
        Self::Malformed { offset, reason }
    }
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
