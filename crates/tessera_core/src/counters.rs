//! # Scheduler Replay Counters
//!
//! Per-tick instrumentation: how many times each phase was entered and
//! exited, and how many deltas were committed.
//!
//! Counters reset at every [`ReplayCounters::begin_tick`]; nothing
//! accumulates across ticks. In a valid run every phase has
//! `begins == ends` when the tick closes. An imbalance is a scheduler
//! programming error, surfaced by [`ReplayCounters::check_balanced`] as a
//! diagnostic: the tick has already run.
//!
//! Out-of-range phases are ignored rather than rejected. This is
//! instrumentation, not simulation state.

use bytemuck::{Pod, Zeroable};

use crate::error::{KernelError, KernelResult};
use crate::hash::{combine, hash_bytes};
use crate::order_key::{OrderKey, Phase};

/// Snapshot of one tick's counters, suitable for the replay log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct TickCounters {
    /// Tick these counts belong to.
    pub tick: u64,
    /// Digest of every committed (key, delta) pair, in commit order.
    pub delta_digest: u64,
    /// `phase_begin` calls per phase.
    pub phase_begins: [u32; Phase::COUNT],
    /// `phase_end` calls per phase.
    pub phase_ends: [u32; Phase::COUNT],
    /// Committed deltas this tick.
    pub committed_deltas: u32,
    /// Keeps the struct free of implicit padding.
    pub reserved: u32,
}

impl TickCounters {
    /// Encoded size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// First unbalanced phase, if any.
    #[must_use]
    pub fn first_imbalance(&self) -> Option<Phase> {
        Phase::ALL
            .into_iter()
            .zip(self.phase_begins.iter().zip(&self.phase_ends))
            .find(|(_, (begins, ends))| begins != ends)
            .map(|(phase, _)| phase)
    }

    /// Encodes little-endian, field by field.
    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        let mut at = 0;
        let mut put = |field: &[u8]| {
            bytes[at..at + field.len()].copy_from_slice(field);
            at += field.len();
        };
        put(&self.tick.to_le_bytes());
        put(&self.delta_digest.to_le_bytes());
        for count in self.phase_begins.iter().chain(&self.phase_ends) {
            put(&count.to_le_bytes());
        }
        put(&self.committed_deltas.to_le_bytes());
        put(&self.reserved.to_le_bytes());
        bytes
    }

    /// Decodes what [`Self::to_le_bytes`] produced.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Malformed`] if `bytes` is not exactly
    /// [`Self::SIZE`] long.
    pub fn from_le_bytes(bytes: &[u8]) -> KernelResult<Self> {
        if bytes.len() != Self::SIZE {
            return Err(KernelError::malformed(bytes.len(), "tick counters size"));
        }
        let mut words = bytes.chunks_exact(4).map(|w| {
            let mut word = [0u8; 4];
            word.copy_from_slice(w);
            u32::from_le_bytes(word)
        });
        let mut next = || words.next().unwrap_or(0);
        let mut next_u64 = || u64::from(next()) | (u64::from(next()) << 32);
        let tick = next_u64();
        let delta_digest = next_u64();
        let mut counters = Self {
            tick,
            delta_digest,
            ..Self::default()
        };
        for slot in counters.phase_begins.iter_mut() {
            *slot = next();
        }
        for slot in counters.phase_ends.iter_mut() {
            *slot = next();
        }
        counters.committed_deltas = next();
        counters.reserved = next();
        Ok(counters)
    }
}

/// Live counters for the tick being scheduled.
///
/// Not thread-safe: owned by the thread running the tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayCounters {
    current: TickCounters,
}

impl ReplayCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroes everything, including the tick number.
    pub fn init(&mut self) {
        self.current = TickCounters::default();
    }

    /// Starts `tick`, zeroing every per-tick count.
    pub fn begin_tick(&mut self, tick: u64) {
        self.current = TickCounters {
            tick,
            ..TickCounters::default()
        };
    }

    /// Counts a phase entry. Out-of-range phases are ignored.
    pub fn phase_begin(&mut self, phase: Phase) {
        if let Some(index) = phase.index() {
            self.current.phase_begins[index] = self.current.phase_begins[index].wrapping_add(1);
        }
    }

    /// Counts a phase exit. Out-of-range phases are ignored.
    pub fn phase_end(&mut self, phase: Phase) {
        if let Some(index) = phase.index() {
            self.current.phase_ends[index] = self.current.phase_ends[index].wrapping_add(1);
        }
    }

    /// Counts a committed delta and folds `(key, delta)` into the digest.
    pub fn record_committed_delta(&mut self, key: &OrderKey, delta: &[u8]) {
        self.current.committed_deltas = self.current.committed_deltas.wrapping_add(1);
        let entry = combine(key.digest(), hash_bytes(delta));
        self.current.delta_digest = combine(self.current.delta_digest, entry);
    }

    /// Current tick.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.current.tick
    }

    /// Begin count for a phase; zero when out of range.
    #[must_use]
    pub fn begin_count(&self, phase: Phase) -> u32 {
        phase.index().map_or(0, |i| self.current.phase_begins[i])
    }

    /// End count for a phase; zero when out of range.
    #[must_use]
    pub fn end_count(&self, phase: Phase) -> u32 {
        phase.index().map_or(0, |i| self.current.phase_ends[i])
    }

    /// Committed deltas this tick.
    #[inline]
    #[must_use]
    pub const fn committed_deltas(&self) -> u32 {
        self.current.committed_deltas
    }

    /// Snapshot for the replay log.
    #[inline]
    #[must_use]
    pub const fn snapshot(&self) -> TickCounters {
        self.current
    }

    /// Checks that every phase was exited as often as it was entered.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::PhaseImbalance`] for the first unbalanced phase.
    pub fn check_balanced(&self) -> KernelResult<()> {
        match self.current.first_imbalance() {
            None => Ok(()),
            Some(phase) => {
                let index = usize::from(phase.0);
                Err(KernelError::PhaseImbalance {
                    tick: self.current.tick,
                    phase: phase.0,
                    begins: self.current.phase_begins[index],
                    ends: self.current.phase_ends[index],
                })
            }
        }
    }
}
