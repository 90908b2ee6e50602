//! # Stride Decimation
//!
//! "Does this unit run on this tick?" for work that only needs to run once
//! every `stride` ticks.
//!
//! A unit runs when `(tick + mix64(stable_id)) mod stride == 0`. Units with
//! the same stride but different ids land on different ticks, so a stride-8
//! population spreads evenly instead of firing in one burst every eighth
//! tick. The answer depends only on `(tick, stable_id, stride)`: never on
//! iteration order, wall-clock time or thread identity.
//!
//! `tick` is the global simulation tick. Subsystems that share a stable-id
//! space but should not fire in lockstep use a [`StrideDomain`] with their
//! own salt instead of a local tick counter.
//!
//! `stable_id` must itself be deterministic (content-defined), never an
//! address or an allocation index.

use crate::hash::{combine, mix64};

/// Offset of `stable_id` within a stride cycle, in `[0, stride)`.
#[inline]
#[must_use]
pub const fn phase_offset(stable_id: u64, stride: u32) -> u64 {
    if stride <= 1 {
        return 0;
    }
    mix64(stable_id) % stride as u64
}

/// Returns true if the unit runs on `tick`. Always true for `stride <= 1`.
#[inline]
#[must_use]
pub const fn should_run(tick: u64, stable_id: u64, stride: u32) -> bool {
    if stride <= 1 {
        return true;
    }
    let stride = stride as u64;
    // Reduced first so the sum cannot wrap: equals (tick + h) mod stride.
    (tick % stride + mix64(stable_id) % stride) % stride == 0
}

/// First tick `>= tick` on which the unit runs.
#[inline]
#[must_use]
pub const fn next_run_tick(tick: u64, stable_id: u64, stride: u32) -> u64 {
    if stride <= 1 {
        return tick;
    }
    let stride = stride as u64;
    let residue = (tick % stride + mix64(stable_id) % stride) % stride;
    if residue == 0 {
        tick
    } else {
        tick.saturating_add(stride - residue)
    }
}

/// Stride decimation with a per-subsystem salt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StrideDomain {
    salt: u64,
}

impl StrideDomain {
    /// Creates a domain. Salt `0` behaves like the unsalted functions.
    #[inline]
    #[must_use]
    pub const fn new(salt: u64) -> Self {
        Self { salt }
    }

    /// The salt.
    #[inline]
    #[must_use]
    pub const fn salt(&self) -> u64 {
        self.salt
    }

    /// Salted id fed into the unsalted functions.
    #[inline]
    #[must_use]
    pub const fn salted_id(&self, stable_id: u64) -> u64 {
        if self.salt == 0 {
            stable_id
        } else {
            combine(self.salt, stable_id)
        }
    }

    /// [`should_run`] for this domain.
    #[inline]
    #[must_use]
    pub const fn should_run(&self, tick: u64, stable_id: u64, stride: u32) -> bool {
        should_run(tick, self.salted_id(stable_id), stride)
    }

    /// [`next_run_tick`] for this domain.
    #[inline]
    #[must_use]
    pub const fn next_run_tick(&self, tick: u64, stable_id: u64, stride: u32) -> u64 {
        next_run_tick(tick, self.salted_id(stable_id), stride)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_one_always_runs() {
        for tick in [0u64, 1, 17, u64::MAX] {
            for id in [0u64, 5, u64::MAX] {
                assert!(should_run(tick, id, 1));
                assert!(should_run(tick, id, 0));
            }
        }
    }

    #[test]
    fn test_exactly_once_per_window() {
        for stride in [2u32, 3, 7, 16, 60] {
            for id in 0..64u64 {
                for start in [0u64, 1, 1000, u64::MAX - 200] {
                    let runs = (start..start + u64::from(stride))
                        .filter(|&t| should_run(t, id, stride))
                        .count();
                    assert_eq!(runs, 1, "stride {stride} id {id} start {start}");
                }
            }
        }
    }

    #[test]
    fn test_ids_spread_across_ticks() {
        let stride = 8;
        let mut per_tick = [0u32; 8];
        for id in 0..800u64 {
            per_tick[phase_offset(id, stride) as usize] += 1;
        }
        // No tick gets the whole population.
        assert!(per_tick.iter().all(|&n| n > 0 && n < 800));
    }

    #[test]
    fn test_next_run_tick_agrees() {
        for id in 0..32u64 {
            let next = next_run_tick(100, id, 5);
            assert!((100..105).contains(&next));
            assert!(should_run(next, id, 5));
            assert!((100..next).all(|t| !should_run(t, id, 5)));
        }
    }

    #[test]
    fn test_salt_changes_schedule_deterministically() {
        let a = StrideDomain::new(0xA11CE);
        let b = StrideDomain::new(0xB0B);
        let differs = (0..64u64).any(|id| a.next_run_tick(0, id, 16) != b.next_run_tick(0, id, 16));
        assert!(differs);
        assert_eq!(a.next_run_tick(0, 9, 16), StrideDomain::new(0xA11CE).next_run_tick(0, 9, 16));
        assert_eq!(StrideDomain::new(0).should_run(3, 9, 4), should_run(3, 9, 4));
    }
}
