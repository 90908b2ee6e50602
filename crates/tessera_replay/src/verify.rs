//! # Replay Verification
//!
//! Offline comparison of two replay streams. Probe records are diagnostic
//! and skipped on both sides; every other record must match exactly and in
//! the same order.

use crate::record::ReplayRecord;
use crate::stream::ReplayStream;

/// What differed at the first divergent record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DivergenceKind {
    /// Streams were recorded from different root seeds.
    RootSeed {
        /// Seed of the expected run.
        expected: u32,
        /// Seed of the actual run.
        actual: u32,
    },
    /// Same position holds different record kinds.
    RecordKind {
        /// Tag expected.
        expected: u32,
        /// Tag found.
        actual: u32,
    },
    /// State hashes differ.
    Hash {
        /// Hash expected.
        expected: u64,
        /// Hash found.
        actual: u64,
    },
    /// An input packet differs in tick, header or payload.
    Input,
    /// Tick counters differ.
    Summary,
    /// A hash snapshot with the same hash was taken on a different tick.
    Tick {
        /// Tick expected.
        expected: u64,
        /// Tick found.
        actual: u64,
    },
    /// The actual stream ended early.
    MissingRecords,
    /// The actual stream has records past the end of the expected one.
    ExtraRecords,
}

/// First point where two streams disagree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Divergence {
    /// Index among verified (non-probe) records.
    pub index: usize,
    /// Tick of the expected record, or of the actual one past its end.
    pub tick: u64,
    /// What differed.
    pub kind: DivergenceKind,
}

/// Outcome of [`verify`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verification {
    /// Every verified record matched.
    Identical {
        /// Number of records compared.
        compared: usize,
    },
    /// The first mismatch.
    Diverged(Divergence),
}

impl Verification {
    /// Returns true if the streams matched.
    #[must_use]
    pub const fn is_identical(&self) -> bool {
        matches!(self, Self::Identical { .. })
    }

    /// The divergence, if any.
    #[must_use]
    pub const fn divergence(&self) -> Option<&Divergence> {
        match self {
            Self::Identical { .. } => None,
            Self::Diverged(divergence) => Some(divergence),
        }
    }
}

fn compare_records(expected: &ReplayRecord, actual: &ReplayRecord) -> Option<DivergenceKind> {
    if expected.tag() != actual.tag() {
        return Some(DivergenceKind::RecordKind {
            expected: expected.tag(),
            actual: actual.tag(),
        });
    }
    match (expected, actual) {
        (
            ReplayRecord::HashSnapshot { tick: et, hash: eh },
            ReplayRecord::HashSnapshot { tick: at, hash: ah },
        ) => {
            if eh != ah {
                Some(DivergenceKind::Hash {
                    expected: *eh,
                    actual: *ah,
                })
            } else if et != at {
                Some(DivergenceKind::Tick {
                    expected: *et,
                    actual: *at,
                })
            } else {
                None
            }
        }
        (ReplayRecord::InputPacket { .. }, ReplayRecord::InputPacket { .. }) => {
            (expected != actual).then_some(DivergenceKind::Input)
        }
        (ReplayRecord::TickSummary(e), ReplayRecord::TickSummary(a)) => {
            (e != a).then_some(DivergenceKind::Summary)
        }
        _ => None,
    }
}

/// Compares `actual` against `expected` and reports the first divergence.
#[must_use]
pub fn verify(expected: &ReplayStream, actual: &ReplayStream) -> Verification {
    if expected.root_seed() != actual.root_seed() {
        return Verification::Diverged(Divergence {
            index: 0,
            tick: 0,
            kind: DivergenceKind::RootSeed {
                expected: expected.root_seed(),
                actual: actual.root_seed(),
            },
        });
    }

    let mut left = expected.records().iter().filter(|r| r.is_verified());
    let mut right = actual.records().iter().filter(|r| r.is_verified());
    let mut index = 0;

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Verification::Identical { compared: index },
            (Some(e), None) => {
                return Verification::Diverged(Divergence {
                    index,
                    tick: e.tick(),
                    kind: DivergenceKind::MissingRecords,
                })
            }
            (None, Some(a)) => {
                return Verification::Diverged(Divergence {
                    index,
                    tick: a.tick(),
                    kind: DivergenceKind::ExtraRecords,
                })
            }
            (Some(e), Some(a)) => {
                if let Some(kind) = compare_records(e, a) {
                    return Verification::Diverged(Divergence {
                        index,
                        tick: e.tick(),
                        kind,
                    });
                }
            }
        }
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{InputHeader, ProbeSample};

    fn run(hashes: &[u64]) -> ReplayStream {
        let mut stream = ReplayStream::new(9);
        for (tick, hash) in hashes.iter().enumerate() {
            let tick = tick as u64;
            stream.push(ReplayRecord::InputPacket {
                tick,
                header: InputHeader::new(0, 1, tick as u32),
                payload: vec![tick as u8],
            });
            stream.push(ReplayRecord::HashSnapshot { tick, hash: *hash });
        }
        stream
    }

    #[test]
    fn test_identical_streams() {
        let a = run(&[1, 2, 3]);
        let result = verify(&a, &a.clone());
        assert_eq!(result, Verification::Identical { compared: 6 });
        assert!(result.is_identical());
    }

    #[test]
    fn test_probes_ignored() {
        let a = run(&[1, 2]);
        let mut b = a.clone();
        b.push(ReplayRecord::Probe(ProbeSample {
            tick: 1,
            probe_id: 5,
            data: vec![1, 2, 3],
        }));
        assert!(verify(&a, &b).is_identical());
        assert!(verify(&b, &a).is_identical());
    }

    #[test]
    fn test_hash_divergence_reported_at_first_mismatch() {
        let result = verify(&run(&[1, 2, 3, 4]), &run(&[1, 2, 30, 40]));
        let divergence = result.divergence().unwrap();
        assert_eq!(divergence.index, 5);
        assert_eq!(divergence.tick, 2);
        assert_eq!(
            divergence.kind,
            DivergenceKind::Hash {
                expected: 3,
                actual: 30
            }
        );
    }

    #[test]
    fn test_length_mismatch() {
        let short = run(&[1]);
        let long = run(&[1, 2]);
        assert_eq!(
            verify(&long, &short).divergence().map(|d| d.kind.clone()),
            Some(DivergenceKind::MissingRecords)
        );
        assert_eq!(
            verify(&short, &long).divergence().map(|d| d.kind.clone()),
            Some(DivergenceKind::ExtraRecords)
        );
    }

    #[test]
    fn test_seed_and_kind_mismatch() {
        let a = run(&[1]);
        let mut b = ReplayStream::new(10);
        assert!(matches!(
            verify(&a, &b).divergence().map(|d| &d.kind),
            Some(DivergenceKind::RootSeed { .. })
        ));

        b = ReplayStream::new(9);
        b.push(ReplayRecord::HashSnapshot { tick: 0, hash: 1 });
        assert!(matches!(
            verify(&a, &b).divergence().map(|d| &d.kind),
            Some(DivergenceKind::RecordKind { .. })
        ));
    }
}
