//! # Replay Records
//!
//! The four record kinds a replay stream holds, and their byte encoding.
//!
//! Each record is stored as one TLV record: the tag is the record kind, the
//! payload is the record's fields, little-endian, in declaration order.
//!
//! ```text
//! HASH_SNAPSHOT  tick:u64 hash:u64
//! INPUT_PACKET   tick:u64 source_id:u32 kind:u32 sequence:u32 payload[..]
//! PROBE          tick:u64 probe_id:u32 data[..]
//! TICK_SUMMARY   TickCounters (64 bytes)
//! ```

use tessera_core::{tlv, KernelError, KernelResult, TickCounters};

use crate::error::{ReplayError, ReplayResult};

/// Record tag: full-state hash.
pub const TAG_HASH_SNAPSHOT: u32 = 1;
/// Record tag: captured external input.
pub const TAG_INPUT_PACKET: u32 = 2;
/// Record tag: diagnostic probe sample.
pub const TAG_PROBE: u32 = 3;
/// Record tag: per-tick scheduler counters.
pub const TAG_TICK_SUMMARY: u32 = 4;

/// Largest probe sample body accepted by a recorder.
pub const MAX_PROBE_BYTES: usize = 256;

/// Framing of a captured input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct InputHeader {
    /// Who produced it (player slot, network peer, tool).
    pub source_id: u32,
    /// Input kind, interpreted by the consumer.
    pub kind: u32,
    /// Producer sequence number.
    pub sequence: u32,
}

impl InputHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 12;

    /// Creates a header.
    #[must_use]
    pub const fn new(source_id: u32, kind: u32, sequence: u32) -> Self {
        Self {
            source_id,
            kind,
            sequence,
        }
    }
}

/// Free-form diagnostic sample. Never used for correctness.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProbeSample {
    /// Tick it was taken on.
    pub tick: u64,
    /// What was probed.
    pub probe_id: u32,
    /// Sample bytes (at most [`MAX_PROBE_BYTES`] when recorded).
    pub data: Vec<u8>,
}

/// One entry of a replay stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplayRecord {
    /// Full-state hash for divergence detection.
    HashSnapshot {
        /// Tick hashed.
        tick: u64,
        /// Opaque state hash.
        hash: u64,
    },
    /// Nondeterministic input consumed by the simulation.
    InputPacket {
        /// Tick it was applied on.
        tick: u64,
        /// Input framing.
        header: InputHeader,
        /// Input bytes, replayed verbatim.
        payload: Vec<u8>,
    },
    /// Diagnostic sample.
    Probe(ProbeSample),
    /// Scheduler counters at tick close.
    TickSummary(TickCounters),
}

impl ReplayRecord {
    /// Tick the record belongs to.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        match self {
            Self::HashSnapshot { tick, .. } | Self::InputPacket { tick, .. } => *tick,
            Self::Probe(sample) => sample.tick,
            Self::TickSummary(counters) => counters.tick,
        }
    }

    /// TLV tag for this record kind.
    #[must_use]
    pub const fn tag(&self) -> u32 {
        match self {
            Self::HashSnapshot { .. } => TAG_HASH_SNAPSHOT,
            Self::InputPacket { .. } => TAG_INPUT_PACKET,
            Self::Probe(_) => TAG_PROBE,
            Self::TickSummary(_) => TAG_TICK_SUMMARY,
        }
    }

    /// Returns true for records that take part in verification.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        !matches!(self, Self::Probe(_))
    }

    /// Appends the record as one TLV record.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::CapacityExceeded`] if the body does not fit a
    /// TLV length.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> KernelResult<()> {
        let mut body = Vec::with_capacity(32);
        match self {
            Self::HashSnapshot { tick, hash } => {
                body.extend_from_slice(&tick.to_le_bytes());
                body.extend_from_slice(&hash.to_le_bytes());
            }
            Self::InputPacket {
                tick,
                header,
                payload,
            } => {
                body.extend_from_slice(&tick.to_le_bytes());
                body.extend_from_slice(&header.source_id.to_le_bytes());
                body.extend_from_slice(&header.kind.to_le_bytes());
                body.extend_from_slice(&header.sequence.to_le_bytes());
                body.extend_from_slice(payload);
            }
            Self::Probe(sample) => {
                body.extend_from_slice(&sample.tick.to_le_bytes());
                body.extend_from_slice(&sample.probe_id.to_le_bytes());
                body.extend_from_slice(&sample.data);
            }
            Self::TickSummary(counters) => {
                body.extend_from_slice(&counters.to_le_bytes());
            }
        }
        tlv::append_record(out, self.tag(), &body)
    }

    /// Decodes one record from its TLV tag and payload.
    ///
    /// # Errors
    ///
    /// [`ReplayError::UnknownRecord`] for an unknown tag,
    /// [`ReplayError::Kernel`] for a body of the wrong size.
    pub fn decode(tag: u32, body: &[u8]) -> ReplayResult<Self> {
        let too_short = |reason| ReplayError::Kernel(KernelError::malformed(0, reason));
        let word64 = |at| tlv::u64_at(body, at).unwrap_or_default();
        let word32 = |at| tlv::u32_at(body, at).unwrap_or_default();
        match tag {
            TAG_HASH_SNAPSHOT => {
                if body.len() != 16 {
                    return Err(too_short("hash snapshot must be 16 bytes"));
                }
                Ok(Self::HashSnapshot {
                    tick: word64(0),
                    hash: word64(8),
                })
            }
            TAG_INPUT_PACKET => {
                if body.len() < 8 + InputHeader::SIZE {
                    return Err(too_short("input packet shorter than its header"));
                }
                Ok(Self::InputPacket {
                    tick: word64(0),
                    header: InputHeader::new(word32(8), word32(12), word32(16)),
                    payload: body[8 + InputHeader::SIZE..].to_vec(),
                })
            }
            TAG_PROBE => {
                if body.len() < 12 {
                    return Err(too_short("probe shorter than its header"));
                }
                Ok(Self::Probe(ProbeSample {
                    tick: word64(0),
                    probe_id: word32(8),
                    data: body[12..].to_vec(),
                }))
            }
            TAG_TICK_SUMMARY => Ok(Self::TickSummary(TickCounters::from_le_bytes(body)?)),
            other => Err(ReplayError::UnknownRecord(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::TlvReader;

    fn decode_one(bytes: &[u8]) -> ReplayRecord {
        let record = TlvReader::new(bytes).next().unwrap().unwrap();
        ReplayRecord::decode(record.tag, record.payload).unwrap()
    }

    #[test]
    fn test_hash_snapshot_layout() {
        let record = ReplayRecord::HashSnapshot { tick: 3, hash: 0xAB };
        let mut out = Vec::new();
        record.encode_into(&mut out).unwrap();
        assert_eq!(out.len(), 8 + 16);
        assert_eq!(&out[0..4], &TAG_HASH_SNAPSHOT.to_le_bytes());
        assert_eq!(&out[4..8], &16u32.to_le_bytes());
        assert_eq!(decode_one(&out), record);
    }

    #[test]
    fn test_input_packet_with_empty_payload() {
        let record = ReplayRecord::InputPacket {
            tick: 10,
            header: InputHeader::new(1, 2, 3),
            payload: Vec::new(),
        };
        let mut out = Vec::new();
        record.encode_into(&mut out).unwrap();
        assert_eq!(decode_one(&out), record);
    }

    #[test]
    fn test_short_bodies_rejected() {
        assert!(ReplayRecord::decode(TAG_HASH_SNAPSHOT, &[0; 15]).is_err());
        assert!(ReplayRecord::decode(TAG_INPUT_PACKET, &[0; 19]).is_err());
        assert!(ReplayRecord::decode(TAG_PROBE, &[0; 11]).is_err());
        assert!(ReplayRecord::decode(TAG_TICK_SUMMARY, &[0; 63]).is_err());
        assert!(matches!(
            ReplayRecord::decode(99, &[]),
            Err(ReplayError::UnknownRecord(99))
        ));
    }

    #[test]
    fn test_tick_and_verification_flags() {
        let probe = ReplayRecord::Probe(ProbeSample {
            tick: 4,
            probe_id: 1,
            data: vec![1],
        });
        assert_eq!(probe.tick(), 4);
        assert!(!probe.is_verified());
        let summary = ReplayRecord::TickSummary(TickCounters {
            tick: 8,
            ..TickCounters::default()
        });
        assert_eq!(summary.tick(), 8);
        assert!(summary.is_verified());
    }
}
