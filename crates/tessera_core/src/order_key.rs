//! # Order Keys
//!
//! Canonical total order over simulation mutations.
//!
//! A key is the tuple
//! `(phase, domain_id, chunk_id, entity_id, component_id, type_id, sequence)`
//! compared lexicographically in exactly that field order. `sequence` is a
//! per-producer monotonic counter and only ever breaks the final tie.
//!
//! Sorting a tick's mutations by key makes the application order a function
//! of the mutations themselves, not of which worker produced them first.
//! Ties are never special-cased: two keys compare equal only when every
//! field is equal, and then the mutations must be interchangeable.

use std::cmp::Ordering;

use crate::tlv;

/// Coarse scheduler stage. A small ordinal.
///
/// Values at or above [`Phase::COUNT`] can be constructed (they may arrive
/// from persisted data) but are ignored by the phase counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Phase(pub u8);

impl Phase {
    /// External input is applied.
    pub const INPUT: Self = Self(0);
    /// Work that must see the tick's inputs before simulation.
    pub const PRE_SIMULATION: Self = Self(1);
    /// Main simulation mutations.
    pub const SIMULATION: Self = Self(2);
    /// Reactions to this tick's simulation results.
    pub const POST_SIMULATION: Self = Self(3);
    /// End-of-tick bookkeeping.
    pub const FINALIZE: Self = Self(4);

    /// Number of valid phases.
    pub const COUNT: usize = 5;

    /// Every valid phase in execution order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::INPUT,
        Self::PRE_SIMULATION,
        Self::SIMULATION,
        Self::POST_SIMULATION,
        Self::FINALIZE,
    ];

    /// Counter index, or `None` when out of range.
    #[inline]
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        if (self.0 as usize) < Self::COUNT {
            Some(self.0 as usize)
        } else {
            None
        }
    }
}

/// Framed mutation header as it arrives from a producer.
///
/// Carries everything an [`OrderKey`] needs except `phase` and
/// `component_id`, which the consumer supplies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MutationHeader {
    /// Domain (world, instance, shard).
    pub domain_id: u64,
    /// Spatial chunk.
    pub chunk_id: u64,
    /// Target entity.
    pub entity_id: u64,
    /// Mutation type.
    pub type_id: u32,
    /// Producer sequence number.
    pub sequence: u32,
}

impl MutationHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 32;

    /// Encodes little-endian.
    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..8].copy_from_slice(&self.domain_id.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.chunk_id.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.entity_id.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.type_id.to_le_bytes());
        bytes[28..32].copy_from_slice(&self.sequence.to_le_bytes());
        bytes
    }

    /// Decodes little-endian.
    #[must_use]
    pub fn from_le_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let word64 = |at| tlv::u64_at(bytes, at).unwrap_or_default();
        let word32 = |at| tlv::u32_at(bytes, at).unwrap_or_default();
        Self {
            domain_id: word64(0),
            chunk_id: word64(8),
            entity_id: word64(16),
            type_id: word32(24),
            sequence: word32(28),
        }
    }
}

/// Immutable composite ordering key.
///
/// Field declaration order is the comparison order; the derived `Ord` is
/// the canonical comparator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    phase: Phase,
    domain_id: u64,
    chunk_id: u64,
    entity_id: u64,
    component_id: u32,
    type_id: u32,
    sequence: u32,
}

impl OrderKey {
    /// The cleared key: every field at its zero sentinel.
    pub const CLEARED: Self = Self {
        phase: Phase(0),
        domain_id: 0,
        chunk_id: 0,
        entity_id: 0,
        component_id: 0,
        type_id: 0,
        sequence: 0,
    };

    /// Builds a key verbatim from its fields.
    #[inline]
    #[must_use]
    pub const fn new(
        phase: Phase,
        domain_id: u64,
        chunk_id: u64,
        entity_id: u64,
        component_id: u32,
        type_id: u32,
        sequence: u32,
    ) -> Self {
        Self {
            phase,
            domain_id,
            chunk_id,
            entity_id,
            component_id,
            type_id,
            sequence,
        }
    }

    /// Builds a key from an already-framed header.
    #[inline]
    #[must_use]
    pub const fn from_header(header: &MutationHeader, phase: Phase, component_id: u32) -> Self {
        Self::new(
            phase,
            header.domain_id,
            header.chunk_id,
            header.entity_id,
            component_id,
            header.type_id,
            header.sequence,
        )
    }

    /// Resets every field to its zero sentinel.
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::CLEARED;
    }

    /// Phase.
    #[inline]
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Domain id.
    #[inline]
    #[must_use]
    pub const fn domain_id(&self) -> u64 {
        self.domain_id
    }

    /// Chunk id.
    #[inline]
    #[must_use]
    pub const fn chunk_id(&self) -> u64 {
        self.chunk_id
    }

    /// Entity id.
    #[inline]
    #[must_use]
    pub const fn entity_id(&self) -> u64 {
        self.entity_id
    }

    /// Component id.
    #[inline]
    #[must_use]
    pub const fn component_id(&self) -> u32 {
        self.component_id
    }

    /// Type id.
    #[inline]
    #[must_use]
    pub const fn type_id(&self) -> u32 {
        self.type_id
    }

    /// Producer sequence.
    #[inline]
    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Folds every field into a 64-bit digest, in comparison order.
    #[must_use]
    pub const fn digest(&self) -> u64 {
        use crate::hash::combine;
        let mut acc = combine(0, self.phase.0 as u64);
        acc = combine(acc, self.domain_id);
        acc = combine(acc, self.chunk_id);
        acc = combine(acc, self.entity_id);
        acc = combine(acc, self.component_id as u64);
        acc = combine(acc, self.type_id as u64);
        combine(acc, self.sequence as u64)
    }
}

/// Compares two possibly-absent keys. Absent keys sort first.
#[inline]
#[must_use]
pub fn compare(a: Option<&OrderKey>, b: Option<&OrderKey>) -> Ordering {
    a.cmp(&b)
}
