//! # Work Items
//!
//! Immutable deferred scheduling records.
//!
//! A work item carries an [`OrderKey`], a work-type tag, an opaque cost, the
//! tick it was enqueued on, and a payload that is **either** a small inline
//! buffer owned by the item **or** a borrow of scheduler-owned memory. The
//! two modes are a sum type, so "both valid at once" cannot be expressed.
//!
//! Items that are not consumed before the tick ends are moved, unchanged,
//! into a carryover queue. The borrow's lifetime ties referenced payloads to
//! the memory the scheduler keeps alive across ticks.

use crate::error::{KernelError, KernelResult};
use crate::hash::{combine, hash_bytes};
use crate::order_key::OrderKey;

/// Bytes an item can store inline.
pub const INLINE_PAYLOAD_CAPACITY: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Payload<'a> {
    Inline {
        len: u8,
        bytes: [u8; INLINE_PAYLOAD_CAPACITY],
    },
    External(&'a [u8]),
}

impl Payload<'_> {
    const EMPTY: Self = Self::Inline {
        len: 0,
        bytes: [0; INLINE_PAYLOAD_CAPACITY],
    };
}

/// Deferred unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkItem<'a> {
    key: OrderKey,
    work_type: u32,
    cost: u32,
    enqueue_tick: u64,
    payload: Payload<'a>,
}

impl<'a> WorkItem<'a> {
    /// Creates an item with an empty inline payload.
    #[inline]
    #[must_use]
    pub const fn new(key: OrderKey, work_type: u32, cost: u32, enqueue_tick: u64) -> Self {
        Self {
            key,
            work_type,
            cost,
            enqueue_tick,
            payload: Payload::EMPTY,
        }
    }

    /// Resets every field, zeroing the inline buffer.
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::new(OrderKey::CLEARED, 0, 0, 0);
    }

    /// Points the payload at external memory; inline state is cleared.
    #[inline]
    pub fn set_payload_ref(&mut self, data: &'a [u8]) {
        self.payload = Payload::External(data);
    }

    /// Copies `data` inline; reference state is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::CapacityExceeded`] if `data` is longer than
    /// [`INLINE_PAYLOAD_CAPACITY`]. The item is left unchanged.
    pub fn set_payload_inline(&mut self, data: &[u8]) -> KernelResult<()> {
        if data.len() > INLINE_PAYLOAD_CAPACITY {
            return Err(KernelError::CapacityExceeded {
                needed: data.len(),
                capacity: INLINE_PAYLOAD_CAPACITY,
            });
        }
        let mut bytes = [0u8; INLINE_PAYLOAD_CAPACITY];
        bytes[..data.len()].copy_from_slice(data);
        self.payload = Payload::Inline {
            len: data.len() as u8,
            bytes,
        };
        Ok(())
    }

    /// Builder form of [`Self::set_payload_inline`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::set_payload_inline`].
    pub fn with_inline_payload(mut self, data: &[u8]) -> KernelResult<Self> {
        self.set_payload_inline(data)?;
        Ok(self)
    }

    /// Builder form of [`Self::set_payload_ref`].
    #[must_use]
    pub fn with_payload_ref(mut self, data: &'a [u8]) -> Self {
        self.set_payload_ref(data);
        self
    }

    /// Ordering key.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> &OrderKey {
        &self.key
    }

    /// Work-type tag.
    #[inline]
    #[must_use]
    pub const fn work_type(&self) -> u32 {
        self.work_type
    }

    /// Opaque scheduler cost.
    #[inline]
    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    /// Tick the item was created on.
    #[inline]
    #[must_use]
    pub const fn enqueue_tick(&self) -> u64 {
        self.enqueue_tick
    }

    /// Inline payload length; zero when the payload is referenced.
    #[inline]
    #[must_use]
    pub const fn payload_inline_len(&self) -> usize {
        match self.payload {
            Payload::Inline { len, .. } => len as usize,
            Payload::External(_) => 0,
        }
    }

    /// Referenced payload; `None` when the payload is inline.
    #[inline]
    #[must_use]
    pub const fn payload_ref(&self) -> Option<&'a [u8]> {
        match self.payload {
            Payload::External(data) => Some(data),
            Payload::Inline { .. } => None,
        }
    }

    /// Returns true when the inline buffer is authoritative.
    #[inline]
    #[must_use]
    pub const fn is_inline(&self) -> bool {
        matches!(self.payload, Payload::Inline { .. })
    }

    /// The authoritative payload bytes, whichever mode is active.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        match &self.payload {
            Payload::Inline { len, bytes } => &bytes[..*len as usize],
            Payload::External(data) => data,
        }
    }

    /// Digest of everything the item would apply.
    ///
    /// Payload mode is not part of the digest: the same bytes inline or
    /// referenced describe the same work.
    #[must_use]
    pub fn digest(&self) -> u64 {
        let mut acc = combine(self.key.digest(), u64::from(self.work_type));
        acc = combine(acc, u64::from(self.cost));
        acc = combine(acc, self.enqueue_tick);
        combine(acc, hash_bytes(self.payload()))
    }
}

impl Default for WorkItem<'_> {
    fn default() -> Self {
        Self::new(OrderKey::CLEARED, 0, 0, 0)
    }
}

/// Sorts items into canonical application order.
///
/// Stable, so equal keys keep their relative order; equal keys must only
/// ever belong to interchangeable items.
pub fn sort_work_items(items: &mut [WorkItem<'_>]) {
    items.sort_by(|a, b| a.key.cmp(&b.key));
}
