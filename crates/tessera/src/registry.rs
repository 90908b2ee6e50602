//! # Content Registry
//!
//! The set of content units a session schedules.
//!
//! Lifecycle: `new -> register... -> freeze -> query`. Registration is
//! rejected once frozen and queries are rejected until then, so no tick
//! ever sees a registry that is still changing. Units are always visited in
//! stable-id order, never in registration order.
//!
//! Every unit owns its slot: the (phase, location, component, type) part of
//! the order key its work is scheduled under. Two units sharing a slot would
//! emit equal keys in the same tick, so the second is rejected.

use std::collections::BTreeMap;

use tessera_core::{tlv, OrderKey, Phase};

use crate::error::{TesseraError, TesseraResult};

/// One schedulable unit of content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentUnit {
    /// Content-defined identity. Drives stride offsets and query order.
    pub stable_id: u64,
    /// Phase the unit's work runs in.
    pub phase: Phase,
    /// Domain (world, shard) of the target entity.
    pub domain_id: u64,
    /// Chunk of the target entity.
    pub chunk_id: u64,
    /// Target entity.
    pub entity_id: u64,
    /// Target component.
    pub component_id: u32,
    /// Kind of mutation.
    pub type_id: u32,
    /// Runs once every `stride` ticks (0 and 1 = every tick).
    pub stride: u32,
    /// Budget units one run consumes.
    pub cost: u32,
    /// TLV parameter blob handed to the work item.
    pub params: Vec<u8>,
}

impl ContentUnit {
    /// Creates a unit that runs every tick at cost 1 with no parameters.
    #[must_use]
    pub fn new(stable_id: u64, phase: Phase, type_id: u32) -> Self {
        Self {
            stable_id,
            phase,
            domain_id: 0,
            chunk_id: 0,
            entity_id: stable_id,
            component_id: 0,
            type_id,
            stride: 1,
            cost: 1,
            params: Vec::new(),
        }
    }

    /// Sets the target location.
    #[must_use]
    pub fn with_location(mut self, domain_id: u64, chunk_id: u64, entity_id: u64) -> Self {
        self.domain_id = domain_id;
        self.chunk_id = chunk_id;
        self.entity_id = entity_id;
        self
    }

    /// Sets the target component.
    #[must_use]
    pub fn with_component(mut self, component_id: u32) -> Self {
        self.component_id = component_id;
        self
    }

    /// Sets the stride.
    #[must_use]
    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    /// Sets the cost.
    #[must_use]
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    /// Sets the TLV parameter blob.
    #[must_use]
    pub fn with_params(mut self, params: Vec<u8>) -> Self {
        self.params = params;
        self
    }

    /// Order key of this unit's work with the sequence left at zero.
    #[must_use]
    pub fn slot(&self) -> OrderKey {
        OrderKey::new(
            self.phase,
            self.domain_id,
            self.chunk_id,
            self.entity_id,
            self.component_id,
            self.type_id,
            0,
        )
    }
}

/// Explicitly owned registry of content units.
#[derive(Clone, Debug, Default)]
pub struct ContentRegistry {
    units: BTreeMap<u64, ContentUnit>,
    slots: BTreeMap<OrderKey, u64>,
    frozen: bool,
}

impl ContentRegistry {
    /// Creates an empty, unfrozen registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit.
    ///
    /// # Errors
    ///
    /// - [`TesseraError::RegistryFrozen`] after [`Self::freeze`]
    /// - [`TesseraError::InvalidUnit`] for an out-of-range phase
    /// - [`TesseraError::Kernel`] for a malformed parameter blob
    /// - [`TesseraError::DuplicateUnit`] if the stable id is taken
    /// - [`TesseraError::KeyCollision`] if another unit holds the same slot
    pub fn register(&mut self, unit: ContentUnit) -> TesseraResult<()> {
        if self.frozen {
            return Err(TesseraError::RegistryFrozen);
        }
        if unit.phase.index().is_none() {
            return Err(TesseraError::InvalidUnit {
                stable_id: unit.stable_id,
                reason: "phase out of range",
            });
        }
        tlv::validate(&unit.params)?;
        if self.units.contains_key(&unit.stable_id) {
            return Err(TesseraError::DuplicateUnit(unit.stable_id));
        }
        let slot = unit.slot();
        if let Some(&existing) = self.slots.get(&slot) {
            return Err(TesseraError::KeyCollision {
                stable_id: unit.stable_id,
                existing,
            });
        }
        self.slots.insert(slot, unit.stable_id);
        self.units.insert(unit.stable_id, unit);
        Ok(())
    }

    /// Ends registration.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Returns true once frozen.
    #[inline]
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Number of registered units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Looks up a unit by stable id.
    ///
    /// # Errors
    ///
    /// [`TesseraError::RegistryNotFrozen`] before [`Self::freeze`].
    pub fn get(&self, stable_id: u64) -> TesseraResult<Option<&ContentUnit>> {
        self.ensure_frozen()?;
        Ok(self.units.get(&stable_id))
    }

    /// All units in stable-id order.
    ///
    /// # Errors
    ///
    /// [`TesseraError::RegistryNotFrozen`] before [`Self::freeze`].
    pub fn units(&self) -> TesseraResult<impl Iterator<Item = &ContentUnit> + '_> {
        self.ensure_frozen()?;
        Ok(self.units.values())
    }

    fn ensure_frozen(&self) -> TesseraResult<()> {
        if self.frozen {
            Ok(())
        } else {
            Err(TesseraError::RegistryNotFrozen)
        }
    }
}
