//! # Tick Driver
//!
//! Runs a registry of content units through the kernel, one tick at a time.
//!
//! ```text
//! Tick N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. RECORD INPUTS                                                    │
//! │    └─ Every external input becomes an input packet first            │
//! │                                                                     │
//! │ 2. PHASES (INPUT, PRE_SIMULATION, SIMULATION, POST, FINALIZE)       │
//! │    ├─ phase_begin                                                   │
//! │    ├─ INPUT only: apply inputs in order-key, then content order     │
//! │    ├─ Carried-over items of this phase + stride-selected units      │
//! │    ├─ Sort by order key                                             │
//! │    ├─ Apply while the tick budget lasts, defer the rest             │
//! │    └─ phase_end                                                     │
//! │                                                                     │
//! │ 3. CLOSE                                                            │
//! │    ├─ Check phase balance                                           │
//! │    └─ Record probe, tick summary, state hash                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Application draws from the `Simulation` RNG stream only, once per
//! applied item, in application order. Nothing else touches the streams.
//!
//! Inputs sharing a header tie on the order key and are then ordered by
//! payload hash and payload bytes. Two inputs that still compare equal are
//! byte-identical, so submission order never reaches the state hash.

use tessera_core::{
    combine, hash_bytes, mix64, sort_work_items, KernelError, KernelResult, OrderKey, Phase, ReplayCounters,
    RngStream, RngStreams, StrideDomain, TickCounters, WorkItem, INLINE_PAYLOAD_CAPACITY,
};
use tessera_replay::{InputHeader, ProbeSample, ReplayRecorder, ReplayStream};

use crate::config::KernelConfig;
use crate::error::{TesseraError, TesseraResult};
use crate::registry::{ContentRegistry, ContentUnit};

// =============================================================================
// Inputs
// =============================================================================

/// Probe id for the carryover queue length sampled at tick close.
pub const PROBE_CARRYOVER: u32 = 1;

/// One external input for a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickInput<'a> {
    /// Input framing.
    pub header: InputHeader,
    /// Input bytes.
    pub payload: &'a [u8],
}

impl<'a> TickInput<'a> {
    /// Creates an input.
    #[must_use]
    pub const fn new(header: InputHeader, payload: &'a [u8]) -> Self {
        Self { header, payload }
    }

    /// Order key the input is applied under.
    #[must_use]
    pub fn key(&self) -> OrderKey {
        OrderKey::new(
            Phase::INPUT,
            0,
            0,
            u64::from(self.header.source_id),
            0,
            self.header.kind,
            self.header.sequence,
        )
    }
}

// =============================================================================
// Reports and carryover
// =============================================================================

/// What one tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number.
    pub tick: u64,
    /// External inputs applied.
    pub inputs: u32,
    /// Fresh work items produced by stride selection.
    pub generated: u32,
    /// Work items applied.
    pub applied: u32,
    /// Work items carried into the next tick.
    pub deferred: u32,
    /// Work items dropped because the carryover queue was full.
    pub dropped: u32,
    /// Budget units consumed.
    pub cost_spent: u32,
    /// State hash after the tick.
    pub state_hash: u64,
    /// Scheduler counters at tick close.
    pub counters: TickCounters,
}

/// Bounded queue of work deferred to the next tick.
///
/// Items are pushed in application order, so when the queue fills it is
/// always the latest-ordered work that is dropped.
#[derive(Clone, Debug)]
pub struct CarryoverQueue<'a> {
    items: Vec<WorkItem<'a>>,
    capacity: usize,
    dropped_total: u64,
}

impl<'a> CarryoverQueue<'a> {
    /// Creates an empty queue.
    ///
    /// # Errors
    ///
    /// [`KernelError::InvalidArgument`] for a zero capacity.
    pub fn with_capacity(capacity: usize) -> KernelResult<Self> {
        if capacity == 0 {
            return Err(KernelError::InvalidArgument("carryover capacity must be non-zero"));
        }
        Ok(Self {
            items: Vec::with_capacity(capacity),
            capacity,
            dropped_total: 0,
        })
    }

    /// Defers `item`. Returns `false` and counts a drop when full.
    pub fn push(&mut self, item: WorkItem<'a>) -> bool {
        if self.items.len() >= self.capacity {
            self.dropped_total += 1;
            return false;
        }
        self.items.push(item);
        true
    }

    /// Removes and returns everything queued.
    pub fn drain(&mut self) -> Vec<WorkItem<'a>> {
        std::mem::replace(&mut self.items, Vec::with_capacity(self.capacity))
    }

    /// Queued items in push order.
    #[must_use]
    pub fn items(&self) -> &[WorkItem<'a>] {
        &self.items
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum queued items.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items dropped over the queue's lifetime.
    #[must_use]
    pub const fn dropped_total(&self) -> u64 {
        self.dropped_total
    }
}

// =============================================================================
// TickDriver
// =============================================================================

/// Reference single-threaded tick driver.
///
/// Borrows a frozen registry for its whole life; work items reference unit
/// parameter blobs directly when they do not fit inline.
#[derive(Debug)]
pub struct TickDriver<'r> {
    config: KernelConfig,
    registry: &'r ContentRegistry,
    stride: StrideDomain,
    rng: RngStreams,
    counters: ReplayCounters,
    carryover: CarryoverQueue<'r>,
    recorder: ReplayRecorder,
    tick: u64,
    state_hash: u64,
}

impl<'r> TickDriver<'r> {
    /// Builds a driver at tick 0.
    ///
    /// Attaches a fresh replay stream when `config.replay.enabled`.
    ///
    /// # Errors
    ///
    /// - [`TesseraError::Config`] if the config does not validate
    /// - [`TesseraError::RegistryNotFrozen`] for an unfrozen registry
    /// - [`TesseraError::InvalidUnit`] for a unit costing more than a whole tick
    pub fn new(config: KernelConfig, registry: &'r ContentRegistry) -> TesseraResult<Self> {
        config.validate()?;
        for unit in registry.units()? {
            if unit.cost > config.tick_budget {
                return Err(TesseraError::InvalidUnit {
                    stable_id: unit.stable_id,
                    reason: "cost exceeds tick budget",
                });
            }
        }

        let carryover = CarryoverQueue::with_capacity(config.carryover_capacity)?;
        let mut recorder = ReplayRecorder::new();
        recorder.set_record_probes(config.replay.record_probes);

        let mut driver = Self {
            stride: StrideDomain::new(config.stride_salt),
            rng: RngStreams::from_root_seed(config.root_seed),
            counters: ReplayCounters::new(),
            carryover,
            recorder,
            tick: 0,
            state_hash: mix64(u64::from(config.root_seed)),
            registry,
            config,
        };
        if driver.config.replay.enabled {
            driver.attach_replay(ReplayStream::new(driver.config.root_seed));
        }
        Ok(driver)
    }

    /// Next tick to run.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Running state hash.
    #[inline]
    #[must_use]
    pub const fn state_hash(&self) -> u64 {
        self.state_hash
    }

    /// Session config.
    #[must_use]
    pub const fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Work waiting for the next tick.
    #[must_use]
    pub const fn carryover(&self) -> &CarryoverQueue<'r> {
        &self.carryover
    }

    /// Replay recorder.
    #[must_use]
    pub const fn recorder(&self) -> &ReplayRecorder {
        &self.recorder
    }

    /// Attaches a replay stream, returning the previous one.
    pub fn attach_replay(&mut self, stream: ReplayStream) -> Option<ReplayStream> {
        tracing::info!(tick = self.tick, root_seed = stream.root_seed(), "replay stream attached");
        self.recorder.attach(stream)
    }

    /// Detaches the replay stream.
    pub fn detach_replay(&mut self) -> Option<ReplayStream> {
        let stream = self.recorder.detach();
        if let Some(stream) = &stream {
            tracing::info!(tick = self.tick, records = stream.len(), "replay stream detached");
        }
        stream
    }

    /// Runs one tick.
    ///
    /// Inputs are recorded in the order given and applied in order-key
    /// order, ties broken by payload content.
    ///
    /// # Errors
    ///
    /// [`TesseraError::Kernel`] with [`KernelError::PhaseImbalance`] when
    /// phases are unbalanced and `strict_phase_balance` is set. The driver
    /// must be discarded after an error.
    pub fn run_tick(&mut self, inputs: &[TickInput<'_>]) -> TesseraResult<TickReport> {
        let tick = self.tick;
        let registry = self.registry;
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        for input in inputs {
            self.recorder.record_input_pkt(tick, &input.header, input.payload);
        }

        self.counters.begin_tick(tick);
        let pending = self.carryover.drain();
        let mut remaining = self.config.tick_budget;
        let mut exhausted = false;

        for phase in Phase::ALL {
            self.counters.phase_begin(phase);

            if phase == Phase::INPUT {
                self.apply_inputs(inputs);
                report.inputs = inputs.len() as u32;
            }

            let mut batch: Vec<WorkItem<'r>> =
                pending.iter().filter(|item| item.key().phase() == phase).copied().collect();
            for unit in registry.units()?.filter(|unit| unit.phase == phase) {
                if self.stride.should_run(tick, unit.stable_id, unit.stride) {
                    batch.push(make_item(unit, tick)?);
                    report.generated += 1;
                }
            }
            sort_work_items(&mut batch);

            for item in batch {
                if !exhausted && item.cost() <= remaining {
                    remaining -= item.cost();
                    report.cost_spent += item.cost();
                    report.applied += 1;
                    self.apply(&item);
                } else {
                    exhausted = true;
                    if self.carryover.push(item) {
                        report.deferred += 1;
                    } else {
                        report.dropped += 1;
                    }
                }
            }

            self.counters.phase_end(phase);
        }

        if let Err(err) = self.counters.check_balanced() {
            if self.config.strict_phase_balance {
                return Err(err.into());
            }
            tracing::warn!(tick, %err, "phase counters unbalanced");
        }
        if report.dropped > 0 {
            tracing::warn!(
                tick,
                dropped = report.dropped,
                capacity = self.carryover.capacity(),
                "carryover queue full, work dropped"
            );
        }

        let counters = self.counters.snapshot();
        self.recorder.record_probe(ProbeSample {
            tick,
            probe_id: PROBE_CARRYOVER,
            data: (self.carryover.len() as u32).to_le_bytes().to_vec(),
        });
        self.recorder.record_tick_summary(&counters);
        self.recorder.record_hash_snapshot(tick, self.state_hash);

        report.state_hash = self.state_hash;
        report.counters = counters;
        tracing::debug!(
            tick,
            applied = report.applied,
            deferred = report.deferred,
            cost = report.cost_spent,
            hash = self.state_hash,
            "tick complete"
        );

        self.tick += 1;
        Ok(report)
    }

    /// Runs `count` ticks with no external input.
    ///
    /// # Errors
    ///
    /// As [`Self::run_tick`].
    pub fn run_idle(&mut self, count: u64) -> TesseraResult<Vec<TickReport>> {
        (0..count).map(|_| self.run_tick(&[])).collect()
    }

    fn apply_inputs(&mut self, inputs: &[TickInput<'_>]) {
        let mut ordered: Vec<&TickInput<'_>> = inputs.iter().collect();
        ordered.sort_by_cached_key(|input| (input.key(), hash_bytes(input.payload), input.payload));
        for input in ordered {
            let key = input.key();
            self.state_hash = combine(self.state_hash, combine(key.digest(), hash_bytes(input.payload)));
            self.counters.record_committed_delta(&key, input.payload);
        }
    }

    fn apply(&mut self, item: &WorkItem<'_>) {
        let roll = self.rng.next_u32(RngStream::Simulation);
        let digest = item.digest();
        let mut delta = [0u8; 12];
        delta[..8].copy_from_slice(&digest.to_le_bytes());
        delta[8..].copy_from_slice(&roll.to_le_bytes());
        self.state_hash = combine(self.state_hash, combine(digest, u64::from(roll)));
        self.counters.record_committed_delta(item.key(), &delta);
    }
}

fn make_item(unit: &ContentUnit, tick: u64) -> KernelResult<WorkItem<'_>> {
    let key = OrderKey::new(
        unit.phase,
        unit.domain_id,
        unit.chunk_id,
        unit.entity_id,
        unit.component_id,
        unit.type_id,
        tick as u32,
    );
    let item = WorkItem::new(key, unit.type_id, unit.cost, tick);
    if unit.params.len() <= INLINE_PAYLOAD_CAPACITY {
        item.with_inline_payload(&unit.params)
    } else {
        Ok(item.with_payload_ref(&unit.params))
    }
}

// =============================================================================
// Replay
// =============================================================================

/// Re-runs a recorded session from its inputs and returns the new stream.
///
/// The new run uses the recorded root seed and covers every tick up to the
/// recording's last one. Pass both streams to [`tessera_replay::verify`].
///
/// # Errors
///
/// As [`TickDriver::new`] and [`TickDriver::run_tick`].
pub fn rerun(config: &KernelConfig, registry: &ContentRegistry, recorded: &ReplayStream) -> TesseraResult<ReplayStream> {
    let config = config.clone().with_root_seed(recorded.root_seed());
    let mut driver = TickDriver::new(config, registry)?;
    driver.attach_replay(ReplayStream::new(recorded.root_seed()));

    if let Some(last) = recorded.last_tick() {
        for tick in 0..=last {
            let inputs: Vec<TickInput<'_>> = recorded
                .inputs_at(tick)
                .map(|(header, payload)| TickInput::new(*header, payload))
                .collect();
            driver.run_tick(&inputs)?;
        }
    }
    Ok(driver
        .detach_replay()
        .unwrap_or_else(|| ReplayStream::new(recorded.root_seed())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::tlv;

    fn registry(units: Vec<ContentUnit>) -> ContentRegistry {
        let mut registry = ContentRegistry::new();
        for unit in units {
            registry.register(unit).unwrap();
        }
        registry.freeze();
        registry
    }

    #[test]
    fn test_unfrozen_registry_rejected() {
        let registry = ContentRegistry::new();
        assert!(matches!(
            TickDriver::new(KernelConfig::default(), &registry),
            Err(TesseraError::RegistryNotFrozen)
        ));
    }

    #[test]
    fn test_oversized_unit_rejected() {
        let registry = registry(vec![ContentUnit::new(1, Phase::SIMULATION, 0).with_cost(10)]);
        let config = KernelConfig::default().with_tick_budget(5);
        assert!(matches!(
            TickDriver::new(config, &registry),
            Err(TesseraError::InvalidUnit { stable_id: 1, .. })
        ));
    }

    #[test]
    fn test_zero_capacity_queue_rejected() {
        assert!(matches!(
            CarryoverQueue::with_capacity(0),
            Err(KernelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_tick_counts_every_phase_once() {
        let registry = registry(vec![
            ContentUnit::new(1, Phase::PRE_SIMULATION, 1),
            ContentUnit::new(2, Phase::SIMULATION, 2),
            ContentUnit::new(3, Phase::FINALIZE, 3),
        ]);
        let mut driver = TickDriver::new(KernelConfig::default(), &registry).unwrap();
        let report = driver.run_tick(&[]).unwrap();

        assert_eq!(report.tick, 0);
        assert_eq!(report.generated, 3);
        assert_eq!(report.applied, 3);
        assert_eq!(report.counters.phase_begins, [1; Phase::COUNT]);
        assert_eq!(report.counters.phase_ends, [1; Phase::COUNT]);
        assert_eq!(report.counters.committed_deltas, 3);
        assert_eq!(driver.tick(), 1);
    }

    #[test]
    fn test_large_params_are_referenced() {
        let mut params = Vec::new();
        tlv::append_record(&mut params, 1, &[7u8; 40]).unwrap();
        let registry = registry(vec![ContentUnit::new(1, Phase::SIMULATION, 0).with_params(params.clone())]);
        let unit = registry.get(1).unwrap().unwrap();
        let item = make_item(unit, 5).unwrap();
        assert!(!item.is_inline());
        assert_eq!(item.payload(), params.as_slice());
        assert_eq!(item.key().sequence(), 5);
    }

    #[test]
    fn test_budget_defers_then_drains() {
        let units = (1..=4).map(|id| ContentUnit::new(id, Phase::SIMULATION, 0).with_cost(2)).collect();
        let registry = registry(units);
        let config = KernelConfig::default().with_tick_budget(5);
        let mut driver = TickDriver::new(config, &registry).unwrap();

        let first = driver.run_tick(&[]).unwrap();
        assert_eq!(first.applied, 2);
        assert_eq!(first.deferred, 2);
        assert_eq!(first.cost_spent, 4);
        assert_eq!(driver.carryover().len(), 2);

        // Entity orders before sequence: fresh work for entities 1 and 2 runs ahead of the carried 3 and 4.
        let second = driver.run_tick(&[]).unwrap();
        assert_eq!(second.generated, 4);
        assert_eq!(second.applied, 2);
        assert_eq!(second.deferred, 4);
    }

    #[test]
    fn test_full_carryover_drops_latest_work() {
        let units = (1..=6).map(|id| ContentUnit::new(id, Phase::SIMULATION, 0).with_cost(3)).collect();
        let registry = registry(units);
        let config = KernelConfig::default().with_tick_budget(3).with_carryover_capacity(2);
        let mut driver = TickDriver::new(config, &registry).unwrap();

        let report = driver.run_tick(&[]).unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.deferred, 2);
        assert_eq!(report.dropped, 3);
        assert_eq!(driver.carryover().dropped_total(), 3);
        let kept: Vec<u64> = driver.carryover().items().iter().map(|i| i.key().entity_id()).collect();
        assert_eq!(kept, [2, 3]);
    }

    #[test]
    fn test_inputs_recorded_and_hashed() {
        let registry = registry(Vec::new());
        let mut a = TickDriver::new(KernelConfig::default(), &registry).unwrap();
        let mut b = TickDriver::new(KernelConfig::default(), &registry).unwrap();

        let jump = TickInput::new(InputHeader::new(1, 10, 0), b"jump");
        let duck = TickInput::new(InputHeader::new(2, 10, 0), b"duck");
        let ra = a.run_tick(&[jump, duck]).unwrap();
        let rb = b.run_tick(&[duck, jump]).unwrap();

        // Same inputs in a different arrival order apply identically.
        assert_eq!(ra.state_hash, rb.state_hash);
        assert_eq!(ra.counters, rb.counters);
        assert_eq!(ra.inputs, 2);

        let stream = a.detach_replay().unwrap();
        let recorded: Vec<_> = stream.inputs_at(0).map(|(_, payload)| payload.to_vec()).collect();
        assert_eq!(recorded, [b"jump".to_vec(), b"duck".to_vec()]);
    }

    #[test]
    fn test_same_header_inputs_ignore_arrival_order() {
        let registry = registry(vec![ContentUnit::new(1, Phase::SIMULATION, 0)]);
        let jump = TickInput::new(InputHeader::new(1, 10, 0), b"jump");
        let duck = TickInput::new(InputHeader::new(1, 10, 0), b"duck");
        assert_eq!(jump.key(), duck.key());

        let mut a = TickDriver::new(KernelConfig::default(), &registry).unwrap();
        let mut b = TickDriver::new(KernelConfig::default(), &registry).unwrap();
        let ra = a.run_tick(&[jump, duck]).unwrap();
        let rb = b.run_tick(&[duck, jump]).unwrap();
        assert_eq!(ra.state_hash, rb.state_hash);
        assert_eq!(ra.counters, rb.counters);

        // Exact duplicates are interchangeable and both still apply.
        let rc = a.run_tick(&[jump, jump, duck]).unwrap();
        let rd = b.run_tick(&[duck, jump, jump]).unwrap();
        assert_eq!(rc.state_hash, rd.state_hash);
        assert_eq!(rc.counters, rd.counters);
        assert_eq!(rc.counters.committed_deltas, 4);
    }

    #[test]
    fn test_replay_disabled_records_nothing() {
        let registry = registry(vec![ContentUnit::new(1, Phase::SIMULATION, 0)]);
        let mut config = KernelConfig::default();
        config.replay.enabled = false;
        let mut driver = TickDriver::new(config, &registry).unwrap();
        driver.run_idle(3).unwrap();
        assert!(!driver.recorder().is_attached());
        assert!(driver.detach_replay().is_none());
    }
}
