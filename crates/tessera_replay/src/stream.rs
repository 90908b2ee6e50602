//! # Replay Stream
//!
//! Append-only log of what a run did, and the recorder the kernel writes
//! through.
//!
//! ## Ownership
//!
//! Whoever starts recording (usually the session) owns the
//! [`ReplayStream`]. It hands the stream to a [`ReplayRecorder`] with
//! [`ReplayRecorder::attach`] and takes it back with
//! [`ReplayRecorder::detach`]. While nothing is attached every `record_*`
//! call is a no-op returning `false`, so production builds toggle recording
//! without touching call sites.
//!
//! ## Inputs
//!
//! `record_input_pkt` is the only channel through which nondeterministic
//! input (player commands, network data, anything seeded from a clock) may
//! enter a replay. Anything the simulation consumed that was not captured
//! here and fed back verbatim is a determinism bug.

use tessera_core::TickCounters;

use crate::record::{InputHeader, ProbeSample, ReplayRecord, MAX_PROBE_BYTES};

/// Ticks a new stream preallocates for (one second at 60Hz).
const PREALLOCATED_TICKS: usize = 60;

/// Records a typical tick appends: summary, hash, one input, one probe.
const RECORDS_PER_TICK: usize = 4;

/// Append-only sequence of replay records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayStream {
    root_seed: u32,
    records: Vec<ReplayRecord>,
}

impl ReplayStream {
    /// Creates an empty stream for a run seeded with `root_seed`.
    #[must_use]
    pub fn new(root_seed: u32) -> Self {
        Self {
            root_seed,
            records: Vec::with_capacity(PREALLOCATED_TICKS * RECORDS_PER_TICK),
        }
    }

    /// Root seed of the recorded run.
    #[inline]
    #[must_use]
    pub const fn root_seed(&self) -> u32 {
        self.root_seed
    }

    /// Appends a record.
    pub fn push(&mut self, record: ReplayRecord) {
        self.records.push(record);
    }

    /// All records in append order.
    #[inline]
    #[must_use]
    pub fn records(&self) -> &[ReplayRecord] {
        &self.records
    }

    /// Number of records.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has been recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `(tick, hash)` of every hash snapshot, in order.
    pub fn hash_snapshots(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.records.iter().filter_map(|record| match record {
            ReplayRecord::HashSnapshot { tick, hash } => Some((*tick, *hash)),
            _ => None,
        })
    }

    /// Inputs recorded for `tick`, in capture order.
    ///
    /// This is what a replay harness feeds back into the driver.
    pub fn inputs_at(&self, tick: u64) -> impl Iterator<Item = (&InputHeader, &[u8])> + '_ {
        self.records.iter().filter_map(move |record| match record {
            ReplayRecord::InputPacket {
                tick: at,
                header,
                payload,
            } if *at == tick => Some((header, payload.as_slice())),
            _ => None,
        })
    }

    /// Tick summaries, in order.
    pub fn tick_summaries(&self) -> impl Iterator<Item = &TickCounters> + '_ {
        self.records.iter().filter_map(|record| match record {
            ReplayRecord::TickSummary(counters) => Some(counters),
            _ => None,
        })
    }

    /// Highest tick any record refers to.
    #[must_use]
    pub fn last_tick(&self) -> Option<u64> {
        self.records.iter().map(ReplayRecord::tick).max()
    }
}

/// Kernel-side handle for writing into an attached stream.
#[derive(Debug)]
pub struct ReplayRecorder {
    stream: Option<ReplayStream>,
    record_probes: bool,
}

impl ReplayRecorder {
    /// Creates a recorder with nothing attached.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stream: None,
            record_probes: true,
        }
    }

    /// Enables or disables probe recording (on by default).
    pub fn set_record_probes(&mut self, enabled: bool) {
        self.record_probes = enabled;
    }

    /// Attaches `stream`, returning whatever was attached before.
    pub fn attach(&mut self, stream: ReplayStream) -> Option<ReplayStream> {
        self.stream.replace(stream)
    }

    /// Detaches and returns the stream.
    pub fn detach(&mut self) -> Option<ReplayStream> {
        self.stream.take()
    }

    /// Returns true if a stream is attached.
    #[inline]
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.stream.is_some()
    }

    /// Read access to the attached stream.
    #[inline]
    #[must_use]
    pub const fn stream(&self) -> Option<&ReplayStream> {
        self.stream.as_ref()
    }

    fn append(&mut self, record: ReplayRecord) -> bool {
        match self.stream.as_mut() {
            Some(stream) => {
                stream.push(record);
                true
            }
            None => false,
        }
    }

    /// Records a full-state hash. `false` if nothing is attached.
    pub fn record_hash_snapshot(&mut self, tick: u64, hash: u64) -> bool {
        self.append(ReplayRecord::HashSnapshot { tick, hash })
    }

    /// Records an external input. `false` if nothing is attached.
    pub fn record_input_pkt(&mut self, tick: u64, header: &InputHeader, payload: &[u8]) -> bool {
        if !self.is_attached() {
            return false;
        }
        self.append(ReplayRecord::InputPacket {
            tick,
            header: *header,
            payload: payload.to_vec(),
        })
    }

    /// Records a diagnostic sample.
    ///
    /// `false` if nothing is attached, probes are disabled, or the sample is
    /// larger than [`MAX_PROBE_BYTES`].
    pub fn record_probe(&mut self, sample: ProbeSample) -> bool {
        if !self.record_probes || sample.data.len() > MAX_PROBE_BYTES {
            return false;
        }
        self.append(ReplayRecord::Probe(sample))
    }

    /// Records the tick's scheduler counters. `false` if nothing is attached.
    pub fn record_tick_summary(&mut self, counters: &TickCounters) -> bool {
        self.append(ReplayRecord::TickSummary(*counters))
    }
}

impl Default for ReplayRecorder {
    fn default() -> Self {
        Self::new()
    }
}
