//! # Deterministic RNG
//!
//! Seeded 32-bit linear congruential generator plus a bundle of streams
//! isolated by purpose.
//!
//! ## Overflow Policy
//!
//! The LCG step wraps modulo 2^32. That is the generator's definition, not
//! an accident, and it is deliberately different from the saturating policy
//! of [`crate::fixed_point`].
//!
//! ## Streams
//!
//! Each purpose draws from its own generator so that, e.g., spawning an
//! extra visual effect never shifts the simulation sequence. Stream sub-seeds
//! are derived from one root seed by drawing successive values from a scratch
//! generator in [`RngStream::ALL`] order. New streams are appended to that
//! order, never inserted, or old replays stop reproducing.

/// LCG multiplier (odd).
pub const LCG_MULTIPLIER: u32 = 1_664_525;

/// LCG increment.
pub const LCG_INCREMENT: u32 = 1_013_904_223;

/// One LCG step.
#[inline]
const fn step(state: u32) -> u32 {
    state.wrapping_mul(LCG_MULTIPLIER).wrapping_add(LCG_INCREMENT)
}

/// Deterministic 32-bit generator.
///
/// Not thread-safe by design: one owner per stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DetRng {
    state: u32,
}

impl DetRng {
    /// Creates a generator. A zero seed is remapped to 1.
    #[inline]
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Re-seeds in place. A zero seed is remapped to 1.
    #[inline]
    pub fn seed(&mut self, value: u32) {
        *self = Self::new(value);
    }

    /// Returns the current state (for snapshots).
    #[inline]
    #[must_use]
    pub const fn state(&self) -> u32 {
        self.state
    }

    /// Advances and returns the new state.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = step(self.state);
        self.state
    }

    /// Returns what [`Self::next_u32`] would return, without advancing.
    #[inline]
    #[must_use]
    pub const fn peek_u32(&self) -> u32 {
        step(self.state)
    }

    /// Advances and reinterprets the result as two's-complement.
    #[inline]
    #[allow(clippy::cast_possible_wrap)]
    pub fn next_i32(&mut self) -> i32 {
        self.next_u32() as i32
    }

    /// Returns a value in `[0, bound)` by multiply-shift; `0` for `bound == 0`.
    #[inline]
    pub fn next_below(&mut self, bound: u32) -> u32 {
        ((u64::from(self.next_u32()) * u64::from(bound)) >> 32) as u32
    }

    /// Picks an element; `None` for an empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let len = u32::try_from(items.len()).unwrap_or(u32::MAX);
        items.get(self.next_below(len) as usize)
    }

    /// Fisher-Yates shuffle driven only by this stream.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let bound = u32::try_from(i + 1).unwrap_or(u32::MAX);
            let j = self.next_below(bound) as usize;
            items.swap(i, j);
        }
    }
}

impl Default for DetRng {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Closed enumeration of RNG purposes.
///
/// Discriminants are the stream's position in seeding order. Append only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum RngStream {
    /// Authoritative simulation decisions.
    Simulation = 0,
    /// Procedural content generation.
    ContentGeneration = 1,
    /// Agent/AI decision noise.
    Ai = 2,
    /// Cosmetic effects. Never feeds back into simulation state.
    VisualEffects = 3,
}

impl RngStream {
    /// Number of streams.
    pub const COUNT: usize = 4;

    /// Every stream in seeding order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Simulation,
        Self::ContentGeneration,
        Self::Ai,
        Self::VisualEffects,
    ];

    /// Index into a stream bundle.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One generator per [`RngStream`], derived from a single root seed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RngStreams {
    root_seed: u32,
    streams: [DetRng; RngStream::COUNT],
}

impl RngStreams {
    /// Seeds every stream from `root_seed`.
    #[must_use]
    pub fn from_root_seed(root_seed: u32) -> Self {
        let mut scratch = DetRng::new(root_seed);
        let mut streams = [DetRng::default(); RngStream::COUNT];
        for id in RngStream::ALL {
            streams[id.index()] = DetRng::new(scratch.next_u32());
        }
        Self { root_seed, streams }
    }

    /// Root seed the bundle was derived from.
    #[inline]
    #[must_use]
    pub const fn root_seed(&self) -> u32 {
        self.root_seed
    }

    /// Mutable access to one stream.
    #[inline]
    pub fn stream_mut(&mut self, id: RngStream) -> &mut DetRng {
        &mut self.streams[id.index()]
    }

    /// Read access to one stream.
    #[inline]
    #[must_use]
    pub fn stream(&self, id: RngStream) -> &DetRng {
        &self.streams[id.index()]
    }

    /// Draws from one stream.
    #[inline]
    pub fn next_u32(&mut self, id: RngStream) -> u32 {
        self.stream_mut(id).next_u32()
    }

    /// Current state of every stream, in seeding order.
    #[must_use]
    pub fn states(&self) -> [u32; RngStream::COUNT] {
        self.streams.map(|s| s.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_sequence() {
        let mut rng = DetRng::new(1);
        assert_eq!(rng.next_u32(), 1_015_568_748);
        assert_eq!(rng.next_u32(), 1_586_005_467);
        assert_eq!(rng.next_u32(), 2_165_703_038);
    }

    #[test]
    fn test_zero_seed_remapped() {
        let mut zero = DetRng::new(0);
        let mut one = DetRng::new(1);
        for _ in 0..32 {
            assert_eq!(zero.next_u32(), one.next_u32());
        }
        let mut reseeded = DetRng::new(99);
        reseeded.seed(0);
        assert_eq!(reseeded.state(), 1);
    }

    #[test]
    fn test_reseed_repeats() {
        let mut rng = DetRng::new(777);
        let first: Vec<u32> = (0..100).map(|_| rng.next_u32()).collect();
        rng.seed(777);
        let second: Vec<u32> = (0..100).map(|_| rng.next_u32()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let mut rng = DetRng::new(5);
        let peeked = rng.peek_u32();
        assert_eq!(rng.peek_u32(), peeked);
        assert_eq!(rng.next_u32(), peeked);
    }

    #[test]
    fn test_next_i32_reinterprets() {
        let mut a = DetRng::new(3);
        let mut b = DetRng::new(3);
        for _ in 0..16 {
            assert_eq!(a.next_i32().to_le_bytes(), b.next_u32().to_le_bytes());
        }
    }

    #[test]
    fn test_next_below_bounds() {
        let mut rng = DetRng::new(42);
        for _ in 0..1000 {
            assert!(rng.next_below(10) < 10);
        }
        assert_eq!(rng.next_below(0), 0);
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rng = DetRng::new(9);
        let mut items: Vec<u32> = (0..50).collect();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert!(rng.pick::<u32>(&[]).is_none());
    }

    #[test]
    fn test_stream_sub_seeds() {
        let streams = RngStreams::from_root_seed(42);
        assert_eq!(
            streams.states(),
            [1_083_814_273, 378_494_188, 2_479_403_867, 955_863_294]
        );
    }

    #[test]
    fn test_streams_are_isolated() {
        let mut a = RngStreams::from_root_seed(42);
        let mut b = RngStreams::from_root_seed(42);
        for _ in 0..10 {
            a.next_u32(RngStream::VisualEffects);
        }
        assert_eq!(
            a.next_u32(RngStream::Simulation),
            b.next_u32(RngStream::Simulation)
        );
    }
}
