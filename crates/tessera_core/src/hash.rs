//! # Deterministic Hash
//!
//! The 64-bit avalanche mixer every stable-id decision is built on.
//!
//! Shift, xor and wrapping multiply on `u64` only: no host byte order, no
//! pointers, no floats. The constants are a replay contract. Changing any of
//! them changes which tick every decimated unit fires on, which invalidates
//! every recorded replay. `tests/golden_vectors.rs` pins the outputs.

/// First multiplier of the finalizer.
const MIX_MUL_A: u64 = 0xff51_afd7_ed55_8ccd;

/// Second multiplier of the finalizer.
const MIX_MUL_B: u64 = 0xc4ce_b9fe_1a85_ec53;

/// Odd constant folded in by [`combine`] so that `combine(0, 0) != 0`.
const COMBINE_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Mixes a 64-bit value. Pure: same input, same output, everywhere.
#[inline]
#[must_use]
pub const fn mix64(value: u64) -> u64 {
    let mut x = value;
    x ^= x >> 33;
    x = x.wrapping_mul(MIX_MUL_A);
    x ^= x >> 33;
    x = x.wrapping_mul(MIX_MUL_B);
    x ^= x >> 33;
    x
}

/// Folds `value` into a running accumulator. Order-sensitive.
#[inline]
#[must_use]
pub const fn combine(acc: u64, value: u64) -> u64 {
    mix64(acc.rotate_left(5) ^ mix64(value.wrapping_add(COMBINE_SALT)))
}

/// Hashes a byte string.
///
/// Bytes are read as little-endian 8-byte words (zero-padded tail) and the
/// length is folded in last, so `[0]` and `[0, 0]` differ.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut acc = COMBINE_SALT;
    let mut chunks = bytes.chunks_exact(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        acc = combine(acc, u64::from_le_bytes(word));
    }
    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut word = [0u8; 8];
        word[..tail.len()].copy_from_slice(tail);
        acc = combine(acc, u64::from_le_bytes(word));
    }
    combine(acc, bytes.len() as u64)
}
