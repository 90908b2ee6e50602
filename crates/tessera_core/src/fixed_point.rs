//! # Fixed-Point Numerics
//!
//! **NO FLOATING POINT ON A SIMULATION PATH**
//!
//! Signed fixed-point values interpreted as `raw / 2^F` for a compile-time
//! fraction-bit count `F`.
//!
//! ## Formats
//!
//! | Type      | Raw   | Integer bits | Fraction bits |
//! |-----------|-------|--------------|---------------|
//! | `Fx4_12`  | `i16` | 4            | 12            |
//! | `Fx16_16` | `i32` | 16           | 16            |
//! | `Fx24_8`  | `i32` | 24           | 8             |
//! | `Fx48_16` | `i64` | 48           | 16            |
//!
//! ## Overflow Policy
//!
//! Every operator saturates at the format's MIN/MAX instead of wrapping.
//! Division by zero returns MAX for a non-negative dividend and MIN for a
//! negative one. Multiplication and division are computed on the exact
//! double-width intermediate, so saturation is the only rounding beyond the
//! final truncation.
//!
//! Cross-format conversion shifts the raw value by the difference in
//! fraction bits (arithmetic shift when narrowing) and saturates to the
//! target range.
//!
//! `from_f64`/`to_f64` exist only with the `float-tooling` feature (and in
//! this crate's own tests). Editors, debug overlays and test fixtures may
//! use them; simulation code must not.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use bytemuck::{Pod, Zeroable};

/// Decimal digits printed by `Display`.
const DISPLAY_DIGITS: u128 = 1_000_000;

// =============================================================================
// FixedFormat - shared surface
// =============================================================================

/// Common surface of every fixed-point format.
///
/// Lets format-generic code (TLV readers, conversions) move values between
/// formats without knowing their raw width.
pub trait FixedFormat: Copy + Ord {
    /// Number of fractional bits.
    const FRAC_BITS: u32;

    /// Raw value widened to `i128` (lossless for every format).
    fn raw_i128(self) -> i128;

    /// Builds a value from a wide raw, saturating to the format's range.
    fn saturate_i128(raw: i128) -> Self;

    /// Converts into another format, shifting by the fraction-bit difference
    /// and saturating when the target is narrower.
    #[inline]
    #[must_use]
    fn convert<T: FixedFormat>(self) -> T {
        let raw = self.raw_i128();
        let shifted = if T::FRAC_BITS >= Self::FRAC_BITS {
            raw << (T::FRAC_BITS - Self::FRAC_BITS)
        } else {
            raw >> (Self::FRAC_BITS - T::FRAC_BITS)
        };
        T::saturate_i128(shifted)
    }
}

// =============================================================================
// Format generator
// =============================================================================

macro_rules! fixed_format {
    (
        $(#[$meta:meta])*
        $name:ident, raw = $raw:ty, wide = $wide:ty, frac = $frac:expr
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Pod, Zeroable)]
        #[repr(transparent)]
        pub struct $name($raw);

        impl $name {
            /// Number of fractional bits.
            pub const FRAC_BITS: u32 = $frac;

            /// Zero.
            pub const ZERO: Self = Self(0);

            /// One.
            pub const ONE: Self = Self(1 << $frac);

            /// Smallest representable step (raw value 1).
            pub const EPSILON: Self = Self(1);

            /// Smallest representable value.
            pub const MIN: Self = Self(<$raw>::MIN);

            /// Largest representable value.
            pub const MAX: Self = Self(<$raw>::MAX);

            /// Wraps a raw value without conversion.
            #[inline]
            #[must_use]
            pub const fn from_raw(raw: $raw) -> Self {
                Self(raw)
            }

            /// Returns the raw value.
            #[inline]
            #[must_use]
            pub const fn raw(self) -> $raw {
                self.0
            }

            /// Clamps a double-width intermediate into range.
            #[inline]
            const fn saturate_wide(value: $wide) -> Self {
                if value > <$raw>::MAX as $wide {
                    Self::MAX
                } else if value < <$raw>::MIN as $wide {
                    Self::MIN
                } else {
                    Self(value as $raw)
                }
            }

            /// Converts an integer, saturating when it does not fit.
            #[inline]
            #[must_use]
            pub const fn from_int(value: i64) -> Self {
                let wide = (value as i128) << $frac;
                if wide > <$raw>::MAX as i128 {
                    Self::MAX
                } else if wide < <$raw>::MIN as i128 {
                    Self::MIN
                } else {
                    Self(wide as $raw)
                }
            }

            /// Integer part, truncated toward zero.
            #[inline]
            #[must_use]
            pub const fn to_int(self) -> i64 {
                (self.0 as i64) / (1i64 << $frac)
            }

            /// Saturating addition.
            #[inline]
            #[must_use]
            pub const fn saturating_add(self, rhs: Self) -> Self {
                Self(self.0.saturating_add(rhs.0))
            }

            /// Saturating subtraction.
            #[inline]
            #[must_use]
            pub const fn saturating_sub(self, rhs: Self) -> Self {
                Self(self.0.saturating_sub(rhs.0))
            }

            /// Saturating multiplication.
            #[inline]
            #[must_use]
            pub const fn saturating_mul(self, rhs: Self) -> Self {
                let product = (self.0 as $wide) * (rhs.0 as $wide);
                Self::saturate_wide(product >> $frac)
            }

            /// Saturating division; zero divisors saturate by dividend sign.
            #[inline]
            #[must_use]
            pub const fn saturating_div(self, rhs: Self) -> Self {
                if rhs.0 == 0 {
                    return if self.0 < 0 { Self::MIN } else { Self::MAX };
                }
                let numerator = (self.0 as $wide) << $frac;
                Self::saturate_wide(numerator / (rhs.0 as $wide))
            }

            /// Saturating negation (`-MIN` is `MAX`).
            #[inline]
            #[must_use]
            pub const fn saturating_neg(self) -> Self {
                Self(self.0.saturating_neg())
            }

            /// Saturating absolute value.
            #[inline]
            #[must_use]
            pub const fn abs(self) -> Self {
                Self(self.0.saturating_abs())
            }

            /// Returns true if negative.
            #[inline]
            #[must_use]
            pub const fn is_negative(self) -> bool {
                self.0 < 0
            }

            /// Tooling only. Truncates toward zero, saturates, maps NaN to zero.
            #[cfg(any(test, feature = "float-tooling"))]
            #[inline]
            #[must_use]
            pub fn from_f64(value: f64) -> Self {
                #[allow(clippy::cast_precision_loss)]
                let scale = (1i64 << $frac) as f64;
                Self((value * scale) as $raw)
            }

            /// Tooling only. Exact for every value of this format except the
            /// widest 48.16 raws, which round to the nearest `f64`.
            #[cfg(any(test, feature = "float-tooling"))]
            #[inline]
            #[must_use]
            #[allow(clippy::cast_precision_loss)]
            pub fn to_f64(self) -> f64 {
                self.0 as f64 / (1i64 << $frac) as f64
            }
        }

        impl FixedFormat for $name {
            const FRAC_BITS: u32 = $frac;

            #[inline]
            fn raw_i128(self) -> i128 {
                i128::from(self.0)
            }

            #[inline]
            fn saturate_i128(raw: i128) -> Self {
                if raw > i128::from(<$raw>::MAX) {
                    Self::MAX
                } else if raw < i128::from(<$raw>::MIN) {
                    Self::MIN
                } else {
                    Self(raw as $raw)
                }
            }
        }

        impl Add for $name {
            type Output = Self;
            #[inline]
            fn add(self, rhs: Self) -> Self::Output {
                self.saturating_add(rhs)
            }
        }

        impl AddAssign for $name {
            #[inline]
            fn add_assign(&mut self, rhs: Self) {
                *self = self.saturating_add(rhs);
            }
        }

        impl Sub for $name {
            type Output = Self;
            #[inline]
            fn sub(self, rhs: Self) -> Self::Output {
                self.saturating_sub(rhs)
            }
        }

        impl SubAssign for $name {
            #[inline]
            fn sub_assign(&mut self, rhs: Self) {
                *self = self.saturating_sub(rhs);
            }
        }

        impl Mul for $name {
            type Output = Self;
            #[inline]
            fn mul(self, rhs: Self) -> Self::Output {
                self.saturating_mul(rhs)
            }
        }

        impl Div for $name {
            type Output = Self;
            #[inline]
            fn div(self, rhs: Self) -> Self::Output {
                self.saturating_div(rhs)
            }
        }

        impl Neg for $name {
            type Output = Self;
            #[inline]
            fn neg(self) -> Self::Output {
                self.saturating_neg()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let magnitude = self.raw_i128().unsigned_abs();
                let whole = magnitude >> $frac;
                let mask = (1u128 << $frac) - 1;
                let decimal = ((magnitude & mask) * DISPLAY_DIGITS) >> $frac;
                let sign = if self.0 < 0 { "-" } else { "" };
                write!(f, "{sign}{whole}.{decimal:06}")
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({self})", stringify!($name))
            }
        }
    };
}

// =============================================================================
// Formats
// =============================================================================

fixed_format!(
    /// 4.12 fixed point in an `i16`. Range roughly [-8, 8).
    Fx4_12, raw = i16, wide = i32, frac = 12
);

fixed_format!(
    /// 16.16 fixed point in an `i32`. The default simulation scalar.
    Fx16_16, raw = i32, wide = i64, frac = 16
);

fixed_format!(
    /// 24.8 fixed point in an `i32`. Coarse quantities with a wide range.
    Fx24_8, raw = i32, wide = i64, frac = 8
);

fixed_format!(
    /// 48.16 fixed point in an `i64`. Accumulators and world-scale values.
    Fx48_16, raw = i64, wide = i128, frac = 16
);

// =============================================================================
// Lossless widening
// =============================================================================

impl From<Fx4_12> for Fx16_16 {
    #[inline]
    fn from(value: Fx4_12) -> Self {
        value.convert()
    }
}

impl From<Fx16_16> for Fx48_16 {
    #[inline]
    fn from(value: Fx16_16) -> Self {
        Self(i64::from(value.0))
    }
}

impl From<Fx24_8> for Fx48_16 {
    #[inline]
    fn from(value: Fx24_8) -> Self {
        value.convert()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_round_trip() {
        for x in [-8i64, -3, -1, 0, 1, 5, 7] {
            assert_eq!(Fx4_12::from_int(x).to_int(), x);
        }
        for x in [i64::from(i16::MIN), -1, 0, 1, 12_345, i64::from(i16::MAX)] {
            assert_eq!(Fx16_16::from_int(x).to_int(), x);
        }
        for x in [-8_388_608i64, -1, 0, 1, 8_388_607] {
            assert_eq!(Fx24_8::from_int(x).to_int(), x);
        }
        for x in [-(1i64 << 47), -1, 0, 1, (1i64 << 47) - 1] {
            assert_eq!(Fx48_16::from_int(x).to_int(), x);
        }
    }

    #[test]
    fn test_from_int_saturates() {
        assert_eq!(Fx4_12::from_int(8), Fx4_12::MAX);
        assert_eq!(Fx4_12::from_int(-9), Fx4_12::MIN);
        assert_eq!(Fx16_16::from_int(1 << 20), Fx16_16::MAX);
        assert_eq!(Fx48_16::from_int(i64::MIN), Fx48_16::MIN);
    }

    #[test]
    fn test_to_int_truncates_toward_zero() {
        let minus_one_and_half = Fx16_16::from_raw(-(3 << 15));
        assert_eq!(minus_one_and_half.to_int(), -1);
        let one_and_half = Fx16_16::from_raw(3 << 15);
        assert_eq!(one_and_half.to_int(), 1);
    }

    #[test]
    fn test_add_saturates() {
        assert_eq!(Fx16_16::MAX + Fx16_16::ONE, Fx16_16::MAX);
        assert_eq!(Fx16_16::MIN - Fx16_16::ONE, Fx16_16::MIN);
        assert_eq!(Fx4_12::from_int(7) + Fx4_12::from_int(7), Fx4_12::MAX);
        assert_eq!(Fx48_16::MAX + Fx48_16::EPSILON, Fx48_16::MAX);
    }

    #[test]
    fn test_mul() {
        let a = Fx16_16::from_raw(3 << 15); // 1.5
        let b = Fx16_16::from_int(4);
        assert_eq!(a * b, Fx16_16::from_int(6));
        assert_eq!(Fx16_16::from_int(-2) * Fx16_16::from_int(3), Fx16_16::from_int(-6));
    }

    #[test]
    fn test_mul_saturates() {
        let big = Fx16_16::from_int(30_000);
        assert_eq!(big * big, Fx16_16::MAX);
        assert_eq!(big * -big, Fx16_16::MIN);
        assert_eq!(Fx4_12::from_int(4) * Fx4_12::from_int(4), Fx4_12::MAX);
        assert_eq!(Fx48_16::MAX * Fx48_16::MAX, Fx48_16::MAX);
    }

    #[test]
    fn test_div() {
        assert_eq!(Fx16_16::from_int(6) / Fx16_16::from_int(4), Fx16_16::from_raw(3 << 15));
        assert_eq!(Fx24_8::from_int(-9) / Fx24_8::from_int(3), Fx24_8::from_int(-3));
    }

    #[test]
    fn test_div_by_zero_policy() {
        assert_eq!(Fx16_16::ONE / Fx16_16::ZERO, Fx16_16::MAX);
        assert_eq!(-Fx16_16::ONE / Fx16_16::ZERO, Fx16_16::MIN);
        assert_eq!(Fx16_16::ZERO / Fx16_16::ZERO, Fx16_16::MAX);
        assert_eq!(Fx4_12::from_int(-1) / Fx4_12::ZERO, Fx4_12::MIN);
    }

    #[test]
    fn test_div_saturates() {
        let tiny = Fx16_16::EPSILON;
        assert_eq!(Fx16_16::from_int(1000) / tiny, Fx16_16::MAX);
        assert_eq!(Fx16_16::from_int(-1000) / tiny, Fx16_16::MIN);
    }

    #[test]
    fn test_neg_of_min() {
        assert_eq!(-Fx16_16::MIN, Fx16_16::MAX);
        assert_eq!(Fx4_12::MIN.abs(), Fx4_12::MAX);
    }

    #[test]
    fn test_convert_widen_and_narrow() {
        let half = Fx4_12::from_raw(1 << 11);
        let wide: Fx16_16 = half.convert();
        assert_eq!(wide, Fx16_16::from_raw(1 << 15));
        let back: Fx4_12 = wide.convert();
        assert_eq!(back, half);

        let coarse: Fx24_8 = Fx16_16::from_raw(0x0001_0080).convert();
        assert_eq!(coarse, Fx24_8::from_raw(0x0100));

        let big: Fx4_12 = Fx16_16::from_int(100).convert();
        assert_eq!(big, Fx4_12::MAX);
        let small: Fx4_12 = Fx48_16::from_int(-100).convert();
        assert_eq!(small, Fx4_12::MIN);
    }

    #[test]
    fn test_narrowing_shift_is_arithmetic() {
        let neg: Fx24_8 = Fx16_16::from_raw(-1).convert();
        assert_eq!(neg, Fx24_8::from_raw(-1));
    }

    #[test]
    fn test_lossless_from() {
        let v = Fx16_16::from_raw(-123_456);
        assert_eq!(Fx48_16::from(v).raw(), -123_456);
        assert_eq!(Fx16_16::from(Fx4_12::ONE), Fx16_16::ONE);
        assert_eq!(Fx48_16::from(Fx24_8::ONE), Fx48_16::ONE);
    }

    #[test]
    fn test_tooling_floats() {
        assert_eq!(Fx16_16::from_f64(1.5).raw(), 3 << 15);
        assert!((Fx4_12::from_raw(-2048).to_f64() + 0.5).abs() < f64::EPSILON);
        assert_eq!(Fx4_12::from_f64(1000.0), Fx4_12::MAX);
        assert_eq!(Fx16_16::from_f64(f64::NAN), Fx16_16::ZERO);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Fx16_16::from_raw(3 << 15)), "1.500000");
        assert_eq!(format!("{}", Fx16_16::from_raw(-(1 << 15))), "-0.500000");
        assert_eq!(format!("{:?}", Fx24_8::from_int(2)), "Fx24_8(2.000000)");
    }

    #[test]
    fn test_bytemuck_view() {
        let values = [Fx16_16::ONE, Fx16_16::from_int(2)];
        let raws: &[i32] = bytemuck::cast_slice(&values);
        assert_eq!(raws, &[1 << 16, 2 << 16]);
    }
}
