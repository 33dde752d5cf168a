use std::fmt::Debug;
use std::ops::{Add, Mul, Sub};

use fixed::types::I16F16;

/// Widened companion of a [`Scalar`]: holds the exact product of two
/// scalar values and supports enough arithmetic to evaluate quadratic
/// discriminants without falling back to the narrow type.
pub trait WideScalar:
    Copy
    + PartialOrd
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
{
    fn sqrt(self) -> Self;
}

/// Uniform surface over the coordinate types the trees operate on.
///
/// Implemented for `f32`, `f64` and the 16.16 fixed-point type
/// `fixed::types::I16F16`. All tree and geometry code is written against
/// this trait only, so float and fixed-point builds share one code path.
pub trait Scalar:
    Copy
    + PartialOrd
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
{
    /// Type wide enough to hold the exact product of two scalar values.
    type Wide: WideScalar;

    fn zero() -> Self;

    /// Exact representation of one half.
    fn one_half() -> Self;

    fn abs(self) -> Self;

    /// `max(self, 0)`.
    fn max_zero(self) -> Self;

    /// `dx * dx + dy * dy <= r * r`, evaluated at whatever internal
    /// precision avoids overflow.
    fn is_within(dx: Self, dy: Self, r: Self) -> bool;

    fn hypot(self, other: Self) -> Self;

    fn widen(self) -> Self::Wide;

    /// Exact product of two scalars in the widened type.
    fn wide_mul(self, rhs: Self) -> Self::Wide;

    /// Square root of a widened value, narrowed back to the scalar.
    fn wide_sqrt(value: Self::Wide) -> Self;

    /// Canonical bit pattern, used for coincidence hashing. Negative
    /// zero must map to the same bits as zero.
    fn to_bits(self) -> u64;
}

impl WideScalar for f64 {
    #[inline]
    fn sqrt(self) -> Self {
        self.sqrt()
    }
}

impl Scalar for f32 {
    type Wide = f64;

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one_half() -> Self {
        0.5
    }

    #[inline]
    fn abs(self) -> Self {
        self.abs()
    }

    #[inline]
    fn max_zero(self) -> Self {
        self.max(0.0)
    }

    #[inline]
    fn is_within(dx: Self, dy: Self, r: Self) -> bool {
        let dx = dx as f64;
        let dy = dy as f64;
        let r = r as f64;
        dx * dx + dy * dy <= r * r
    }

    #[inline]
    fn hypot(self, other: Self) -> Self {
        self.hypot(other)
    }

    #[inline]
    fn widen(self) -> f64 {
        self as f64
    }

    #[inline]
    fn wide_mul(self, rhs: Self) -> f64 {
        self as f64 * rhs as f64
    }

    #[inline]
    fn wide_sqrt(value: f64) -> Self {
        value.sqrt() as f32
    }

    #[inline]
    fn to_bits(self) -> u64 {
        if self == 0.0 {
            return 0.0f32.to_bits() as u64;
        }
        f32::to_bits(self) as u64
    }
}

impl Scalar for f64 {
    type Wide = f64;

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one_half() -> Self {
        0.5
    }

    #[inline]
    fn abs(self) -> Self {
        self.abs()
    }

    #[inline]
    fn max_zero(self) -> Self {
        self.max(0.0)
    }

    #[inline]
    fn is_within(dx: Self, dy: Self, r: Self) -> bool {
        dx * dx + dy * dy <= r * r
    }

    #[inline]
    fn hypot(self, other: Self) -> Self {
        self.hypot(other)
    }

    #[inline]
    fn widen(self) -> f64 {
        self
    }

    #[inline]
    fn wide_mul(self, rhs: Self) -> f64 {
        self * rhs
    }

    #[inline]
    fn wide_sqrt(value: f64) -> Self {
        value.sqrt()
    }

    #[inline]
    fn to_bits(self) -> u64 {
        if self == 0.0 {
            return 0.0f64.to_bits();
        }
        f64::to_bits(self)
    }
}

/// Exact widened companion of [`I16F16`]: a Q96.32 value backed by
/// `i128`, scaled by `2^32`. Products of two 16.16 values land here
/// without rounding.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct FixedWide(i128);

impl FixedWide {
    const FRAC_BITS: u32 = 32;

    #[inline]
    pub fn from_raw(raw: i128) -> Self {
        FixedWide(raw)
    }

    #[inline]
    pub fn raw(self) -> i128 {
        self.0
    }
}

impl Add for FixedWide {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        FixedWide(self.0 + rhs.0)
    }
}

impl Sub for FixedWide {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        FixedWide(self.0 - rhs.0)
    }
}

impl Mul for FixedWide {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        FixedWide((self.0 * rhs.0) >> Self::FRAC_BITS)
    }
}

impl WideScalar for FixedWide {
    fn sqrt(self) -> Self {
        if self.0 <= 0 {
            return FixedWide(0);
        }
        let root = isqrt(self.0 as u128) as i128;
        FixedWide(root << (Self::FRAC_BITS / 2))
    }
}

impl Scalar for I16F16 {
    type Wide = FixedWide;

    #[inline]
    fn zero() -> Self {
        I16F16::from_bits(0)
    }

    #[inline]
    fn one_half() -> Self {
        I16F16::from_bits(1 << 15)
    }

    #[inline]
    fn abs(self) -> Self {
        self.abs()
    }

    #[inline]
    fn max_zero(self) -> Self {
        if self < Self::zero() {
            Self::zero()
        } else {
            self
        }
    }

    #[inline]
    fn is_within(dx: Self, dy: Self, r: Self) -> bool {
        let dx = dx.to_bits() as i128;
        let dy = dy.to_bits() as i128;
        let r = r.to_bits() as i128;
        dx * dx + dy * dy <= r * r
    }

    fn hypot(self, other: Self) -> Self {
        let sum = <Self as Scalar>::wide_mul(self, self) + <Self as Scalar>::wide_mul(other, other);
        <Self as Scalar>::wide_sqrt(sum)
    }

    #[inline]
    fn widen(self) -> FixedWide {
        FixedWide((self.to_bits() as i128) << 16)
    }

    #[inline]
    fn wide_mul(self, rhs: Self) -> FixedWide {
        FixedWide(self.to_bits() as i128 * rhs.to_bits() as i128)
    }

    fn wide_sqrt(value: FixedWide) -> Self {
        if value.raw() <= 0 {
            return Self::zero();
        }
        let root = isqrt(value.raw() as u128);
        let bits = if root > i32::MAX as u128 {
            i32::MAX
        } else {
            root as i32
        };
        I16F16::from_bits(bits)
    }

    #[inline]
    fn to_bits(self) -> u64 {
        I16F16::to_bits(self) as u32 as u64
    }
}

fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let shift = (128 - n.leading_zeros()).div_ceil(2);
    let mut x = 1u128 << shift;
    loop {
        let next = (x + n / x) >> 1;
        if next >= x {
            return x;
        }
        x = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_wide_mul_is_exact() {
        let a = I16F16::from_num(1.5);
        let b = I16F16::from_num(-2.25);
        let product = Scalar::wide_mul(a, b);
        assert_eq!(product, I16F16::from_num(-3.375).widen());
    }

    #[test]
    fn fixed_wide_sqrt_round_trips_squares() {
        for v in [0.25f64, 1.0, 2.0, 9.0, 144.0, 30000.0] {
            let x = I16F16::from_num(v);
            let back = <I16F16 as Scalar>::wide_sqrt(Scalar::wide_mul(x, x));
            let err = (back.to_num::<f64>() - v).abs();
            assert!(err < 1e-4, "sqrt({v}^2) = {back}");
        }
    }

    #[test]
    fn negative_zero_hashes_like_zero() {
        assert_eq!(Scalar::to_bits(-0.0f32), Scalar::to_bits(0.0f32));
        assert_eq!(Scalar::to_bits(-0.0f64), Scalar::to_bits(0.0f64));
    }

    #[test]
    fn is_within_handles_large_fixed_values() {
        let dx = I16F16::from_num(20000);
        let big = I16F16::from_num(30000);
        assert!(I16F16::is_within(dx, dx, I16F16::from_num(32000)));
        assert!(!I16F16::is_within(big, big, big));
    }
}
