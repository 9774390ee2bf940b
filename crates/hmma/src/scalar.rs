use core::fmt;
use core::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use core::str::FromStr;

/// Trait for the element type of every matrix in hmma.
///
/// Implemented for f32 and f64. All decompositions are written against this
/// trait, so a new floating type only needs an impl here.
pub trait Scalar:
    Copy
    + Clone
    + fmt::Debug
    + fmt::Display
    + PartialEq
    + PartialOrd
    + Default
    + FromStr
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Send
    + Sync
    + 'static
{
    const ZERO: Self;
    const ONE: Self;
    const TWO: Self;
    const HALF: Self;
    const EPSILON: Self;
    const NEG_INFINITY: Self;

    fn sqrt(self) -> Self;
    fn abs(self) -> Self;
    fn min(self, other: Self) -> Self;
    fn max(self, other: Self) -> Self;
    fn recip(self) -> Self;
    fn powf(self, p: Self) -> Self;
    fn floor(self) -> Self;

    /// `sqrt(a² + b²)` without destructive underflow or overflow.
    fn hypot(self, other: Self) -> Self {
        let a = self.abs();
        let b = other.abs();
        let (big, small) = if a > b { (a, b) } else { (b, a) };
        if big == Self::ZERO {
            return Self::ZERO;
        }
        let r = small / big;
        big * (Self::ONE + r * r).sqrt()
    }

    /// True when the value has no fractional part.
    fn is_integral(self) -> bool {
        self.floor() == self
    }

    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
    fn from_i32(v: i32) -> Self;
    fn from_usize(v: usize) -> Self;
}

// In std mode, use inherent float methods. In no_std, use libm.
#[cfg(feature = "std")]
mod float_ops {
    #[inline(always)]
    pub fn sqrt_f32(x: f32) -> f32 {
        x.sqrt()
    }
    #[inline(always)]
    pub fn sqrt_f64(x: f64) -> f64 {
        x.sqrt()
    }
    #[inline(always)]
    pub fn abs_f32(x: f32) -> f32 {
        x.abs()
    }
    #[inline(always)]
    pub fn abs_f64(x: f64) -> f64 {
        x.abs()
    }
    #[inline(always)]
    pub fn floor_f32(x: f32) -> f32 {
        x.floor()
    }
    #[inline(always)]
    pub fn floor_f64(x: f64) -> f64 {
        x.floor()
    }
    #[inline(always)]
    pub fn powf_f32(x: f32, p: f32) -> f32 {
        x.powf(p)
    }
    #[inline(always)]
    pub fn powf_f64(x: f64, p: f64) -> f64 {
        x.powf(p)
    }
}

#[cfg(all(not(feature = "std"), feature = "libm"))]
mod float_ops {
    #[inline(always)]
    pub fn sqrt_f32(x: f32) -> f32 {
        libm::sqrtf(x)
    }
    #[inline(always)]
    pub fn sqrt_f64(x: f64) -> f64 {
        libm::sqrt(x)
    }
    #[inline(always)]
    pub fn abs_f32(x: f32) -> f32 {
        libm::fabsf(x)
    }
    #[inline(always)]
    pub fn abs_f64(x: f64) -> f64 {
        libm::fabs(x)
    }
    #[inline(always)]
    pub fn floor_f32(x: f32) -> f32 {
        libm::floorf(x)
    }
    #[inline(always)]
    pub fn floor_f64(x: f64) -> f64 {
        libm::floor(x)
    }
    #[inline(always)]
    pub fn powf_f32(x: f32, p: f32) -> f32 {
        libm::powf(x, p)
    }
    #[inline(always)]
    pub fn powf_f64(x: f64, p: f64) -> f64 {
        libm::pow(x, p)
    }
}

macro_rules! impl_scalar_float {
    ($t:ty, $suffix:ident, $eps:expr, $neg_inf:expr) => {
        ::paste::paste! {
        impl Scalar for $t {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
            const TWO: Self = 2.0;
            const HALF: Self = 0.5;
            const EPSILON: Self = $eps;
            const NEG_INFINITY: Self = $neg_inf;

            #[inline] fn sqrt(self) -> Self { float_ops::[<sqrt_ $suffix>](self) }
            #[inline] fn abs(self) -> Self { float_ops::[<abs_ $suffix>](self) }
            #[inline] fn floor(self) -> Self { float_ops::[<floor_ $suffix>](self) }
            #[inline] fn powf(self, p: Self) -> Self { float_ops::[<powf_ $suffix>](self, p) }

            #[inline] fn min(self, other: Self) -> Self { if self < other { self } else { other } }
            #[inline] fn max(self, other: Self) -> Self { if self > other { self } else { other } }
            #[inline] fn recip(self) -> Self { 1.0 as $t / self }

            #[inline] fn from_f64(v: f64) -> Self { v as $t }
            #[inline] fn to_f64(self) -> f64 { self as f64 }
            #[inline] fn from_i32(v: i32) -> Self { v as $t }
            #[inline] fn from_usize(v: usize) -> Self { v as $t }
        }
        }
    };
}

impl_scalar_float!(f32, f32, f32::EPSILON, f32::NEG_INFINITY);
impl_scalar_float!(f64, f64, f64::EPSILON, f64::NEG_INFINITY);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f64_basics() {
        assert_eq!(f64::ZERO, 0.0);
        assert_eq!(f64::ONE, 1.0);
        assert_eq!(Scalar::sqrt(4.0_f64), 2.0);
        assert_eq!(Scalar::abs(-3.0_f64), 3.0);
        assert_eq!(<f64 as Scalar>::from_usize(7), 7.0);
    }

    #[test]
    fn f32_basics() {
        assert_eq!(f32::ZERO, 0.0);
        assert_eq!(Scalar::powf(2.0_f32, 3.0), 8.0);
    }

    #[test]
    fn hypot_avoids_overflow() {
        let big = 1e200_f64;
        let h = Scalar::hypot(big, big);
        assert!(h.is_finite());
        assert!((h / big - 2.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(Scalar::hypot(0.0_f64, 0.0), 0.0);
        assert!((Scalar::hypot(3.0_f64, -4.0) - 5.0).abs() < 1e-15);
    }

    #[test]
    fn integral_check() {
        assert!(Scalar::is_integral(3.0_f64));
        assert!(!Scalar::is_integral(0.5_f64));
        assert!(Scalar::is_integral(-2.0_f32));
    }
}
