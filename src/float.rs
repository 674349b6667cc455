//! Scalar abstraction so the whole kernel runs on `f32` or `f64`.

use core::ops::{Add, Div, Mul, Neg, Sub};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Floating-point scalar used by every kernel type.
///
/// Transcendental functions go through `libm` so a run is reproducible bit
/// for bit across platforms. The `Send + Sync + 'static` and serde bounds
/// let shapes cross into the gravity worker and into snapshots.
pub trait Float:
    Copy
    + PartialEq
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Default
    + core::fmt::Debug
    + core::fmt::Display
    + Send
    + Sync
    + Serialize
    + DeserializeOwned
    + 'static
{
    fn zero() -> Self;
    fn one() -> Self;
    fn half() -> Self;
    fn two() -> Self;
    fn pi() -> Self;
    /// Machine epsilon of the underlying type.
    fn epsilon() -> Self;
    fn sqrt(self) -> Self;
    fn powf(self, exp: Self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn abs(self) -> Self;
    fn min(self, other: Self) -> Self;
    fn max(self, other: Self) -> Self;
    /// Constants and configuration literals.
    fn from_f32(v: f32) -> Self;
    /// Counts (substeps, segments, grid cells).
    fn from_usize(v: usize) -> Self;
    /// Lossy widening, for log fields.
    fn to_f64(self) -> f64;
    fn is_finite(self) -> bool;

    fn clamp(self, lo: Self, hi: Self) -> Self {
        self.max(lo).min(hi)
    }

    fn sq(self) -> Self {
        self * self
    }

    /// -1, 0 or 1; zero stays zero.
    fn signum(self) -> Self {
        if self > Self::zero() {
            Self::one()
        } else if self < Self::zero() {
            -Self::one()
        } else {
            Self::zero()
        }
    }
}

macro_rules! impl_float {
    ($t:ident, $sqrt:path, $pow:path, $sin:path, $cos:path, $fabs:path) => {
        impl Float for $t {
            #[inline] fn zero() -> Self { 0.0 }
            #[inline] fn one() -> Self { 1.0 }
            #[inline] fn half() -> Self { 0.5 }
            #[inline] fn two() -> Self { 2.0 }
            #[inline] fn pi() -> Self { core::$t::consts::PI }
            #[inline] fn epsilon() -> Self { $t::EPSILON }
            #[inline] fn sqrt(self) -> Self { $sqrt(self) }
            #[inline] fn powf(self, exp: Self) -> Self { $pow(self, exp) }
            #[inline] fn sin(self) -> Self { $sin(self) }
            #[inline] fn cos(self) -> Self { $cos(self) }
            #[inline] fn abs(self) -> Self { $fabs(self) }
            #[inline] fn min(self, other: Self) -> Self { if other < self { other } else { self } }
            #[inline] fn max(self, other: Self) -> Self { if other > self { other } else { self } }
            #[inline] fn from_f32(v: f32) -> Self { v as $t }
            #[inline] fn from_usize(v: usize) -> Self { v as $t }
            #[inline] fn to_f64(self) -> f64 { self as f64 }
            #[inline] fn is_finite(self) -> bool { $t::is_finite(self) }
        }
    };
}

impl_float!(f32, libm::sqrtf, libm::powf, libm::sinf, libm::cosf, libm::fabsf);
impl_float!(f64, libm::sqrt, libm::pow, libm::sin, libm::cos, libm::fabs);
