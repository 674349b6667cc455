//! Planar vector type used throughout the kernel.

use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::float::Float;

/// A point or direction in the plane. `+y` points down in world space.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Vec2<F: Float> {
    pub x: F,
    pub y: F,
}

impl<F: Float> Vec2<F> {
    pub fn new(x: F, y: F) -> Self { Vec2 { x, y } }

    pub fn zero() -> Self { Vec2 { x: F::zero(), y: F::zero() } }

    pub fn splat(value: F) -> Self { Vec2 { x: value, y: value } }

    pub fn dot(self, other: Self) -> F { self.x * other.x + self.y * other.y }

    /// Z component of the 3D cross product.
    pub fn cross(self, other: Self) -> F {
        self.x * other.y - self.y * other.x
    }

    /// Rotated a quarter turn; `(x, y) -> (-y, x)`.
    pub fn perp(self) -> Self {
        Vec2 { x: -self.y, y: self.x }
    }

    pub fn scale(self, s: F) -> Self { Vec2 { x: self.x * s, y: self.y * s } }

    pub fn length_sq(self) -> F { self.dot(self) }

    pub fn length(self) -> F { self.length_sq().sqrt() }

    /// Unit vector in the same direction, or `None` for a zero-length vector.
    pub fn normalize(self) -> Option<Self> {
        let len = self.length();
        if len == F::zero() || !len.is_finite() {
            None
        } else {
            Some(self.scale(F::one() / len))
        }
    }

    pub fn distance(self, other: Self) -> F { (self - other).length() }

    pub fn distance_sq(self, other: Self) -> F { (self - other).length_sq() }

    pub fn lerp(self, other: Self, t: F) -> Self {
        self + (other - self).scale(t)
    }

    /// Component-wise minimum.
    pub fn min(self, other: Self) -> Self {
        Vec2 { x: self.x.min(other.x), y: self.y.min(other.y) }
    }

    /// Component-wise maximum.
    pub fn max(self, other: Self) -> Self {
        Vec2 { x: self.x.max(other.x), y: self.y.max(other.y) }
    }

    pub fn is_finite(self) -> bool { self.x.is_finite() && self.y.is_finite() }
}

impl<F: Float> Add for Vec2<F> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self { Vec2 { x: self.x + rhs.x, y: self.y + rhs.y } }
}

impl<F: Float> Sub for Vec2<F> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self { Vec2 { x: self.x - rhs.x, y: self.y - rhs.y } }
}

impl<F: Float> Neg for Vec2<F> {
    type Output = Self;
    fn neg(self) -> Self { Vec2 { x: -self.x, y: -self.y } }
}

impl<F: Float> AddAssign for Vec2<F> {
    fn add_assign(&mut self, rhs: Self) { *self = *self + rhs; }
}

impl<F: Float> SubAssign for Vec2<F> {
    fn sub_assign(&mut self, rhs: Self) { *self = *self - rhs; }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec2_length() {
        let v = Vec2::new(3.0f32, 4.0);
        assert!((v.length() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn cross_of_axes() {
        let i = Vec2::new(1.0f32, 0.0);
        let j = Vec2::new(0.0f32, 1.0);
        assert_eq!(i.cross(j), 1.0);
        assert_eq!(j.cross(i), -1.0);
    }

    #[test]
    fn normalize_zero_vector() {
        assert_eq!(Vec2::<f32>::zero().normalize(), None);
    }

    #[test]
    fn lerp_midpoint() {
        let a = Vec2::new(0.0f32, 0.0);
        let b = Vec2::new(10.0f32, 10.0);
        let mid = a.lerp(b, 0.5);
        assert!((mid.x - 5.0).abs() < 1e-6);
        assert!((mid.y - 5.0).abs() < 1e-6);
    }

    #[test]
    fn distance_calculation() {
        let a = Vec2::new(0.0f32, 0.0);
        let b = Vec2::new(3.0f32, 4.0);
        assert!((a.distance(b) - 5.0).abs() < 1e-6);
    }
}
