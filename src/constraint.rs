//! Pairwise distance constraints solved by position-based relaxation.

use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::float::Float;
use crate::point_mass::PointMass;

/// Keeps two points of the same shape at a fixed distance.
///
/// Endpoints are indices into the owning shape's point arena, so copying a
/// shape copies its constraints without any remapping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct DistanceConstraint<F: Float> {
    pub a: usize,
    pub b: usize,
    rest_length: F,
    pub stiffness: F,
}

impl<F: Float> DistanceConstraint<F> {
    /// Link `a` and `b`, capturing the rest length from their current positions.
    pub fn new(a: usize, b: usize, points: &[PointMass<F>], stiffness: F) -> Result<Self, PhysicsError> {
        let count = points.len();
        for index in [a, b] {
            if index >= count {
                return Err(PhysicsError::PointOutOfBounds { index, count });
            }
        }
        let rest_length = points[a].pos.distance(points[b].pos);
        Self::with_rest_length(a, b, rest_length, stiffness)
    }

    pub fn with_rest_length(a: usize, b: usize, rest_length: F, stiffness: F) -> Result<Self, PhysicsError> {
        if !(stiffness >= F::zero() && stiffness <= F::one()) {
            return Err(PhysicsError::InvalidStiffness);
        }
        Ok(DistanceConstraint { a, b, rest_length, stiffness })
    }

    pub fn rest_length(&self) -> F {
        self.rest_length
    }

    /// Per-pass stiffness `1 - (1 - k)^(1/n)`, so `n` substeps together
    /// remove the same fraction of error as one pass at stiffness `k`.
    pub fn effective_stiffness(&self, substeps: usize) -> F {
        let n = F::from_usize(substeps.max(1));
        F::one() - (F::one() - self.stiffness).powf(F::one() / n)
    }

    /// Signed violation `rest_length - current_length`.
    pub fn error(&self, points: &[PointMass<F>]) -> F {
        self.rest_length - points[self.a].pos.distance(points[self.b].pos)
    }

    /// One relaxation pass. Pinned endpoints are never moved.
    pub fn relax(&self, points: &mut [PointMass<F>], substeps: usize) {
        self.relax_with(points, self.effective_stiffness(substeps));
    }

    pub(crate) fn relax_with(&self, points: &mut [PointMass<F>], stiffness: F) {
        let (a, b) = (self.a, self.b);
        let wa = points[a].effective_inv_mass();
        let wb = points[b].effective_inv_mass();
        let w_total = wa + wb;
        if w_total == F::zero() {
            return;
        }

        let delta = points[b].pos - points[a].pos;
        let dist = delta.length();
        if dist == F::zero() {
            return;
        }
        let error = self.rest_length - dist;
        if error.abs() <= F::epsilon() * self.rest_length.max(F::one()) {
            return;
        }

        let correction = delta.scale(error / dist * stiffness);
        if !points[a].pinned {
            points[a].pos -= correction.scale(wa / w_total);
        }
        if !points[b].pinned {
            points[b].pos += correction.scale(wb / w_total);
        }
    }

    pub fn references(&self, index: usize) -> bool {
        self.a == index || self.b == index
    }

    /// Shift endpoint indices down after the point at `removed` left the arena.
    /// Must only be called on constraints that do not reference `removed`.
    pub(crate) fn remap_after_removal(&mut self, removed: usize) {
        if self.a > removed {
            self.a -= 1;
        }
        if self.b > removed {
            self.b -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec::Vec2;

    fn pair(distance: f64) -> Vec<PointMass<f64>> {
        vec![
            PointMass::new(Vec2::new(0.0, 0.0), 1.0),
            PointMass::new(Vec2::new(distance, 0.0), 1.0),
        ]
    }

    #[test]
    fn rest_length_captured_from_positions() {
        let points = pair(7.0);
        let c = DistanceConstraint::new(0, 1, &points, 1.0).unwrap();
        assert_eq!(c.rest_length(), 7.0);
    }

    #[test]
    fn rejects_out_of_range_stiffness_and_indices() {
        let points = pair(1.0);
        assert_eq!(
            DistanceConstraint::new(0, 1, &points, 1.5).unwrap_err(),
            PhysicsError::InvalidStiffness
        );
        assert_eq!(
            DistanceConstraint::new(0, 2, &points, 1.0).unwrap_err(),
            PhysicsError::PointOutOfBounds { index: 2, count: 2 }
        );
    }

    #[test]
    fn full_stiffness_solves_in_one_pass() {
        let mut points = pair(10.0);
        let c = DistanceConstraint::with_rest_length(0, 1, 5.0, 1.0).unwrap();
        c.relax(&mut points, 4);
        assert!((c.error(&points)).abs() < 1e-12);
        // equal masses split the correction evenly
        assert!((points[0].pos.x - 2.5).abs() < 1e-12);
        assert!((points[1].pos.x - 7.5).abs() < 1e-12);
    }

    #[test]
    fn effective_stiffness_compounds_to_nominal() {
        let c = DistanceConstraint::<f64>::with_rest_length(0, 1, 1.0, 0.5).unwrap();
        let k = c.effective_stiffness(4);
        let remaining = (1.0 - k).powi(4);
        assert!((remaining - 0.5).abs() < 1e-12);
    }

    #[test]
    fn pinned_endpoint_takes_no_correction() {
        let mut points = pair(10.0);
        points[0].pin();
        let c = DistanceConstraint::with_rest_length(0, 1, 5.0, 1.0).unwrap();
        c.relax(&mut points, 1);
        assert_eq!(points[0].pos, Vec2::new(0.0, 0.0));
        assert!((points[1].pos.x - 5.0).abs() < 1e-12);
    }

    #[test]
    fn remap_shifts_higher_indices() {
        let mut c = DistanceConstraint::<f32>::with_rest_length(3, 5, 1.0, 1.0).unwrap();
        c.remap_after_removal(4);
        assert_eq!((c.a, c.b), (3, 4));
    }
}
