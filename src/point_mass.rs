//! Verlet point masses with implicit velocity.

use core::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::float::Float;
use crate::vec::Vec2;

/// Radius of a unit-mass point; radius grows with the square root of mass
/// so the disc area stays proportional to mass.
pub const RADIUS_PER_SQRT_MASS: f32 = 5.0;

static NEXT_POINT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identifier of a point, unique across the whole process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointId(pub u64);

impl PointId {
    pub fn next() -> Self {
        PointId(NEXT_POINT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Make sure freshly issued ids never collide with `self` (used after a
    /// snapshot restore brings back ids issued by an earlier run).
    pub(crate) fn reserve(self) {
        NEXT_POINT_ID.fetch_max(self.0 + 1, Ordering::Relaxed);
    }
}

/// A point mass integrated with Störmer-Verlet.
///
/// Velocity is never stored: it is `pos - prev_pos`, the displacement over
/// the last substep. Forces accumulate into `force` and are consumed by
/// [`PointMass::integrate`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PointMass<F: Float> {
    pub id: PointId,
    pub pos: Vec2<F>,
    pub prev_pos: Vec2<F>,
    pub force: Vec2<F>,
    /// Force consumed by the previous integration, read by friction.
    pub prev_force: Vec2<F>,
    mass: F,
    inv_mass: F,
    radius: F,
    pub pinned: bool,
}

impl<F: Float> PointMass<F> {
    pub fn new(pos: Vec2<F>, mass: F) -> Self {
        let mut point = PointMass {
            id: PointId::next(),
            pos,
            prev_pos: pos,
            force: Vec2::zero(),
            prev_force: Vec2::zero(),
            mass: F::zero(),
            inv_mass: F::zero(),
            radius: F::zero(),
            pinned: false,
        };
        point.set_mass(mass);
        point
    }

    pub fn pinned(pos: Vec2<F>, mass: F) -> Self {
        let mut point = Self::new(pos, mass);
        point.pinned = true;
        point
    }

    pub fn mass(&self) -> F { self.mass }

    /// `1 / mass`, or zero for a massless point. Ignores the pinned flag; see
    /// [`PointMass::effective_inv_mass`].
    pub fn inv_mass(&self) -> F { self.inv_mass }

    pub fn radius(&self) -> F { self.radius }

    /// Inverse mass as seen by constraints and contacts: zero when pinned.
    pub fn effective_inv_mass(&self) -> F {
        if self.pinned { F::zero() } else { self.inv_mass }
    }

    /// Set the mass and re-derive inverse mass and radius.
    pub fn set_mass(&mut self, mass: F) {
        let mass = if mass.is_finite() && mass > F::zero() { mass } else { F::zero() };
        self.mass = mass;
        self.inv_mass = if mass > F::zero() { F::one() / mass } else { F::zero() };
        self.radius = F::from_f32(RADIUS_PER_SQRT_MASS) * mass.sqrt();
    }

    pub fn apply_force(&mut self, force: Vec2<F>) {
        if !self.pinned {
            self.force += force;
        }
    }

    /// Instantaneous change of momentum, expressed in per-substep units.
    pub fn apply_impulse(&mut self, impulse: Vec2<F>) {
        if !self.pinned {
            self.prev_pos -= impulse.scale(self.inv_mass);
        }
    }

    /// One Verlet substep. `gravity` is an acceleration, applied as
    /// `mass * gravity` when present.
    pub fn integrate(&mut self, dt: F, gravity: Option<Vec2<F>>, damping: F) {
        if self.pinned {
            return;
        }
        if let Some(g) = gravity {
            self.force += g.scale(self.mass);
        }
        let acceleration = self.force.scale(self.inv_mass);
        let velocity = (self.pos - self.prev_pos).scale(damping);
        self.prev_pos = self.pos;
        self.pos = self.pos + velocity + acceleration.scale(dt * dt);
        self.prev_force = self.force;
        self.force = Vec2::zero();
    }

    /// Displacement over the last substep.
    pub fn velocity(&self) -> Vec2<F> {
        self.pos - self.prev_pos
    }

    /// Velocity in world units per second for a substep of length `dt`.
    pub fn velocity_per_second(&self, dt: F) -> Vec2<F> {
        if dt == F::zero() {
            return Vec2::zero();
        }
        self.velocity().scale(F::one() / dt)
    }

    pub fn set_velocity(&mut self, velocity: Vec2<F>) {
        if !self.pinned {
            self.prev_pos = self.pos - velocity;
        }
    }

    /// Move by `delta` while keeping the implicit velocity unchanged.
    pub fn translate(&mut self, delta: Vec2<F>) {
        if !self.pinned {
            self.pos += delta;
            self.prev_pos += delta;
        }
    }

    pub fn pin(&mut self) {
        self.pinned = true;
        self.prev_pos = self.pos;
        self.force = Vec2::zero();
    }

    pub fn unpin(&mut self) {
        self.pinned = false;
        self.prev_pos = self.pos;
    }

    /// Drag a pinned point to `pos` (editor tools). Free points are left alone.
    pub fn move_to(&mut self, pos: Vec2<F>) {
        if self.pinned {
            self.pos = pos;
            self.prev_pos = pos;
        }
    }

    /// `0.5 * m * v^2` with `v` in per-substep units.
    pub fn kinetic_energy(&self) -> F {
        F::half() * self.mass * self.velocity().length_sq()
    }
}
