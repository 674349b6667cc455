//! Static colliders: immovable geometry that points bounce off.

use serde::{Deserialize, Serialize};

use crate::float::Float;
use crate::geometry::{closest_point_on_segment, Aabb};
use crate::vec::Vec2;

/// Immovable collision geometry owned by the simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub enum StaticCollider<F: Float> {
    /// A line segment, solid from both sides.
    Segment { a: Vec2<F>, b: Vec2<F> },
    /// A world box; points are kept inside it.
    Bounds { min: Vec2<F>, max: Vec2<F> },
}

/// Where a circle touches a static collider.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StaticContact<F: Float> {
    /// Unit normal pointing from the collider towards the point.
    pub normal: Vec2<F>,
    pub depth: F,
}

impl<F: Float> StaticCollider<F> {
    /// Horizontal segment at height `y` spanning `[x_min, x_max]`.
    pub fn floor(y: F, x_min: F, x_max: F) -> Self {
        StaticCollider::Segment { a: Vec2::new(x_min, y), b: Vec2::new(x_max, y) }
    }

    pub fn aabb(&self) -> Aabb<F> {
        match *self {
            StaticCollider::Segment { a, b } => Aabb::new(a.min(b), a.max(b)),
            StaticCollider::Bounds { min, max } => Aabb::new(min, max),
        }
    }

    /// Penetration of a circle of `radius` at `pos`, `None` when separated.
    ///
    /// `prev_pos` disambiguates which side of a segment the point came from,
    /// so a fast point that crossed the centre line is pushed back out the
    /// way it came rather than through.
    pub fn contact(&self, pos: Vec2<F>, prev_pos: Vec2<F>, radius: F) -> Option<StaticContact<F>> {
        match *self {
            StaticCollider::Segment { a, b } => {
                let (closest, t) = closest_point_on_segment(pos, a, b);
                let offset = pos - closest;
                let dist = offset.length();
                let edge_normal = (b - a).perp().normalize();
                let side = |p: Vec2<F>| edge_normal.map(|n| (p - a).dot(n));

                let interior = t > F::zero() && t < F::one();
                let crossed = interior
                    && match (side(prev_pos), side(pos)) {
                        (Some(before), Some(now)) => before * now < F::zero(),
                        _ => false,
                    };
                if crossed {
                    let n = edge_normal?;
                    let n = if side(prev_pos)? < F::zero() { -n } else { n };
                    return Some(StaticContact { normal: n, depth: radius + dist });
                }
                if dist >= radius {
                    return None;
                }
                let normal = match offset.normalize() {
                    Some(n) => n,
                    None => {
                        // centre exactly on the line: use the approach side
                        let n = edge_normal?;
                        if side(prev_pos)? < F::zero() { -n } else { n }
                    }
                };
                Some(StaticContact { normal, depth: radius - dist })
            }
            StaticCollider::Bounds { min, max } => {
                let mut best: Option<StaticContact<F>> = None;
                let candidates = [
                    (pos.x - radius - min.x, Vec2::new(F::one(), F::zero())),
                    (max.x - (pos.x + radius), Vec2::new(-F::one(), F::zero())),
                    (pos.y - radius - min.y, Vec2::new(F::zero(), F::one())),
                    (max.y - (pos.y + radius), Vec2::new(F::zero(), -F::one())),
                ];
                for (gap, normal) in candidates {
                    if gap < F::zero() {
                        let depth = -gap;
                        if best.map_or(true, |b| depth > b.depth) {
                            best = Some(StaticContact { normal, depth });
                        }
                    }
                }
                best
            }
        }
    }
}
