//! Geometric helpers: bounding boxes, segment projection and polygon measures.

use serde::{Deserialize, Serialize};

use crate::float::Float;
use crate::vec::Vec2;

/// Axis-aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Aabb<F: Float> {
    pub min: Vec2<F>,
    pub max: Vec2<F>,
}

impl<F: Float> Aabb<F> {
    pub fn new(min: Vec2<F>, max: Vec2<F>) -> Self {
        Aabb { min, max }
    }

    /// Box centered on `center` with the given half extents.
    pub fn from_center(center: Vec2<F>, half_extent: Vec2<F>) -> Self {
        Aabb { min: center - half_extent, max: center + half_extent }
    }

    /// Tight box around a set of points, `None` when the iterator is empty.
    pub fn from_points<I: IntoIterator<Item = Vec2<F>>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut aabb = Aabb { min: first, max: first };
        for p in iter {
            aabb.min = aabb.min.min(p);
            aabb.max = aabb.max.max(p);
        }
        Some(aabb)
    }

    /// Box around a circle.
    pub fn from_circle(center: Vec2<F>, radius: F) -> Self {
        Self::from_center(center, Vec2::splat(radius))
    }

    /// A copy expanded by `margin` on every side.
    pub fn grow(self, margin: F) -> Self {
        Aabb {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    /// Smallest box containing both.
    pub fn union(self, other: Self) -> Self {
        Aabb { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    /// `min <= max` on both axes and all components finite.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.x <= self.max.x && self.min.y <= self.max.y
    }

    /// Closed-interval overlap test (touching boxes overlap).
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn contains_point(&self, p: Vec2<F>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Self) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    pub fn center(&self) -> Vec2<F> {
        (self.min + self.max).scale(F::half())
    }

    pub fn size(&self) -> Vec2<F> {
        self.max - self.min
    }

    /// Largest side length.
    pub fn extent(&self) -> F {
        let s = self.size();
        s.x.max(s.y)
    }

    /// One of the four half-extent children: 0 = min-x/min-y, 1 = max-x/min-y,
    /// 2 = min-x/max-y, 3 = max-x/max-y.
    pub fn quadrant(&self, index: usize) -> Self {
        let c = self.center();
        match index {
            0 => Aabb::new(self.min, c),
            1 => Aabb::new(Vec2::new(c.x, self.min.y), Vec2::new(self.max.x, c.y)),
            2 => Aabb::new(Vec2::new(self.min.x, c.y), Vec2::new(c.x, self.max.y)),
            _ => Aabb::new(c, self.max),
        }
    }

    /// Index of the quadrant containing `p`, using the same layout as [`Aabb::quadrant`].
    pub fn quadrant_of(&self, p: Vec2<F>) -> usize {
        let c = self.center();
        let mut idx = 0;
        if p.x >= c.x { idx |= 1; }
        if p.y >= c.y { idx |= 2; }
        idx
    }
}

/// Closest point to `p` on segment `a`-`b`, with the interpolation parameter
/// `t` in [0, 1] such that the point equals `a.lerp(b, t)`.
///
/// A degenerate segment (a == b) returns `(a, 0)`.
pub fn closest_point_on_segment<F: Float>(p: Vec2<F>, a: Vec2<F>, b: Vec2<F>) -> (Vec2<F>, F) {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq == F::zero() {
        return (a, F::zero());
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(F::zero(), F::one());
    (a.lerp(b, t), t)
}

/// Signed area of a closed polygon (shoelace formula). Positive for
/// counter-clockwise winding in a y-up frame.
pub fn polygon_signed_area<F: Float, I>(points: I) -> F
where
    I: IntoIterator<Item = Vec2<F>>,
{
    let mut first = None;
    let mut prev: Option<Vec2<F>> = None;
    let mut sum = F::zero();
    for p in points {
        if let Some(q) = prev {
            sum = sum + q.cross(p);
        } else {
            first = Some(p);
        }
        prev = Some(p);
    }
    if let (Some(first), Some(last)) = (first, prev) {
        sum = sum + last.cross(first);
    }
    sum * F::half()
}

/// Even-odd point in polygon test.
pub fn polygon_contains<F: Float>(polygon: &[Vec2<F>], point: Vec2<F>) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let pi = polygon[i];
        let pj = polygon[j];
        let dy = pj.y - pi.y;
        if dy != F::zero()
            && ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / dy + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest_point_clamps_to_endpoints() {
        let a = Vec2::new(0.0f32, 0.0);
        let b = Vec2::new(10.0f32, 0.0);
        let (c, t) = closest_point_on_segment(Vec2::new(-5.0, 3.0), a, b);
        assert_eq!(c, a);
        assert_eq!(t, 0.0);
        let (c, t) = closest_point_on_segment(Vec2::new(4.0, 3.0), a, b);
        assert_eq!(c, Vec2::new(4.0, 0.0));
        assert!((t - 0.4).abs() < 1e-6);
    }

    #[test]
    fn degenerate_segment() {
        let a = Vec2::new(1.0f64, 1.0);
        let (c, t) = closest_point_on_segment(Vec2::new(5.0, 5.0), a, a);
        assert_eq!(c, a);
        assert_eq!(t, 0.0);
    }

    #[test]
    fn unit_square_area_and_winding() {
        let ccw = [
            Vec2::new(0.0f64, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        assert!((polygon_signed_area(ccw.iter().copied()) - 1.0).abs() < 1e-12);
        assert!((polygon_signed_area(ccw.iter().rev().copied()) + 1.0).abs() < 1e-12);
        assert!(polygon_contains(&ccw, Vec2::new(0.5, 0.5)));
        assert!(!polygon_contains(&ccw, Vec2::new(1.5, 0.5)));
    }

    #[test]
    fn aabb_overlap_and_quadrants() {
        let a = Aabb::new(Vec2::new(0.0f32, 0.0), Vec2::new(4.0, 4.0));
        let b = Aabb::new(Vec2::new(4.0f32, 4.0), Vec2::new(5.0, 5.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&b.grow(-0.5)));
        assert_eq!(a.quadrant(3), Aabb::new(Vec2::new(2.0, 2.0), Vec2::new(4.0, 4.0)));
        assert_eq!(a.quadrant_of(Vec2::new(3.0, 1.0)), 1);
        assert!(!Aabb::new(Vec2::new(1.0f32, 0.0), Vec2::new(0.0, 1.0)).is_valid());
    }
}
