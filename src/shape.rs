//! Mass shapes: point arenas tied together by distance constraints.
//!
//! A [`MassShape`] owns its points and the constraints between them. Points
//! live in a dense `Vec` and constraints refer to them by index, so copying a
//! shape is a plain clone and deleting a point is an index remap.
//!
//! Shapes are created through the factory functions ([`MassShape::particle`],
//! [`MassShape::rectangle`], [`MassShape::ball`], [`MassShape::balloon`],
//! [`MassShape::chain`], [`MassShape::cloth`], [`MassShape::pendulum`],
//! [`MassShape::freeform`]) and advanced by the simulation one substep at a
//! time: pressure, relaxation, integration.

use core::sync::atomic::{AtomicU64, Ordering};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constraint::DistanceConstraint;
use crate::error::PhysicsError;
use crate::float::Float;
use crate::geometry::{polygon_contains, polygon_signed_area, Aabb};
use crate::point_mass::{PointId, PointMass};
use crate::vec::Vec2;

static NEXT_SHAPE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identifier of a shape, unique across the whole process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeId(pub u64);

impl ShapeId {
    pub fn next() -> Self {
        ShapeId(NEXT_SHAPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn reserve(self) {
        NEXT_SHAPE_ID.fetch_max(self.0 + 1, Ordering::Relaxed);
    }
}

/// Which factory built a shape. Only informational after construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    Particle,
    Box,
    Ball,
    Chain,
    Cloth,
    Pendulum,
    Freeform,
}

/// Ordered boundary of a shape. Consecutive indices form edges; a closed
/// outline also joins the last index back to the first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub indices: Vec<usize>,
    pub closed: bool,
}

impl Outline {
    pub fn closed(indices: Vec<usize>) -> Self {
        Outline { indices, closed: true }
    }

    pub fn open(indices: Vec<usize>) -> Self {
        Outline { indices, closed: false }
    }

    /// Boundary edges as pairs of point indices.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let n = self.indices.len();
        let count = match (n, self.closed) {
            (0 | 1, _) => 0,
            (2, _) => 1,
            (_, true) => n,
            (_, false) => n - 1,
        };
        (0..count).map(move |i| (self.indices[i], self.indices[(i + 1) % n]))
    }

    fn remove_index(&mut self, removed: usize) {
        self.indices.retain(|&i| i != removed);
        for i in self.indices.iter_mut() {
            if *i > removed {
                *i -= 1;
            }
        }
    }
}

/// Configuration for a cloth grid.
#[derive(Clone, Debug)]
pub struct ClothConfig<F: Float> {
    pub cols: usize,
    pub rows: usize,
    pub spacing: F,
    pub structural_stiffness: F,
    pub shear_stiffness: F,
    pub bend_stiffness: F,
    pub point_mass: F,
}

/// A body made of point masses and distance constraints.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct MassShape<F: Float> {
    pub id: ShapeId,
    pub kind: ShapeKind,
    points: Vec<PointMass<F>>,
    constraints: Vec<DistanceConstraint<F>>,
    outline: Outline,
    /// Gas amount driving internal pressure; `None` for uninflated shapes.
    pub inflation: Option<F>,
    marked_for_deletion: bool,
    #[serde(skip)]
    order: Vec<usize>,
}

fn check_mass<F: Float>(mass: F) -> Result<F, PhysicsError> {
    if mass.is_finite() && mass > F::zero() {
        Ok(mass)
    } else {
        Err(PhysicsError::InvalidMass)
    }
}

impl<F: Float> MassShape<F> {
    fn from_parts(
        kind: ShapeKind,
        points: Vec<PointMass<F>>,
        constraints: Vec<DistanceConstraint<F>>,
        outline: Outline,
    ) -> Self {
        let marked_for_deletion = points.is_empty();
        MassShape {
            id: ShapeId::next(),
            kind,
            points,
            constraints,
            outline,
            inflation: None,
            marked_for_deletion,
            order: Vec::new(),
        }
    }

    /// A single free point.
    pub fn particle(pos: Vec2<F>, mass: F) -> Result<Self, PhysicsError> {
        let mass = check_mass(mass)?;
        let points = vec![PointMass::new(pos, mass)];
        Ok(Self::from_parts(ShapeKind::Particle, points, Vec::new(), Outline::closed(vec![0])))
    }

    /// A four-corner box braced on both diagonals.
    pub fn rectangle(
        center: Vec2<F>,
        width: F,
        height: F,
        corner_mass: F,
        stiffness: F,
    ) -> Result<Self, PhysicsError> {
        let corner_mass = check_mass(corner_mass)?;
        let hw = width * F::half();
        let hh = height * F::half();
        let corners = [
            Vec2::new(center.x - hw, center.y - hh),
            Vec2::new(center.x + hw, center.y - hh),
            Vec2::new(center.x + hw, center.y + hh),
            Vec2::new(center.x - hw, center.y + hh),
        ];
        let points: Vec<_> = corners.iter().map(|&c| PointMass::new(c, corner_mass)).collect();
        let mut constraints = Vec::with_capacity(6);
        for i in 0..4 {
            constraints.push(DistanceConstraint::new(i, (i + 1) % 4, &points, stiffness)?);
        }
        constraints.push(DistanceConstraint::new(0, 2, &points, stiffness)?);
        constraints.push(DistanceConstraint::new(1, 3, &points, stiffness)?);
        Ok(Self::from_parts(ShapeKind::Box, points, constraints, Outline::closed(vec![0, 1, 2, 3])))
    }

    fn ring(center: Vec2<F>, radius: F, segments: usize, point_mass: F) -> Vec<PointMass<F>> {
        let two_pi = F::two() * F::pi();
        (0..segments)
            .map(|i| {
                let angle = two_pi * F::from_usize(i) / F::from_usize(segments);
                let pos = Vec2::new(center.x + radius * angle.cos(), center.y + radius * angle.sin());
                PointMass::new(pos, point_mass)
            })
            .collect()
    }

    fn ring_edges(points: &[PointMass<F>], stiffness: F) -> Result<Vec<DistanceConstraint<F>>, PhysicsError> {
        let n = points.len();
        (0..n)
            .map(|i| DistanceConstraint::new(i, (i + 1) % n, points, stiffness))
            .collect()
    }

    /// A solid ring held in shape by links between opposite points.
    pub fn ball(
        center: Vec2<F>,
        radius: F,
        segments: usize,
        point_mass: F,
        stiffness: F,
    ) -> Result<Self, PhysicsError> {
        if segments < 3 {
            return Err(PhysicsError::InsufficientSegments);
        }
        let point_mass = check_mass(point_mass)?;
        let points = Self::ring(center, radius, segments, point_mass);
        let mut constraints = Self::ring_edges(&points, stiffness)?;

        // Cross links for structural integrity (connect opposite points)
        if segments >= 4 {
            let half = segments / 2;
            for i in 0..half {
                constraints.push(DistanceConstraint::new(i, i + half, &points, stiffness * F::half())?);
            }
        }

        let outline = Outline::closed((0..segments).collect());
        Ok(Self::from_parts(ShapeKind::Ball, points, constraints, outline))
    }

    /// A ring with no internal links, kept round by gas pressure.
    pub fn balloon(
        center: Vec2<F>,
        radius: F,
        segments: usize,
        point_mass: F,
        stiffness: F,
        gas_amount: F,
    ) -> Result<Self, PhysicsError> {
        if segments < 3 {
            return Err(PhysicsError::InsufficientSegments);
        }
        let point_mass = check_mass(point_mass)?;
        let points = Self::ring(center, radius, segments, point_mass);
        let constraints = Self::ring_edges(&points, stiffness)?;
        let outline = Outline::closed((0..segments).collect());
        let mut shape = Self::from_parts(ShapeKind::Ball, points, constraints, outline);
        shape.inflation = Some(gas_amount);
        Ok(shape)
    }

    /// A rope of `segments` links from `start` to `end`.
    pub fn chain(
        start: Vec2<F>,
        end: Vec2<F>,
        segments: usize,
        point_mass: F,
        stiffness: F,
    ) -> Result<Self, PhysicsError> {
        if segments < 1 {
            return Err(PhysicsError::InsufficientSegments);
        }
        let point_mass = check_mass(point_mass)?;
        let points: Vec<_> = (0..=segments)
            .map(|i| {
                let t = F::from_usize(i) / F::from_usize(segments);
                PointMass::new(start.lerp(end, t), point_mass)
            })
            .collect();
        let constraints = (0..segments)
            .map(|i| DistanceConstraint::new(i, i + 1, &points, stiffness))
            .collect::<Result<Vec<_>, _>>()?;
        let outline = Outline::open((0..=segments).collect());
        Ok(Self::from_parts(ShapeKind::Chain, points, constraints, outline))
    }

    /// A chain hanging from a pinned `anchor`, ending in a heavier bob.
    pub fn pendulum(
        anchor: Vec2<F>,
        bob: Vec2<F>,
        segments: usize,
        link_mass: F,
        bob_mass: F,
    ) -> Result<Self, PhysicsError> {
        let bob_mass = check_mass(bob_mass)?;
        let mut shape = Self::chain(anchor, bob, segments, link_mass, F::one())?;
        shape.kind = ShapeKind::Pendulum;
        shape.points[0].pin();
        if let Some(last) = shape.points.last_mut() {
            last.set_mass(bob_mass);
        }
        Ok(shape)
    }

    /// Cloth grid extending in +x (columns) and +y (rows) from `origin`.
    ///
    /// Point at (col, row) has index `row * cols + col`. Three families of
    /// links are created:
    /// - Structural: horizontal + vertical neighbours (rest = spacing)
    /// - Shear: diagonal neighbours (rest = spacing * sqrt(2))
    /// - Bend: skip-one horizontal + vertical (rest = spacing * 2)
    pub fn cloth(origin: Vec2<F>, config: &ClothConfig<F>) -> Result<Self, PhysicsError> {
        let (cols, rows) = (config.cols, config.rows);
        if cols < 2 || rows < 2 {
            return Err(PhysicsError::InvalidGridDimensions);
        }
        let point_mass = check_mass(config.point_mass)?;
        let spacing = config.spacing;
        let idx = |col: usize, row: usize| row * cols + col;

        let mut points = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                let x = origin.x + F::from_usize(col) * spacing;
                let y = origin.y + F::from_usize(row) * spacing;
                points.push(PointMass::new(Vec2::new(x, y), point_mass));
            }
        }

        let mut constraints = Vec::new();
        let mut link = |a: usize, b: usize, k: F| -> Result<(), PhysicsError> {
            constraints.push(DistanceConstraint::new(a, b, &points, k)?);
            Ok(())
        };

        // Structural
        for row in 0..rows {
            for col in 0..cols - 1 {
                link(idx(col, row), idx(col + 1, row), config.structural_stiffness)?;
            }
        }
        for row in 0..rows - 1 {
            for col in 0..cols {
                link(idx(col, row), idx(col, row + 1), config.structural_stiffness)?;
            }
        }

        // Shear
        for row in 0..rows - 1 {
            for col in 0..cols - 1 {
                link(idx(col, row), idx(col + 1, row + 1), config.shear_stiffness)?;
                link(idx(col + 1, row), idx(col, row + 1), config.shear_stiffness)?;
            }
        }

        // Bend
        for row in 0..rows {
            for col in 0..cols.saturating_sub(2) {
                link(idx(col, row), idx(col + 2, row), config.bend_stiffness)?;
            }
        }
        for row in 0..rows.saturating_sub(2) {
            for col in 0..cols {
                link(idx(col, row), idx(col, row + 2), config.bend_stiffness)?;
            }
        }

        let mut perimeter = Vec::with_capacity(2 * (cols + rows));
        perimeter.extend((0..cols).map(|c| idx(c, 0)));
        perimeter.extend((1..rows).map(|r| idx(cols - 1, r)));
        perimeter.extend((0..cols - 1).rev().map(|c| idx(c, rows - 1)));
        perimeter.extend((1..rows - 1).rev().map(|r| idx(0, r)));

        Ok(Self::from_parts(ShapeKind::Cloth, points, constraints, Outline::closed(perimeter)))
    }

    /// Points with the given positions and masses and no links yet; connect
    /// them with [`MassShape::link`]. The outline follows insertion order.
    pub fn freeform(points: &[(Vec2<F>, F)], closed: bool) -> Result<Self, PhysicsError> {
        let points = points
            .iter()
            .map(|&(pos, mass)| Ok(PointMass::new(pos, check_mass(mass)?)))
            .collect::<Result<Vec<_>, PhysicsError>>()?;
        let outline = Outline { indices: (0..points.len()).collect(), closed };
        Ok(Self::from_parts(ShapeKind::Freeform, points, Vec::new(), outline))
    }

    // ---- editing -------------------------------------------------------

    /// Append a point; it joins the end of the outline.
    pub fn add_point(&mut self, pos: Vec2<F>, mass: F) -> Result<PointId, PhysicsError> {
        let point = PointMass::new(pos, check_mass(mass)?);
        let id = point.id;
        self.outline.indices.push(self.points.len());
        self.points.push(point);
        self.marked_for_deletion = false;
        Ok(id)
    }

    /// Freeform link between two existing points, rest length taken from
    /// their current separation.
    pub fn link(&mut self, a: usize, b: usize, stiffness: F) -> Result<(), PhysicsError> {
        let c = DistanceConstraint::new(a, b, &self.points, stiffness)?;
        self.constraints.push(c);
        Ok(())
    }

    pub fn index_of(&self, id: PointId) -> Option<usize> {
        self.points.iter().position(|p| p.id == id)
    }

    /// Delete a point and every constraint that references it. A shape left
    /// without points is marked for deletion.
    pub fn remove_point(&mut self, id: PointId) -> Result<(), PhysicsError> {
        let index = self.index_of(id).ok_or(PhysicsError::PointNotFound { id: id.0 })?;
        self.points.remove(index);
        self.constraints.retain(|c| !c.references(index));
        for c in self.constraints.iter_mut() {
            c.remap_after_removal(index);
        }
        self.outline.remove_index(index);
        if self.points.is_empty() {
            self.marked_for_deletion = true;
        }
        Ok(())
    }

    /// Cut every link touching the point at `index`.
    pub fn tear_at(&mut self, index: usize) {
        self.constraints.retain(|c| !c.references(index));
    }

    pub fn pin_point(&mut self, index: usize) -> Result<(), PhysicsError> {
        let count = self.points.len();
        self.points
            .get_mut(index)
            .ok_or(PhysicsError::PointOutOfBounds { index, count })?
            .pin();
        Ok(())
    }

    /// A deep copy with fresh shape and point ids. Constraint indices stay valid.
    pub fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        copy.id = ShapeId::next();
        for p in copy.points.iter_mut() {
            p.id = PointId::next();
        }
        copy
    }

    /// Move every point by `delta` without changing velocities.
    pub fn translate(&mut self, delta: Vec2<F>) {
        for p in self.points.iter_mut() {
            p.translate(delta);
        }
    }

    pub fn mark_for_deletion(&mut self) {
        self.marked_for_deletion = true;
    }

    pub fn is_marked_for_deletion(&self) -> bool {
        self.marked_for_deletion
    }

    // ---- accessors -----------------------------------------------------

    pub fn points(&self) -> &[PointMass<F>] { &self.points }
    pub fn points_mut(&mut self) -> &mut [PointMass<F>] { &mut self.points }
    pub fn constraints(&self) -> &[DistanceConstraint<F>] { &self.constraints }
    pub fn outline(&self) -> &Outline { &self.outline }
    pub fn point_count(&self) -> usize { self.points.len() }
    pub fn constraint_count(&self) -> usize { self.constraints.len() }

    pub(crate) fn restore_ids(&self) {
        self.id.reserve();
        for p in &self.points {
            p.id.reserve();
        }
    }

    // ---- dynamics ------------------------------------------------------

    /// Accumulate gas pressure forces on every outline edge.
    ///
    /// Each edge pushes both endpoints outward with magnitude
    /// `len * gas_constant * gas_amount / (2 * area)`, so the push grows as
    /// the enclosed area shrinks.
    pub fn apply_pressure(&mut self, gas_constant: F) {
        let gas_amount = match self.inflation {
            Some(g) if self.outline.closed && self.outline.indices.len() >= 3 => g,
            _ => return,
        };
        let signed_area = self.area_signed();
        let area = signed_area.abs();
        if area == F::zero() {
            return;
        }
        // outward normal is -perp for counter-clockwise winding
        let orientation = -signed_area.signum();
        let edges: Vec<(usize, usize)> = self.outline.edges().collect();
        for (i, j) in edges {
            let edge = self.points[j].pos - self.points[i].pos;
            let len = edge.length();
            let normal = match edge.perp().normalize() {
                Some(n) => n.scale(orientation),
                None => continue,
            };
            let magnitude = len * gas_constant * gas_amount / (F::two() * area);
            let force = normal.scale(magnitude);
            self.points[i].apply_force(force);
            self.points[j].apply_force(force);
        }
    }

    /// Draw a new random constraint order; used once per substep.
    pub fn shuffle_constraints<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.order.clear();
        self.order.extend(0..self.constraints.len());
        self.order.shuffle(rng);
    }

    /// One pass over all constraints in the current shuffled order.
    pub fn relax_pass(&mut self, substeps: usize) {
        if self.order.len() != self.constraints.len() {
            self.order.clear();
            self.order.extend(0..self.constraints.len());
        }
        for &i in &self.order {
            self.constraints[i].relax(&mut self.points, substeps);
        }
    }

    /// Shuffle once, then run `iterations` relaxation passes.
    pub fn relax<R: Rng + ?Sized>(&mut self, iterations: usize, substeps: usize, rng: &mut R) {
        self.shuffle_constraints(rng);
        for _ in 0..iterations {
            self.relax_pass(substeps);
        }
    }

    pub fn integrate(&mut self, dt: F, gravity: Option<Vec2<F>>, damping: F) {
        for p in self.points.iter_mut() {
            p.integrate(dt, gravity, damping);
        }
    }

    /// Force spread over the points by mass, so every point gets the same
    /// acceleration.
    pub fn apply_force(&mut self, force: Vec2<F>) {
        let total = self.total_mass();
        if total == F::zero() {
            return;
        }
        for p in self.points.iter_mut() {
            let share = p.mass() / total;
            p.apply_force(force.scale(share));
        }
    }

    /// Instantaneous momentum change spread over the points by mass.
    pub fn apply_impulse(&mut self, impulse: Vec2<F>) {
        let total = self.total_mass();
        if total == F::zero() {
            return;
        }
        for p in self.points.iter_mut() {
            let share = p.mass() / total;
            p.apply_impulse(impulse.scale(share));
        }
    }

    /// Push the point nearest to `at`.
    pub fn apply_force_at_point(&mut self, at: Vec2<F>, force: Vec2<F>) {
        let nearest = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.pos.distance_sq(at)))
            .fold(None, |best: Option<(usize, F)>, (i, d)| match best {
                Some((_, bd)) if bd <= d => best,
                _ => Some((i, d)),
            });
        if let Some((i, _)) = nearest {
            self.points[i].apply_force(force);
        }
    }

    // ---- derived quantities -------------------------------------------

    pub fn total_mass(&self) -> F {
        self.points.iter().fold(F::zero(), |acc, p| acc + p.mass())
    }

    /// Mass-weighted mean position; falls back to the centroid when massless.
    pub fn center_of_mass(&self) -> Vec2<F> {
        let total = self.total_mass();
        if total == F::zero() {
            return self.centroid();
        }
        let sum = self
            .points
            .iter()
            .fold(Vec2::zero(), |acc, p| acc + p.pos.scale(p.mass()));
        sum.scale(F::one() / total)
    }

    /// Unweighted mean position.
    pub fn centroid(&self) -> Vec2<F> {
        if self.points.is_empty() {
            return Vec2::zero();
        }
        let sum = self.points.iter().fold(Vec2::zero(), |acc, p| acc + p.pos);
        sum.scale(F::one() / F::from_usize(self.points.len()))
    }

    /// Mass-weighted mean velocity (per substep).
    pub fn velocity(&self) -> Vec2<F> {
        let total = self.total_mass();
        if total == F::zero() {
            return Vec2::zero();
        }
        self.momentum().scale(F::one() / total)
    }

    pub fn momentum(&self) -> Vec2<F> {
        self.points
            .iter()
            .fold(Vec2::zero(), |acc, p| acc + p.velocity().scale(p.mass()))
    }

    /// Moment of inertia about the center of mass.
    pub fn moment_of_inertia(&self) -> F {
        let com = self.center_of_mass();
        self.points
            .iter()
            .fold(F::zero(), |acc, p| acc + p.mass() * p.pos.distance_sq(com))
    }

    /// Angular velocity about the center of mass (radians per substep).
    pub fn angular_velocity(&self) -> F {
        let inertia = self.moment_of_inertia();
        if inertia == F::zero() {
            return F::zero();
        }
        let com = self.center_of_mass();
        let v_com = self.velocity();
        let angular_momentum = self.points.iter().fold(F::zero(), |acc, p| {
            let r = p.pos - com;
            let v = p.velocity() - v_com;
            acc + p.mass() * r.cross(v)
        });
        angular_momentum / inertia
    }

    pub fn linear_energy(&self) -> F {
        F::half() * self.total_mass() * self.velocity().length_sq()
    }

    pub fn rotational_energy(&self) -> F {
        F::half() * self.moment_of_inertia() * self.angular_velocity().sq()
    }

    /// Sum of point kinetic energies.
    pub fn kinetic_energy(&self) -> F {
        self.points.iter().fold(F::zero(), |acc, p| acc + p.kinetic_energy())
    }

    fn area_signed(&self) -> F {
        polygon_signed_area(self.outline.indices.iter().map(|&i| self.points[i].pos))
    }

    /// Enclosed outline area; zero for open outlines.
    pub fn area(&self) -> F {
        if !self.outline.closed || self.outline.indices.len() < 3 {
            return F::zero();
        }
        self.area_signed().abs()
    }

    /// Whether `point` lies inside the closed outline.
    pub fn contains(&self, point: Vec2<F>) -> bool {
        if !self.outline.closed {
            return false;
        }
        let polygon: Vec<_> = self.outline.indices.iter().map(|&i| self.points[i].pos).collect();
        polygon_contains(&polygon, point)
    }

    /// Tight box around point discs; `None` for an empty shape.
    pub fn aabb(&self) -> Option<Aabb<F>> {
        self.points
            .iter()
            .map(|p| Aabb::from_circle(p.pos, p.radius()))
            .reduce(Aabb::union)
    }

    /// [`MassShape::aabb`] grown by `margin` on every side.
    pub fn margined_aabb(&self, margin: F) -> Option<Aabb<F>> {
        self.aabb().map(|b| b.grow(margin))
    }
}
