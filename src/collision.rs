//! Collision detection and response between shapes and static colliders.
//!
//! Every substep the broad-phase quadtree is rebuilt from margined shape
//! boxes. Each candidate pair is then checked point against point and point
//! against outline edge in both directions, and finally every point is tested
//! against the static colliders.
//!
//! All contacts share one resolver. A contact has two sides, each a set of
//! weighted point anchors (a lone point has one anchor of weight 1, an edge
//! has its endpoints weighted `1 - t` and `t`; a static collider has none).
//! Resolution first separates the sides along the normal in proportion to
//! inverse mass, shifting `prev_pos` too so the projection adds no velocity,
//! then applies a restitution impulse and Coulomb friction.

use std::collections::HashSet;

use crate::collider::StaticCollider;
use crate::config::SimConfig;
use crate::float::Float;
use crate::geometry::{closest_point_on_segment, Aabb};
use crate::point_mass::PointMass;
use crate::quadtree::QuadTree;
use crate::shape::MassShape;
use crate::vec::Vec2;

/// Counters from one collision pass.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CollisionStats {
    /// Shape pairs that survived the broad-phase.
    pub pairs_tested: usize,
    pub point_contacts: usize,
    pub edge_contacts: usize,
    pub static_contacts: usize,
}

impl CollisionStats {
    pub fn contacts(&self) -> usize {
        self.point_contacts + self.edge_contacts + self.static_contacts
    }
}

/// Contact coefficients shared by every contact in a pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Material<F: Float> {
    pub restitution: F,
    pub static_friction: F,
    pub kinetic_friction: F,
}

impl<F: Float> Material<F> {
    pub fn from_config(config: &SimConfig<F>) -> Self {
        Material {
            restitution: config.restitution,
            static_friction: config.static_friction,
            kinetic_friction: config.kinetic_friction,
        }
    }
}

/// Up to two `(point index, weight)` pairs.
type Anchors<F> = [(usize, F)];

/// Broad-phase state kept between substeps so the tree's allocations are reused.
pub struct CollisionSystem<F: Float> {
    tree: QuadTree<F>,
}

impl<F: Float> CollisionSystem<F> {
    pub fn new(capacity: usize, max_depth: usize) -> Self {
        let unit = Aabb::new(Vec2::zero(), Vec2::splat(F::one()));
        CollisionSystem { tree: QuadTree::new(unit, capacity, max_depth) }
    }

    /// The broad-phase tree as left by the last `broad_phase` call.
    pub fn tree(&self) -> &QuadTree<F> {
        &self.tree
    }

    /// Shape pairs whose margined boxes overlap, `(i, j)` with `i < j`.
    pub fn broad_phase(&mut self, shapes: &[MassShape<F>], margin: F) -> Vec<(usize, usize)> {
        let boxes: Vec<Option<Aabb<F>>> = shapes
            .iter()
            .map(|s| if s.is_marked_for_deletion() { None } else { s.margined_aabb(margin) })
            .collect();
        let world = match boxes.iter().flatten().copied().reduce(Aabb::union) {
            Some(world) => world.grow(F::one()),
            None => return Vec::new(),
        };
        if boxes.iter().flatten().count() < 2 {
            return Vec::new();
        }
        self.tree.clear(world);
        for (i, aabb) in boxes.iter().enumerate() {
            if let Some(aabb) = aabb {
                self.tree.insert(i, *aabb);
            }
        }
        self.tree.candidate_pairs()
    }

    /// Detect and resolve every contact for one substep of length `dt`.
    pub fn resolve(
        &mut self,
        shapes: &mut [MassShape<F>],
        colliders: &[StaticCollider<F>],
        config: &SimConfig<F>,
        dt: F,
    ) -> CollisionStats {
        let material = Material::from_config(config);
        let mut stats = CollisionStats::default();

        let pairs = self.broad_phase(shapes, config.collision_margin);
        stats.pairs_tested = pairs.len();
        for (i, j) in pairs {
            let (a, b) = pair_mut(shapes, i, j);
            stats.point_contacts += collide_points(a, b, &material, dt);
            stats.edge_contacts += collide_point_edges(a, b, &material, dt);
            stats.edge_contacts += collide_point_edges(b, a, &material, dt);
        }

        if !colliders.is_empty() {
            for shape in shapes.iter_mut().filter(|s| !s.is_marked_for_deletion()) {
                stats.static_contacts += collide_static(shape, colliders, &material, dt);
            }
        }
        stats
    }
}

/// Two distinct shapes borrowed mutably at once. Requires `i < j`.
fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    let (head, tail) = items.split_at_mut(j);
    (&mut head[i], &mut tail[0])
}

fn collide_points<F: Float>(a: &mut MassShape<F>, b: &mut MassShape<F>, material: &Material<F>, dt: F) -> usize {
    let mut contacts = 0;
    let (na, nb) = (a.point_count(), b.point_count());
    for ia in 0..na {
        for ib in 0..nb {
            let (pa, pb) = (&a.points()[ia], &b.points()[ib]);
            if pa.pinned && pb.pinned {
                continue;
            }
            let offset = pb.pos - pa.pos;
            let reach = pa.radius() + pb.radius();
            let dist_sq = offset.length_sq();
            if dist_sq >= reach * reach {
                continue;
            }
            let dist = dist_sq.sqrt();
            let normal = match offset.normalize() {
                Some(n) => n,
                None => continue,
            };
            let anchors_a = [(ia, F::one())];
            let anchors_b = [(ib, F::one())];
            if resolve_contact(a.points_mut(), &anchors_a, b.points_mut(), &anchors_b, normal, reach - dist, material, dt) {
                contacts += 1;
            }
        }
    }
    contacts
}

/// Points of `b` against the outline edges of `a`.
fn collide_point_edges<F: Float>(a: &mut MassShape<F>, b: &mut MassShape<F>, material: &Material<F>, dt: F) -> usize {
    let edges: Vec<(usize, usize)> = a.outline().edges().collect();
    if edges.is_empty() {
        return 0;
    }
    let mut contacts = 0;
    for ib in 0..b.point_count() {
        for &(i, j) in &edges {
            let p = &b.points()[ib];
            let (e0, e1) = (&a.points()[i], &a.points()[j]);
            if p.pinned && e0.pinned && e1.pinned {
                continue;
            }
            let (closest, t) = closest_point_on_segment(p.pos, e0.pos, e1.pos);
            let offset = p.pos - closest;
            let radius = p.radius();
            let dist_sq = offset.length_sq();
            if dist_sq >= radius * radius {
                continue;
            }
            let normal = match offset.normalize() {
                Some(n) => n,
                None => continue,
            };
            let depth = radius - dist_sq.sqrt();
            let anchors_a = [(i, F::one() - t), (j, t)];
            let anchors_b = [(ib, F::one())];
            if resolve_contact(a.points_mut(), &anchors_a, b.points_mut(), &anchors_b, normal, depth, material, dt) {
                contacts += 1;
            }
        }
    }
    contacts
}

fn collide_static<F: Float>(
    shape: &mut MassShape<F>,
    colliders: &[StaticCollider<F>],
    material: &Material<F>,
    dt: F,
) -> usize {
    let mut contacts = 0;
    for index in 0..shape.point_count() {
        for collider in colliders {
            let p = &shape.points()[index];
            if p.pinned {
                break;
            }
            if let Some(contact) = collider.contact(p.pos, p.prev_pos, p.radius()) {
                let anchors = [(index, F::one())];
                if resolve_contact(&mut [], &[], shape.points_mut(), &anchors, contact.normal, contact.depth, material, dt) {
                    contacts += 1;
                }
            }
        }
    }
    contacts
}

fn side_inv_mass<F: Float>(points: &[PointMass<F>], anchors: &Anchors<F>) -> F {
    anchors
        .iter()
        .fold(F::zero(), |acc, &(i, w)| acc + w * w * points[i].effective_inv_mass())
}

fn side_velocity<F: Float>(points: &[PointMass<F>], anchors: &Anchors<F>) -> Vec2<F> {
    anchors
        .iter()
        .fold(Vec2::zero(), |acc, &(i, w)| acc + points[i].velocity().scale(w))
}

fn side_force<F: Float>(points: &[PointMass<F>], anchors: &Anchors<F>) -> Vec2<F> {
    anchors
        .iter()
        .fold(Vec2::zero(), |acc, &(i, w)| acc + points[i].prev_force.scale(w))
}

/// Move every anchor of a side by `dir * lambda * w * inv_mass`.
fn shift_side<F: Float>(points: &mut [PointMass<F>], anchors: &Anchors<F>, dir: Vec2<F>, lambda: F) {
    for &(i, w) in anchors {
        let inv = points[i].effective_inv_mass();
        if inv > F::zero() {
            points[i].translate(dir.scale(lambda * w * inv));
        }
    }
}

fn push_side<F: Float>(points: &mut [PointMass<F>], anchors: &Anchors<F>, impulse: Vec2<F>) {
    for &(i, w) in anchors {
        points[i].apply_impulse(impulse.scale(w));
    }
}

/// Resolve one contact. `normal` points from side `a` to side `b`.
///
/// Velocities are per substep, so impulses are in mass times
/// displacement-per-substep; a force `f` held over the substep is worth
/// `f * dt^2` of impulse. Returns `false` when neither side can move.
#[allow(clippy::too_many_arguments)]
pub(crate) fn resolve_contact<F: Float>(
    a: &mut [PointMass<F>],
    anchors_a: &Anchors<F>,
    b: &mut [PointMass<F>],
    anchors_b: &Anchors<F>,
    normal: Vec2<F>,
    depth: F,
    material: &Material<F>,
    dt: F,
) -> bool {
    let wa = side_inv_mass(a, anchors_a);
    let wb = side_inv_mass(b, anchors_b);
    let w = wa + wb;
    if w == F::zero() {
        return false;
    }

    let lambda = depth / w;
    shift_side(a, anchors_a, -normal, lambda);
    shift_side(b, anchors_b, normal, lambda);

    let relative = side_velocity(b, anchors_b) - side_velocity(a, anchors_a);
    let vn = relative.dot(normal);
    if vn >= F::zero() {
        return true;
    }

    let jn = -(F::one() + material.restitution) * vn / w;
    let mut impulse = normal.scale(jn);

    let tangential = relative - normal.scale(vn);
    if let Some(tangent) = tangential.normalize() {
        let pressing = (side_force(a, anchors_a) - side_force(b, anchors_b)).dot(normal);
        let load = jn + pressing.max(F::zero()) * dt * dt;
        let needed = tangential.length() / w;
        let jt = if needed <= material.static_friction * load {
            needed
        } else {
            (material.kinetic_friction * load).min(needed)
        };
        impulse -= tangent.scale(jt);
    }

    push_side(a, anchors_a, -impulse);
    push_side(b, anchors_b, impulse);
    true
}

/// Every point of every live shape whose disc overlaps `range`, without a tree.
pub fn points_in<F: Float>(shapes: &[MassShape<F>], range: &Aabb<F>) -> HashSet<(usize, usize)> {
    let mut out = HashSet::new();
    for (s, shape) in shapes.iter().enumerate().filter(|(_, s)| !s.is_marked_for_deletion()) {
        for (p, point) in shape.points().iter().enumerate() {
            if Aabb::from_circle(point.pos, point.radius()).overlaps(range) {
                out.insert((s, p));
            }
        }
    }
    out
}
