//! # Barnes-Hut quadtree
//!
//! Approximates mutual gravity between shapes in `O(n log n)` instead of the
//! `O(n²)` all-pairs sum. Space is split recursively into four quadrants;
//! every node caches the total mass, center of mass and mean velocity of the
//! bodies below it. When computing the pull on a body, a node that is small
//! compared to its distance (`size / distance < theta`) is treated as one
//! pseudo-body at its center of mass; otherwise its children are visited.
//!
//! Nodes live in a flat arena (`Vec<Node>`) and refer to children by index.
//! The tree is rebuilt from scratch on every gravity cycle.

use serde::{Deserialize, Serialize};

use crate::float::Float;
use crate::geometry::Aabb;
use crate::vec::Vec2;

/// Subdivision stops here; coincident bodies end up sharing a leaf.
pub const MAX_DEPTH: usize = 32;

/// A body as seen by the gravity solver: one per shape, at its center of mass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GravityBody<F: Float> {
    pub position: Vec2<F>,
    pub velocity: Vec2<F>,
    pub mass: F,
}

/// Physical parameters of one force evaluation.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct GravityParams<F: Float> {
    /// Gravitational constant `G`.
    pub g: F,
    /// Separations below this produce no force.
    pub min_distance: F,
    /// Opening threshold; 0 means exact summation.
    pub theta: F,
    pub post_newtonian: bool,
    /// Speed of light for the post-Newtonian term, in the same units as body velocities.
    pub speed_of_light: F,
}

struct Node<F: Float> {
    bounds: Aabb<F>,
    mass: F,
    com: Vec2<F>,
    velocity: Vec2<F>,
    children: [Option<usize>; 4],
    bodies: Vec<usize>,
    depth: usize,
}

impl<F: Float> Node<F> {
    fn empty(bounds: Aabb<F>, depth: usize) -> Self {
        Node {
            bounds,
            mass: F::zero(),
            com: Vec2::zero(),
            velocity: Vec2::zero(),
            children: [None; 4],
            bodies: Vec::new(),
            depth,
        }
    }

    fn is_external(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }
}

/// Barnes-Hut tree built over a slice of bodies.
pub struct BarnesHutTree<F: Float> {
    nodes: Vec<Node<F>>,
    bodies: Vec<GravityBody<F>>,
}

impl<F: Float> BarnesHutTree<F> {
    /// Build the tree: square root bounds around every body, insert each
    /// body, then aggregate mass and center of mass bottom-up.
    pub fn build(bodies: &[GravityBody<F>]) -> Self {
        let mut tree = BarnesHutTree { nodes: Vec::new(), bodies: bodies.to_vec() };
        let bounds = match root_bounds(bodies) {
            Some(b) => b,
            None => return tree,
        };
        tree.nodes.push(Node::empty(bounds, 0));
        for i in 0..bodies.len() {
            if bodies[i].mass > F::zero() && bodies[i].position.is_finite() {
                tree.insert(0, i);
            }
        }
        tree.aggregate(0);
        tree
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Total mass stored in the tree.
    pub fn total_mass(&self) -> F {
        self.nodes.first().map_or(F::zero(), |n| n.mass)
    }

    /// Center of mass of all bodies.
    pub fn center_of_mass(&self) -> Vec2<F> {
        self.nodes.first().map_or(Vec2::zero(), |n| n.com)
    }

    fn insert(&mut self, node_idx: usize, body_idx: usize) {
        let depth = self.nodes[node_idx].depth;

        if self.nodes[node_idx].is_external() {
            // empty leaf, or bottom of the tree: store here
            if self.nodes[node_idx].bodies.is_empty() || depth >= MAX_DEPTH {
                self.nodes[node_idx].bodies.push(body_idx);
                return;
            }
            // occupied leaf: push the resident bodies one level down
            let residents = std::mem::take(&mut self.nodes[node_idx].bodies);
            for resident in residents {
                self.insert_into_child(node_idx, resident);
            }
        }
        self.insert_into_child(node_idx, body_idx);
    }

    fn insert_into_child(&mut self, node_idx: usize, body_idx: usize) {
        let pos = self.bodies[body_idx].position;
        let bounds = self.nodes[node_idx].bounds;
        let quadrant = bounds.quadrant_of(pos);
        let child_idx = match self.nodes[node_idx].children[quadrant] {
            Some(idx) => idx,
            None => {
                let idx = self.nodes.len();
                let depth = self.nodes[node_idx].depth + 1;
                self.nodes.push(Node::empty(bounds.quadrant(quadrant), depth));
                self.nodes[node_idx].children[quadrant] = Some(idx);
                idx
            }
        };
        self.insert(child_idx, body_idx);
    }

    fn aggregate(&mut self, node_idx: usize) {
        let mut mass = F::zero();
        let mut weighted_pos = Vec2::zero();
        let mut momentum = Vec2::zero();

        for &b in &self.nodes[node_idx].bodies {
            let body = &self.bodies[b];
            mass = mass + body.mass;
            weighted_pos += body.position.scale(body.mass);
            momentum += body.velocity.scale(body.mass);
        }

        let children = self.nodes[node_idx].children;
        for child in children.iter().flatten() {
            self.aggregate(*child);
            let c = &self.nodes[*child];
            mass = mass + c.mass;
            weighted_pos += c.com.scale(c.mass);
            momentum += c.velocity.scale(c.mass);
        }

        let node = &mut self.nodes[node_idx];
        node.mass = mass;
        if mass > F::zero() {
            node.com = weighted_pos.scale(F::one() / mass);
            node.velocity = momentum.scale(F::one() / mass);
        }
    }

    /// Approximate gravitational force on body `index`.
    pub fn force_on(&self, index: usize, params: &GravityParams<F>) -> Vec2<F> {
        let mut force = Vec2::zero();
        if !self.nodes.is_empty() && index < self.bodies.len() {
            self.accumulate(0, index, params, &mut force);
        }
        force
    }

    /// Approximate force on every body, in body order.
    pub fn forces(&self, params: &GravityParams<F>) -> Vec<Vec2<F>> {
        (0..self.bodies.len()).map(|i| self.force_on(i, params)).collect()
    }

    fn accumulate(&self, node_idx: usize, target: usize, params: &GravityParams<F>, force: &mut Vec2<F>) {
        let node = &self.nodes[node_idx];
        if node.mass == F::zero() {
            return;
        }
        let body = &self.bodies[target];

        if node.is_external() {
            for &other in &node.bodies {
                if other != target {
                    let o = &self.bodies[other];
                    *force += pair_force(body, o.position, o.velocity, o.mass, params);
                }
            }
            return;
        }

        let offset = node.com - body.position;
        let dist = offset.length();
        let inside = node.bounds.contains_point(body.position);
        if !inside && dist > F::zero() && node.bounds.extent() / dist < params.theta {
            *force += pair_force(body, node.com, node.velocity, node.mass, params);
            return;
        }
        for child in node.children.iter().flatten() {
            self.accumulate(*child, target, params, force);
        }
    }

    /// Exact `O(n²)` sum, the reference the tree approximates.
    pub fn direct_force_on(bodies: &[GravityBody<F>], index: usize, params: &GravityParams<F>) -> Vec2<F> {
        let body = &bodies[index];
        bodies
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != index)
            .fold(Vec2::zero(), |acc, (_, o)| {
                acc + pair_force(body, o.position, o.velocity, o.mass, params)
            })
    }
}

/// Newtonian pull of a mass at `position` on `body`, with optional
/// post-Newtonian scaling `1 + v²/c² + 3·G·m/(r·c²)`.
fn pair_force<F: Float>(
    body: &GravityBody<F>,
    position: Vec2<F>,
    velocity: Vec2<F>,
    mass: F,
    params: &GravityParams<F>,
) -> Vec2<F> {
    let offset = position - body.position;
    let dist = offset.length();
    if dist < params.min_distance || dist == F::zero() {
        return Vec2::zero();
    }
    let mut magnitude = params.g * body.mass * mass / (dist * dist);
    if params.post_newtonian && params.speed_of_light > F::zero() {
        let c2 = params.speed_of_light.sq();
        let v2 = (velocity - body.velocity).length_sq();
        let potential = params.g * mass / dist;
        magnitude = magnitude * (F::one() + v2 / c2 + F::from_f32(3.0) * potential / c2);
    }
    offset.scale(magnitude / dist)
}

/// Square box around all valid body positions, padded so it is never empty.
fn root_bounds<F: Float>(bodies: &[GravityBody<F>]) -> Option<Aabb<F>> {
    let aabb = Aabb::from_points(
        bodies
            .iter()
            .filter(|b| b.mass > F::zero() && b.position.is_finite())
            .map(|b| b.position),
    )?;
    let half = (aabb.extent() * F::half()).max(F::one()) * F::from_f32(1.01);
    Some(Aabb::from_center(aabb.center(), Vec2::splat(half)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(theta: f64) -> GravityParams<f64> {
        GravityParams {
            g: 1.0,
            min_distance: 1e-3,
            theta,
            post_newtonian: false,
            speed_of_light: 0.0,
        }
    }

    fn body(x: f64, y: f64, mass: f64) -> GravityBody<f64> {
        GravityBody { position: Vec2::new(x, y), velocity: Vec2::zero(), mass }
    }

    #[test]
    fn root_aggregates_total_mass_and_com() {
        let bodies = [body(0.0, 0.0, 1.0), body(4.0, 0.0, 3.0), body(0.0, 8.0, 4.0)];
        let tree = BarnesHutTree::build(&bodies);
        assert!((tree.total_mass() - 8.0).abs() < 1e-12);
        let com = tree.center_of_mass();
        assert!((com.x - 1.5).abs() < 1e-12);
        assert!((com.y - 4.0).abs() < 1e-12);
    }

    #[test]
    fn two_bodies_obey_inverse_square() {
        let bodies = [body(0.0, 0.0, 2.0), body(2.0, 0.0, 3.0)];
        let tree = BarnesHutTree::build(&bodies);
        let f0 = tree.force_on(0, &params(0.5));
        let f1 = tree.force_on(1, &params(0.5));
        assert!((f0.x - 1.5).abs() < 1e-12);
        assert!((f0.x + f1.x).abs() < 1e-12, "third law");
    }

    #[test]
    fn closer_than_floor_is_ignored() {
        let bodies = [body(0.0, 0.0, 1.0), body(0.5, 0.0, 1.0)];
        let tree = BarnesHutTree::build(&bodies);
        let mut p = params(0.5);
        p.min_distance = 1.0;
        assert_eq!(tree.force_on(0, &p), Vec2::zero());
    }

    #[test]
    fn coincident_bodies_do_not_recurse_forever() {
        let bodies = vec![body(1.0, 1.0, 1.0); 5];
        let tree = BarnesHutTree::build(&bodies);
        assert!((tree.total_mass() - 5.0).abs() < 1e-12);
        assert_eq!(tree.force_on(0, &params(0.5)), Vec2::zero());
    }

    #[test]
    fn post_newtonian_strengthens_pull() {
        let mut bodies = [body(0.0, 0.0, 1.0), body(10.0, 0.0, 1.0)];
        bodies[1].velocity = Vec2::new(0.0, 5.0);
        let tree = BarnesHutTree::build(&bodies);
        let newton = tree.force_on(0, &params(0.5));
        let mut p = params(0.5);
        p.post_newtonian = true;
        p.speed_of_light = 10.0;
        let corrected = tree.force_on(0, &p);
        assert!(corrected.x > newton.x);
    }

    #[test]
    fn empty_tree_is_harmless() {
        let tree = BarnesHutTree::<f32>::build(&[]);
        assert_eq!(tree.node_count(), 0);
        assert_eq!(tree.force_on(0, &GravityParams {
            g: 1.0,
            min_distance: 0.0,
            theta: 0.5,
            post_newtonian: false,
            speed_of_light: 1.0,
        }), Vec2::zero());
    }
}
