//! The fixed-timestep simulation loop and its editing surface.
//!
//! [`Simulation`] owns the configuration, the static colliders and the
//! shared shape store. One [`Simulation::step`] advances the world by one
//! fixed timestep made of `substeps` equal substeps:
//!
//! 1. pressure and the latest n-body gravity field are accumulated as forces,
//! 2. constraints are relaxed (`constraint_iterations` passes, shuffled order),
//! 3. points are integrated,
//! 4. collisions are detected and resolved.
//!
//! Shapes are only removed after the last substep, and only if the write
//! lock can be taken without waiting.

use std::collections::HashSet;

use parking_lot::RwLockUpgradableReadGuard;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::collider::StaticCollider;
use crate::collision::{points_in, CollisionSystem};
use crate::config::SimConfig;
use crate::error::PhysicsError;
use crate::float::Float;
use crate::geometry::Aabb;
use crate::nbody::{GravityField, NbodySystem, SharedShapes, WorkerState};
use crate::observer::{NoOpStepObserver, StepObserver};
use crate::point_mass::PointId;
use crate::quadtree::QuadTree;
use crate::shape::{MassShape, ShapeId};
use crate::snapshot::{Snapshot, SNAPSHOT_VERSION};
use crate::vec::Vec2;

/// What a renderer needs to draw one shape.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeDrawData<F: Float> {
    pub id: ShapeId,
    /// Position and radius of every point, in arena order.
    pub points: Vec<(Vec2<F>, F)>,
    /// Endpoint positions of every constraint.
    pub links: Vec<(Vec2<F>, Vec2<F>)>,
    pub pinned: Vec<bool>,
}

/// A 2D world of mass shapes and static colliders.
pub struct Simulation<F: Float> {
    config: SimConfig<F>,
    shapes: SharedShapes<F>,
    colliders: Vec<StaticCollider<F>>,
    collisions: CollisionSystem<F>,
    nbody: Option<NbodySystem<F>>,
    rng: ChaCha8Rng,
    accumulator: F,
    time: F,
    steps: u64,
    paused: bool,
}

impl<F: Float> Simulation<F> {
    pub fn new(config: SimConfig<F>) -> Result<Self, PhysicsError> {
        config.validate()?;
        let mut sim = Simulation {
            collisions: CollisionSystem::new(config.quadtree_capacity, config.quadtree_max_depth),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            shapes: SharedShapes::default(),
            colliders: Vec::new(),
            nbody: None,
            accumulator: F::zero(),
            time: F::zero(),
            steps: 0,
            paused: false,
        };
        sim.dispatch_nbody();
        Ok(sim)
    }

    pub fn config(&self) -> &SimConfig<F> {
        &self.config
    }

    /// Validate and commit a new configuration. Takes effect from the next step.
    pub fn set_config(&mut self, config: SimConfig<F>) -> Result<(), PhysicsError> {
        if let Err(e) = config.validate() {
            warn!(error = %e, "configuration rejected");
            return Err(e);
        }
        if config.quadtree_capacity != self.config.quadtree_capacity
            || config.quadtree_max_depth != self.config.quadtree_max_depth
        {
            self.collisions = CollisionSystem::new(config.quadtree_capacity, config.quadtree_max_depth);
        }
        if config.seed != self.config.seed {
            self.rng = ChaCha8Rng::seed_from_u64(config.seed);
        }
        self.config = config;
        if let Some(nbody) = &self.nbody {
            nbody.configure(self.config.nbody.clone());
            nbody.set_timestep(self.config.substep_dt());
        }
        self.dispatch_nbody();
        info!(
            substeps = self.config.substeps,
            iterations = self.config.constraint_iterations,
            nbody = self.config.nbody.enabled,
            "configuration committed"
        );
        Ok(())
    }

    /// Simulated seconds so far.
    pub fn time(&self) -> F {
        self.time
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn pause(&mut self) {
        self.paused = true;
        self.dispatch_nbody();
    }

    pub fn resume(&mut self) {
        self.paused = false;
        self.dispatch_nbody();
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Handle to the shared shape store, for readers on other threads.
    pub fn shape_store(&self) -> SharedShapes<F> {
        SharedShapes::clone(&self.shapes)
    }

    /// Completed n-body worker cycles, `None` when the worker never started.
    pub fn nbody_cycles(&self) -> Option<u64> {
        self.nbody.as_ref().map(NbodySystem::cycles)
    }

    /// Feed wall-clock frame time and run as many fixed steps as it covers.
    ///
    /// At most `max_steps_per_frame` steps run; any backlog beyond that is
    /// dropped so a slow frame cannot snowball. Returns the steps taken.
    pub fn advance(&mut self, frame_time: F) -> usize {
        if self.paused || !(frame_time.is_finite() && frame_time > F::zero()) {
            return 0;
        }
        self.accumulator = self.accumulator + frame_time;
        let mut taken = 0;
        while self.accumulator >= self.config.timestep {
            if taken == self.config.max_steps_per_frame {
                debug!(backlog = self.accumulator.to_f64(), "dropping simulation backlog");
                self.accumulator = F::zero();
                break;
            }
            self.step();
            self.accumulator = self.accumulator - self.config.timestep;
            taken += 1;
        }
        taken
    }

    /// Run one fixed timestep.
    pub fn step(&mut self) {
        self.step_with(&mut NoOpStepObserver);
    }

    /// Run one fixed timestep, reporting progress to `observer`.
    pub fn step_with<O: StepObserver + ?Sized>(&mut self, observer: &mut O) {
        if self.paused {
            return;
        }
        let config = &self.config;
        let substeps = config.substeps;
        let dt = config.substep_dt();
        let gravity = config.active_gravity();
        let field = match &self.nbody {
            Some(nbody) if nbody.state() == WorkerState::Running => nbody.field(),
            _ => GravityField::default(),
        };

        {
            let mut shapes = self.shapes.write();
            for substep in 0..substeps {
                for shape in shapes.iter_mut().filter(|s| !s.is_marked_for_deletion()) {
                    shape.apply_pressure(config.gas_constant);
                    shape.shuffle_constraints(&mut self.rng);
                }
                field.apply(&mut shapes);

                for iteration in 0..config.constraint_iterations {
                    for shape in shapes.iter_mut() {
                        shape.relax_pass(substeps);
                    }
                    observer.on_constraint_iteration(iteration);
                }

                for shape in shapes.iter_mut() {
                    shape.integrate(dt, gravity, config.damping);
                }

                if config.collisions_enabled {
                    let stats = self.collisions.resolve(&mut shapes, &self.colliders, config, dt);
                    observer.on_collisions(&stats);
                }
                observer.on_substep(substep);
            }
        }

        let removed = self.prune_marked();
        observer.on_prune(removed);

        self.time = self.time + self.config.timestep;
        self.steps += 1;
        observer.on_step_complete(self.steps);
    }

    /// Sweep out shapes marked for deletion, if nobody else holds the store.
    ///
    /// Returns how many were removed. When another reader is active the
    /// sweep is skipped and the shapes stay marked until the next attempt.
    pub fn prune_marked(&self) -> usize {
        let shapes = self.shapes.upgradable_read();
        if !shapes.iter().any(MassShape::is_marked_for_deletion) {
            return 0;
        }
        match RwLockUpgradableReadGuard::try_upgrade(shapes) {
            Ok(mut shapes) => {
                let before = shapes.len();
                shapes.retain(|s| !s.is_marked_for_deletion());
                let removed = before - shapes.len();
                debug!(removed, remaining = shapes.len(), "pruned shapes");
                removed
            }
            Err(_) => {
                debug!("shape store busy, deferring prune");
                0
            }
        }
    }

    /// Bring the worker in line with the configuration and pause state.
    fn dispatch_nbody(&mut self) {
        let wanted = self.config.nbody.enabled && !self.paused;
        if wanted && self.nbody.is_none() {
            match NbodySystem::spawn(self.shape_store(), self.config.nbody.clone(), self.config.substep_dt()) {
                Ok(system) => self.nbody = Some(system),
                Err(e) => {
                    warn!(error = %e, "could not start n-body worker");
                    return;
                }
            }
        }
        if let Some(nbody) = self.nbody.as_mut() {
            if wanted {
                nbody.resume();
            } else {
                nbody.pause();
            }
        }
    }

    // ---- editing -------------------------------------------------------

    pub fn add_shape(&mut self, shape: MassShape<F>) -> ShapeId {
        let id = shape.id;
        self.shapes.write().push(shape);
        id
    }

    pub fn add_shapes<I: IntoIterator<Item = MassShape<F>>>(&mut self, shapes: I) -> Vec<ShapeId> {
        let mut store = self.shapes.write();
        shapes
            .into_iter()
            .map(|shape| {
                let id = shape.id;
                store.push(shape);
                id
            })
            .collect()
    }

    pub fn add_collider(&mut self, collider: StaticCollider<F>) {
        self.colliders.push(collider);
    }

    pub fn colliders(&self) -> &[StaticCollider<F>] {
        &self.colliders
    }

    /// Live shapes, excluding those waiting to be pruned.
    pub fn shape_count(&self) -> usize {
        self.shapes.read().iter().filter(|s| !s.is_marked_for_deletion()).count()
    }

    /// Delete points by id. Constraints touching them go too; a shape left
    /// empty is removed at the end of the next step. Returns how many of
    /// the ids were found.
    pub fn delete_points(&mut self, ids: &[PointId]) -> usize {
        let mut shapes = self.shapes.write();
        let mut deleted = 0;
        for &id in ids {
            if let Some(shape) = shapes.iter_mut().find(|s| s.index_of(id).is_some()) {
                if shape.remove_point(id).is_ok() {
                    deleted += 1;
                }
            }
        }
        deleted
    }

    /// Mark a shape for removal at the end of the next step.
    pub fn delete_shape(&mut self, id: ShapeId) -> Result<(), PhysicsError> {
        self.with_shape_mut(id, MassShape::mark_for_deletion)
    }

    /// Push a whole shape for one substep, spread over its points by mass.
    pub fn apply_force_to_shape(&mut self, id: ShapeId, force: Vec2<F>) -> Result<(), PhysicsError> {
        self.with_shape_mut(id, |shape| shape.apply_force(force))
    }

    /// Push a single point for one substep.
    pub fn apply_force_to_point(&mut self, id: PointId, force: Vec2<F>) -> Result<(), PhysicsError> {
        let mut shapes = self.shapes.write();
        for shape in shapes.iter_mut() {
            if let Some(index) = shape.index_of(id) {
                shape.points_mut()[index].apply_force(force);
                return Ok(());
            }
        }
        Err(PhysicsError::PointNotFound { id: id.0 })
    }

    /// Instantaneous momentum change of a whole shape.
    pub fn apply_impulse_to_shape(&mut self, id: ShapeId, impulse: Vec2<F>) -> Result<(), PhysicsError> {
        self.with_shape_mut(id, |shape| shape.apply_impulse(impulse))
    }

    /// Copy of a shape, for inspectors.
    pub fn shape(&self, id: ShapeId) -> Option<MassShape<F>> {
        self.with_shape(id, MassShape::clone)
    }

    /// Run `f` on a shape under the read lock.
    pub fn with_shape<R>(&self, id: ShapeId, f: impl FnOnce(&MassShape<F>) -> R) -> Option<R> {
        let shapes = self.shapes.read();
        shapes.iter().find(|s| s.id == id && !s.is_marked_for_deletion()).map(f)
    }

    /// Run `f` on a shape under the write lock.
    pub fn with_shape_mut<R>(&mut self, id: ShapeId, f: impl FnOnce(&mut MassShape<F>) -> R) -> Result<R, PhysicsError> {
        let mut shapes = self.shapes.write();
        shapes
            .iter_mut()
            .find(|s| s.id == id && !s.is_marked_for_deletion())
            .map(f)
            .ok_or(PhysicsError::ShapeNotFound { id: id.0 })
    }

    // ---- queries -------------------------------------------------------

    /// Shapes whose bounding box intersects `range`.
    pub fn query_shapes(&self, range: Aabb<F>) -> Vec<ShapeId> {
        if !range.is_valid() {
            warn!("shape query with an invalid box, abandoned");
            return Vec::new();
        }
        let shapes = self.shapes.read();
        let boxes: Vec<(usize, Aabb<F>)> = shapes
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_marked_for_deletion())
            .filter_map(|(i, s)| s.aabb().map(|b| (i, b)))
            .collect();
        let world = match boxes.iter().map(|(_, b)| *b).reduce(Aabb::union) {
            Some(world) => world,
            None => return Vec::new(),
        };
        let mut tree = QuadTree::new(world, self.config.quadtree_capacity, self.config.quadtree_max_depth);
        for (i, b) in &boxes {
            tree.insert(*i, *b);
        }
        let mut hits = HashSet::new();
        tree.query(&range, &mut hits);
        let mut hits: Vec<usize> = hits.into_iter().collect();
        hits.sort_unstable();
        hits.into_iter().map(|i| shapes[i].id).collect()
    }

    /// Points whose disc intersects `range`, with their owning shape.
    pub fn query_points(&self, range: Aabb<F>) -> Vec<(ShapeId, PointId)> {
        if !range.is_valid() {
            warn!("point query with an invalid box, abandoned");
            return Vec::new();
        }
        let shapes = self.shapes.read();
        let mut hits: Vec<(usize, usize)> = points_in(&shapes, &range).into_iter().collect();
        hits.sort_unstable();
        hits.into_iter()
            .map(|(s, p)| (shapes[s].id, shapes[s].points()[p].id))
            .collect()
    }

    /// Draw data for every live shape.
    pub fn draw_data(&self) -> Vec<ShapeDrawData<F>> {
        let shapes = self.shapes.read();
        shapes
            .iter()
            .filter(|s| !s.is_marked_for_deletion())
            .map(|s| {
                let points = s.points();
                ShapeDrawData {
                    id: s.id,
                    points: points.iter().map(|p| (p.pos, p.radius())).collect(),
                    links: s.constraints().iter().map(|c| (points[c.a].pos, points[c.b].pos)).collect(),
                    pinned: points.iter().map(|p| p.pinned).collect(),
                }
            })
            .collect()
    }

    /// Kinetic energy of every point, with velocities in units per second.
    pub fn total_energy(&self) -> F {
        let per_second = F::one() / self.config.substep_dt();
        self.shapes
            .read()
            .iter()
            .fold(F::zero(), |acc, s| acc + s.kinetic_energy() * per_second * per_second)
    }

    /// Total momentum in mass times units per second.
    pub fn total_momentum(&self) -> Vec2<F> {
        let per_second = F::one() / self.config.substep_dt();
        self.shapes
            .read()
            .iter()
            .fold(Vec2::zero(), |acc, s| acc + s.momentum().scale(per_second))
    }

    // ---- persistence ---------------------------------------------------

    pub fn snapshot(&self) -> Snapshot<F> {
        let shapes = self.shapes.read();
        Snapshot {
            version: SNAPSHOT_VERSION,
            time: self.time,
            steps: self.steps,
            config: self.config.clone(),
            shapes: shapes.iter().filter(|s| !s.is_marked_for_deletion()).cloned().collect(),
            colliders: self.colliders.clone(),
        }
    }

    /// Replace the whole world with `snapshot`.
    pub fn restore(&mut self, snapshot: Snapshot<F>) -> Result<(), PhysicsError> {
        snapshot.config.validate()?;
        for shape in &snapshot.shapes {
            shape.restore_ids();
        }
        *self.shapes.write() = snapshot.shapes;
        self.colliders = snapshot.colliders;
        self.time = snapshot.time;
        self.steps = snapshot.steps;
        self.accumulator = F::zero();
        self.set_config(snapshot.config)?;
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed ^ self.steps);
        info!(shapes = self.shape_count(), time = self.time.to_f64(), "snapshot restored");
        Ok(())
    }
}
