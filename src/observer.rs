//! Step observer trait for monitoring simulation progress.

use crate::collision::CollisionStats;

/// Trait for observing simulation steps.
///
/// Implement this trait to monitor solver progress (debugging, profiling,
/// drawing debug overlays). All methods have default no-op implementations.
pub trait StepObserver {
    /// Called after each relaxation pass over every shape.
    fn on_constraint_iteration(&mut self, _iteration: usize) {}

    /// Called after collision resolution in a substep.
    fn on_collisions(&mut self, _stats: &CollisionStats) {}

    /// Called when a substep is complete.
    fn on_substep(&mut self, _substep: usize) {}

    /// Called after the deferred sweep with the number of shapes removed.
    fn on_prune(&mut self, _removed: usize) {}

    /// Called when a full timestep is complete.
    fn on_step_complete(&mut self, _step: u64) {}
}

/// A no-op observer. Used by [`Simulation::step`](crate::Simulation::step).
pub struct NoOpStepObserver;

impl StepObserver for NoOpStepObserver {}
