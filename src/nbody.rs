//! Background n-body gravity worker.
//!
//! The worker owns no shapes. Each cycle it takes the shared store's read
//! lock just long enough to copy out every shape's center of mass, mass and
//! velocity, builds a [`BarnesHutTree`] and publishes one force per shape
//! into a [`GravityField`]. The main loop reads the latest field every
//! substep, so gravity is at most one cycle stale.
//!
//! The worker is driven by [`NbodyMessage`]s and is either
//! [`WorkerState::Running`] (cycling, sleeping `interval_ms` between cycles)
//! or [`WorkerState::Paused`] (blocked until the next message).
//!
//! Every pause and resume bumps an epoch. A cycle that started under an older
//! epoch is discarded instead of published.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::barnes_hut::{BarnesHutTree, GravityBody};
use crate::config::NbodyConfig;
use crate::float::Float;
use crate::shape::{MassShape, ShapeId};
use crate::vec::Vec2;

/// The shape collection shared between the main loop and the worker.
pub type SharedShapes<F> = Arc<RwLock<Vec<MassShape<F>>>>;

/// Commands accepted by the worker.
#[derive(Clone, Debug)]
pub enum NbodyMessage<F: Float> {
    Resume,
    Pause,
    Configure(NbodyConfig<F>),
    /// Substep length, used to turn per-substep shape velocities into per-second ones.
    Timestep(F),
    Shutdown,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Paused,
}

/// Latest per-shape gravity forces.
#[derive(Clone, Debug, Default)]
pub struct GravityField<F: Float> {
    pub forces: HashMap<ShapeId, Vec2<F>>,
    /// Worker cycle that produced these forces.
    pub cycle: u64,
    /// Pause/resume epoch the forces were computed under.
    pub epoch: u64,
}

impl<F: Float> GravityField<F> {
    pub fn force(&self, id: ShapeId) -> Option<Vec2<F>> {
        self.forces.get(&id).copied()
    }

    /// Apply each published force to its shape, spread over the points by mass.
    pub fn apply(&self, shapes: &mut [MassShape<F>]) {
        if self.forces.is_empty() {
            return;
        }
        for shape in shapes.iter_mut() {
            if let Some(force) = self.forces.get(&shape.id) {
                shape.apply_force(*force);
            }
        }
    }
}

/// Handle to the gravity worker thread. Dropping it shuts the worker down.
pub struct NbodySystem<F: Float> {
    sender: Sender<NbodyMessage<F>>,
    field: Arc<Mutex<GravityField<F>>>,
    cycles: Arc<AtomicU64>,
    epoch: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
    state: WorkerState,
}

impl<F: Float> NbodySystem<F> {
    /// Spawn a paused worker over `shapes`.
    pub fn spawn(shapes: SharedShapes<F>, config: NbodyConfig<F>, substep_dt: F) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let field = Arc::new(Mutex::new(GravityField::default()));
        let cycles = Arc::new(AtomicU64::new(0));
        let epoch = Arc::new(AtomicU64::new(0));

        let worker = Worker {
            shapes,
            receiver,
            field: Arc::clone(&field),
            cycles: Arc::clone(&cycles),
            epoch: Arc::clone(&epoch),
            config,
            substep_dt,
            state: WorkerState::Paused,
        };
        let handle = thread::Builder::new()
            .name("nbody".into())
            .spawn(move || worker.run())?;
        info!("n-body worker started");

        Ok(NbodySystem { sender, field, cycles, epoch, handle: Some(handle), state: WorkerState::Paused })
    }

    fn send(&self, message: NbodyMessage<F>) {
        if self.sender.send(message).is_err() {
            warn!("n-body worker is gone, message dropped");
        }
    }

    pub fn resume(&mut self) {
        if self.state != WorkerState::Running {
            self.state = WorkerState::Running;
            self.invalidate_field();
            self.send(NbodyMessage::Resume);
        }
    }

    pub fn pause(&mut self) {
        if self.state != WorkerState::Paused {
            self.state = WorkerState::Paused;
            self.send(NbodyMessage::Pause);
        }
        self.invalidate_field();
    }

    /// Clear the published field and start a new epoch, under the field lock
    /// so an in-flight cycle cannot publish in between.
    fn invalidate_field(&self) {
        let mut field = self.field.lock();
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        *field = GravityField { epoch, ..GravityField::default() };
    }

    /// Current pause/resume epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn configure(&self, config: NbodyConfig<F>) {
        self.send(NbodyMessage::Configure(config));
    }

    pub fn set_timestep(&self, substep_dt: F) {
        self.send(NbodyMessage::Timestep(substep_dt));
    }

    /// State last requested from the worker.
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Completed worker cycles since spawn.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    /// Copy of the latest field.
    pub fn field(&self) -> GravityField<F> {
        self.field.lock().clone()
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.sender.send(NbodyMessage::Shutdown);
            if handle.join().is_err() {
                warn!("n-body worker panicked");
            }
            info!(cycles = self.cycles(), "n-body worker stopped");
        }
    }
}

impl<F: Float> Drop for NbodySystem<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker<F: Float> {
    shapes: SharedShapes<F>,
    receiver: Receiver<NbodyMessage<F>>,
    field: Arc<Mutex<GravityField<F>>>,
    cycles: Arc<AtomicU64>,
    epoch: Arc<AtomicU64>,
    config: NbodyConfig<F>,
    substep_dt: F,
    state: WorkerState,
}

impl<F: Float> Worker<F> {
    fn run(mut self) {
        loop {
            let message = match self.state {
                WorkerState::Paused => match self.receiver.recv() {
                    Ok(message) => Some(message),
                    Err(_) => return,
                },
                WorkerState::Running => {
                    self.cycle();
                    match self.receiver.recv_timeout(Duration::from_millis(self.config.interval_ms)) {
                        Ok(message) => Some(message),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
            };
            match message {
                Some(NbodyMessage::Resume) => self.state = WorkerState::Running,
                Some(NbodyMessage::Pause) => self.state = WorkerState::Paused,
                Some(NbodyMessage::Configure(config)) => self.config = config,
                Some(NbodyMessage::Timestep(dt)) => self.substep_dt = dt,
                Some(NbodyMessage::Shutdown) => return,
                None => {}
            }
        }
    }

    fn cycle(&mut self) {
        let epoch = self.epoch.load(Ordering::Acquire);
        let (ids, bodies) = {
            let shapes = self.shapes.read();
            collect_bodies(&shapes, self.substep_dt)
        };
        let tree = BarnesHutTree::build(&bodies);
        let params = self.config.params();
        let forces = ids
            .into_iter()
            .zip(tree.forces(&params))
            .collect::<HashMap<_, _>>();
        debug!(bodies = bodies.len(), nodes = tree.node_count(), "gravity cycle");
        self.publish(forces, epoch);
    }

    /// Store `forces` unless a pause or resume happened since `epoch` was read.
    fn publish(&self, forces: HashMap<ShapeId, Vec2<F>>, epoch: u64) -> bool {
        let mut field = self.field.lock();
        if self.epoch.load(Ordering::Acquire) != epoch {
            debug!(epoch, "stale gravity cycle dropped");
            return false;
        }
        let cycle = self.cycles.fetch_add(1, Ordering::AcqRel) + 1;
        *field = GravityField { forces, cycle, epoch };
        true
    }
}

/// One gravity body per live shape, velocity in units per second.
pub fn collect_bodies<F: Float>(shapes: &[MassShape<F>], substep_dt: F) -> (Vec<ShapeId>, Vec<GravityBody<F>>) {
    let per_second = if substep_dt > F::zero() { F::one() / substep_dt } else { F::zero() };
    shapes
        .iter()
        .filter(|s| !s.is_marked_for_deletion() && s.point_count() > 0)
        .map(|s| {
            let body = GravityBody {
                position: s.center_of_mass(),
                velocity: s.velocity().scale(per_second),
                mass: s.total_mass(),
            };
            (s.id, body)
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn store() -> SharedShapes<f64> {
        Arc::new(RwLock::new(vec![
            MassShape::particle(Vec2::new(0.0, 0.0), 10.0).unwrap(),
            MassShape::particle(Vec2::new(100.0, 0.0), 10.0).unwrap(),
        ]))
    }

    fn wait_for_cycles(system: &NbodySystem<f64>, n: u64) -> bool {
        let start = Instant::now();
        while system.cycles() < n {
            if start.elapsed() > Duration::from_secs(5) {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    #[test]
    fn paused_worker_does_not_cycle() {
        let system = NbodySystem::spawn(store(), NbodyConfig::new().with_interval_ms(1), 0.01).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(system.cycles(), 0);
        assert_eq!(system.state(), WorkerState::Paused);
    }

    #[test]
    fn running_worker_publishes_attraction() {
        let shapes = store();
        let ids: Vec<ShapeId> = shapes.read().iter().map(|s| s.id).collect();
        let mut system = NbodySystem::spawn(shapes, NbodyConfig::new().with_interval_ms(1), 0.01).unwrap();
        system.resume();
        assert!(wait_for_cycles(&system, 2));
        let field = system.field();
        let f0 = field.force(ids[0]).unwrap();
        let f1 = field.force(ids[1]).unwrap();
        assert!(f0.x > 0.0 && f1.x < 0.0);
        // G * 10 * 10 / 100^2
        assert!((f0.x - 0.01).abs() < 1e-12);
        system.shutdown();
    }

    #[test]
    fn pause_stops_cycling() {
        let mut system = NbodySystem::spawn(store(), NbodyConfig::new().with_interval_ms(1), 0.01).unwrap();
        system.resume();
        assert!(wait_for_cycles(&system, 1));
        system.pause();
        thread::sleep(Duration::from_millis(50));
        let settled = system.cycles();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(system.cycles(), settled);
    }

    #[test]
    fn cycle_from_before_a_pause_is_not_published() {
        let (_sender, receiver) = mpsc::channel();
        let worker = Worker {
            shapes: store(),
            receiver,
            field: Arc::new(Mutex::new(GravityField::default())),
            cycles: Arc::new(AtomicU64::new(0)),
            epoch: Arc::new(AtomicU64::new(3)),
            config: NbodyConfig::new(),
            substep_dt: 0.01,
            state: WorkerState::Running,
        };
        let forces: HashMap<ShapeId, Vec2<f64>> = [(ShapeId(1), Vec2::new(1.0, 0.0))].into_iter().collect();

        worker.epoch.fetch_add(1, Ordering::AcqRel);
        assert!(!worker.publish(forces.clone(), 3));
        assert!(worker.field.lock().forces.is_empty());
        assert_eq!(worker.cycles.load(Ordering::Acquire), 0);

        assert!(worker.publish(forces, 4));
        assert_eq!(worker.field.lock().epoch, 4);
    }

    #[test]
    fn resume_starts_from_an_empty_field() {
        let mut system = NbodySystem::spawn(store(), NbodyConfig::new().with_interval_ms(1), 0.01).unwrap();
        system.resume();
        assert!(wait_for_cycles(&system, 2));
        system.pause();
        system.resume();
        let epoch = system.epoch();
        let field = system.field();
        assert!(field.forces.is_empty() || field.epoch == epoch);
        let seen = system.cycles();
        assert!(wait_for_cycles(&system, seen + 1));
        assert_eq!(system.field().epoch, epoch);
    }

    #[test]
    fn collect_skips_marked_shapes() {
        let shapes = store();
        shapes.write()[0].mark_for_deletion();
        let (ids, bodies) = collect_bodies(&shapes.read(), 0.01);
        assert_eq!(ids.len(), 1);
        assert_eq!(bodies[0].position, Vec2::new(100.0, 0.0));
    }
}
