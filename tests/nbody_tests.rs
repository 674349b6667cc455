use std::thread;
use std::time::{Duration, Instant};

use sandbox2d::{MassShape, NbodyConfig, SimConfig, Simulation, Vec2};

fn gravity_only(enabled: bool) -> SimConfig<f64> {
    let mut nbody = NbodyConfig::new()
        .with_gravitational_constant(1000.0)
        .with_min_distance(5.0)
        .with_interval_ms(1);
    nbody.enabled = enabled;
    SimConfig::new().without_gravity().with_nbody(nbody)
}

fn wait_for_cycles(sim: &Simulation<f64>, n: u64) {
    let start = Instant::now();
    while sim.nbody_cycles().unwrap_or(0) < n {
        assert!(start.elapsed() < Duration::from_secs(5), "n-body worker never cycled");
        thread::sleep(Duration::from_millis(1));
    }
}

fn separation(sim: &Simulation<f64>, a: sandbox2d::ShapeId, b: sandbox2d::ShapeId) -> f64 {
    let pa = sim.shape(a).unwrap().center_of_mass();
    let pb = sim.shape(b).unwrap().center_of_mass();
    pa.distance(pb)
}

#[test]
fn shapes_attract_when_enabled() {
    let mut sim = Simulation::new(gravity_only(true)).unwrap();
    let a = sim.add_shape(MassShape::particle(Vec2::new(0.0, 0.0), 10.0).unwrap());
    let b = sim.add_shape(MassShape::particle(Vec2::new(100.0, 0.0), 10.0).unwrap());
    // the cycle in flight may predate the shapes; wait for one that starts after
    let seen = sim.nbody_cycles().unwrap();
    wait_for_cycles(&sim, seen + 2);
    for _ in 0..60 {
        sim.step();
    }
    assert!(separation(&sim, a, b) < 99.9);
}

#[test]
fn disabled_gravity_leaves_shapes_alone() {
    let mut sim = Simulation::new(gravity_only(false)).unwrap();
    let a = sim.add_shape(MassShape::particle(Vec2::new(0.0, 0.0), 10.0).unwrap());
    let b = sim.add_shape(MassShape::particle(Vec2::new(100.0, 0.0), 10.0).unwrap());
    for _ in 0..60 {
        sim.step();
    }
    assert_eq!(separation(&sim, a, b), 100.0);
    assert_eq!(sim.nbody_cycles(), None);
}

#[test]
fn toggling_config_starts_and_pauses_worker() {
    let mut sim = Simulation::new(gravity_only(false)).unwrap();
    sim.add_shape(MassShape::particle(Vec2::new(0.0, 0.0), 10.0).unwrap());
    sim.add_shape(MassShape::particle(Vec2::new(50.0, 0.0), 10.0).unwrap());

    sim.set_config(gravity_only(true)).unwrap();
    wait_for_cycles(&sim, 1);

    sim.pause();
    thread::sleep(Duration::from_millis(50));
    let paused_at = sim.nbody_cycles().unwrap();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(sim.nbody_cycles().unwrap(), paused_at);

    sim.resume();
    wait_for_cycles(&sim, paused_at + 1);
}
