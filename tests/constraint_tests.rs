use approx::assert_abs_diff_eq;
use sandbox2d::{DistanceConstraint, MassShape, PointMass, SimConfig, Simulation, Vec2};

fn stretched_pair(distance: f64) -> Vec<PointMass<f64>> {
    vec![
        PointMass::new(Vec2::new(0.0, 0.0), 2.0),
        PointMass::new(Vec2::new(distance, 0.0), 2.0),
    ]
}

#[test]
fn relaxation_error_shrinks_every_iteration() {
    for &stiffness in &[0.1, 0.5, 0.9, 1.0] {
        let mut points = stretched_pair(25.0);
        let c = DistanceConstraint::with_rest_length(0, 1, 10.0, stiffness).unwrap();
        let mut previous = c.error(&points).abs();
        for _ in 0..30 {
            c.relax(&mut points, 1);
            let now = c.error(&points).abs();
            assert!(now < previous || now <= 1e-9, "k = {}: {} -> {}", stiffness, previous, now);
            previous = now;
        }
        assert!(previous < 1.0, "k = {} did not converge: {}", stiffness, previous);
    }
}

#[test]
fn compressed_pair_pushes_apart() {
    let mut points = stretched_pair(2.0);
    let c = DistanceConstraint::with_rest_length(0, 1, 10.0, 1.0).unwrap();
    c.relax(&mut points, 8);
    assert_abs_diff_eq!(points[0].pos.distance(points[1].pos), 10.0, epsilon = 1e-9);
}

#[test]
fn one_timestep_removes_same_fraction_for_any_substep_count() {
    let c = DistanceConstraint::with_rest_length(0, 1, 10.0, 0.3).unwrap();
    let mut fractions = Vec::new();
    for &substeps in &[1usize, 2, 4, 8, 16] {
        let mut points = stretched_pair(20.0);
        for _ in 0..substeps {
            c.relax(&mut points, substeps);
        }
        fractions.push(c.error(&points) / -10.0);
    }
    for f in &fractions {
        assert_abs_diff_eq!(*f, 0.7, epsilon = 1e-9);
    }
}

fn hanging_chain_tip(substeps: usize) -> Vec2<f64> {
    let config = SimConfig::new()
        .with_substeps(substeps)
        .with_damping(0.999)
        .with_collisions(false);
    let mut sim = Simulation::new(config).unwrap();
    let mut chain = MassShape::chain(Vec2::new(0.0, 0.0), Vec2::new(50.0, 0.0), 5, 1.0, 0.5).unwrap();
    chain.pin_point(0).unwrap();
    let id = sim.add_shape(chain);
    for _ in 0..2400 {
        sim.step();
    }
    let shape = sim.shape(id).unwrap();
    shape.points()[5].pos
}

#[test]
fn doubling_substeps_keeps_steady_state() {
    let coarse = hanging_chain_tip(4);
    let fine = hanging_chain_tip(8);
    // hangs straight down from the pin
    assert!(coarse.x.abs() < 1.0, "coarse tip {:?}", coarse);
    assert!((coarse.y - 50.0).abs() < 2.0, "coarse tip {:?}", coarse);
    assert!(coarse.distance(fine) < 1.0, "coarse {:?} fine {:?}", coarse, fine);
}

#[test]
fn box_keeps_its_shape_under_gravity() {
    let mut sim = Simulation::new(SimConfig::<f64>::new().with_collisions(false)).unwrap();
    let id = sim.add_shape(MassShape::rectangle(Vec2::new(0.0, 0.0), 40.0, 20.0, 1.0, 1.0).unwrap());
    for _ in 0..120 {
        sim.step();
    }
    let shape = sim.shape(id).unwrap();
    for c in shape.constraints() {
        assert!(c.error(shape.points()).abs() < 1e-3);
    }
}
