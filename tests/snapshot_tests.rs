use sandbox2d::{MassShape, PhysicsError, SimConfig, Simulation, Snapshot, StaticCollider, Vec2};

fn populated() -> Simulation<f64> {
    let mut sim = Simulation::new(SimConfig::new().with_restitution(0.2)).unwrap();
    sim.add_collider(StaticCollider::floor(300.0, -500.0, 500.0));
    sim.add_shape(MassShape::chain(Vec2::new(0.0, 0.0), Vec2::new(40.0, 0.0), 4, 1.0, 1.0).unwrap());
    sim.add_shape(MassShape::balloon(Vec2::new(100.0, 100.0), 25.0, 12, 0.5, 0.9, 800.0).unwrap());
    for _ in 0..30 {
        sim.step();
    }
    sim
}

#[test]
fn snapshot_round_trip_restores_world() {
    let sim = populated();
    let bytes = sim.snapshot().to_bytes().unwrap();

    let mut restored = Simulation::new(SimConfig::new()).unwrap();
    restored.restore(Snapshot::from_bytes(&bytes).unwrap()).unwrap();

    assert_eq!(restored.steps(), 30);
    assert_eq!(restored.time(), sim.time());
    assert_eq!(restored.colliders(), sim.colliders());
    assert_eq!(restored.config(), sim.config());
    assert_eq!(restored.draw_data(), sim.draw_data());

    let original = sim.snapshot();
    for shape in &original.shapes {
        let copy = restored.shape(shape.id).expect("restored shape keeps its id");
        assert_eq!(copy.constraint_count(), shape.constraint_count());
        assert_eq!(copy.inflation, shape.inflation);
        for (a, b) in copy.points().iter().zip(shape.points()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.pos, b.pos);
            assert_eq!(a.prev_pos, b.prev_pos);
            assert_eq!(a.mass(), b.mass());
        }
    }
}

#[test]
fn new_ids_do_not_collide_with_restored_ones() {
    let sim = populated();
    let snapshot = sim.snapshot();
    let max_id = snapshot.shapes.iter().map(|s| s.id).max().unwrap();
    let mut restored = Simulation::new(SimConfig::new()).unwrap();
    restored.restore(snapshot).unwrap();
    let fresh = restored.add_shape(MassShape::particle(Vec2::new(0.0, 0.0), 1.0).unwrap());
    assert!(fresh > max_id);
}

#[test]
fn corrupt_snapshot_is_reported() {
    let sim = populated();
    let mut bytes = sim.snapshot().to_bytes().unwrap();
    bytes.truncate(bytes.len() / 2);
    assert!(matches!(Snapshot::<f64>::from_bytes(&bytes), Err(PhysicsError::Snapshot(_))));
}

#[test]
fn deletion_waits_for_readers() {
    let mut sim = populated();
    let ids: Vec<_> = sim.draw_data().iter().map(|d| d.id).collect();
    sim.delete_shape(ids[0]).unwrap();

    let store = sim.shape_store();
    let reader = store.read();
    assert_eq!(sim.prune_marked(), 0, "prune must not block on a reader");
    assert_eq!(reader.len(), 2);
    drop(reader);

    assert_eq!(sim.prune_marked(), 1);
    assert_eq!(store.read().len(), 1);
    assert!(sim.shape(ids[0]).is_none());
}

#[test]
fn marked_shapes_are_invisible_before_prune() {
    let mut sim = populated();
    let id = sim.draw_data()[1].id;
    sim.delete_shape(id).unwrap();
    assert!(sim.shape(id).is_none());
    assert_eq!(sim.shape_count(), 1);
    assert_eq!(sim.delete_shape(id), Err(PhysicsError::ShapeNotFound { id: id.0 }));
    sim.step();
    assert_eq!(sim.shape_store().read().len(), 1);
}
