//! Benchmarks for sandbox2d simulation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sandbox2d::*;

fn bench_cloth_steps(c: &mut Criterion) {
    c.bench_function("cloth_20x20_60_steps", |b| {
        b.iter(|| {
            let config = ClothConfig {
                cols: 20,
                rows: 20,
                spacing: 5.0,
                structural_stiffness: 1.0,
                shear_stiffness: 0.5,
                bend_stiffness: 0.3,
                point_mass: 1.0,
            };
            let mut cloth = MassShape::cloth(Vec2::new(0.0, 0.0), &config).unwrap();
            for col in 0..20 {
                cloth.pin_point(col).unwrap();
            }
            let mut sim = Simulation::new(SimConfig::<f32>::new().with_collisions(false)).unwrap();
            sim.add_shape(cloth);
            for _ in 0..60 {
                sim.step();
            }
            sim.total_energy()
        });
    });
}

fn bench_pile_of_balls(c: &mut Criterion) {
    c.bench_function("balls_50_on_floor_60_steps", |b| {
        b.iter(|| {
            let mut sim = Simulation::new(SimConfig::<f32>::new().with_restitution(0.2)).unwrap();
            sim.add_collider(StaticCollider::floor(400.0, -1000.0, 1000.0));
            for i in 0..50 {
                let x = (i % 10) as f32 * 45.0 - 200.0;
                let y = (i / 10) as f32 * 45.0;
                sim.add_shape(MassShape::ball(Vec2::new(x, y), 18.0, 10, 0.5, 1.0).unwrap());
            }
            for _ in 0..60 {
                sim.step();
            }
            sim.shape_count()
        });
    });
}

fn random_bodies(count: usize) -> Vec<GravityBody<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    (0..count)
        .map(|_| GravityBody {
            position: Vec2::new(rng.gen_range(-1000.0..1000.0), rng.gen_range(-1000.0..1000.0)),
            velocity: Vec2::zero(),
            mass: rng.gen_range(1.0..10.0),
        })
        .collect()
}

fn bench_gravity(c: &mut Criterion) {
    let bodies = random_bodies(2000);
    let params = GravityParams { g: 1.0, min_distance: 1.0, theta: 0.5, post_newtonian: false, speed_of_light: 1.0 };
    c.bench_function("barnes_hut_2000_bodies", |b| {
        b.iter(|| BarnesHutTree::build(black_box(&bodies)).forces(&params))
    });
    c.bench_function("direct_sum_2000_bodies", |b| {
        b.iter(|| {
            (0..bodies.len())
                .map(|i| BarnesHutTree::direct_force_on(black_box(&bodies), i, &params))
                .fold(Vec2::zero(), |acc, f| acc + f)
        })
    });
}

fn bench_quadtree(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let boxes: Vec<Aabb<f32>> = (0..2000)
        .map(|_| {
            let center = Vec2::new(rng.gen_range(0.0..2000.0), rng.gen_range(0.0..2000.0));
            Aabb::from_center(center, Vec2::splat(rng.gen_range(2.0..20.0)))
        })
        .collect();
    let world = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(2000.0, 2000.0));
    c.bench_function("quadtree_2000_boxes_pairs", |b| {
        b.iter(|| {
            let mut tree = QuadTree::new(world, 8, 8);
            for (i, aabb) in boxes.iter().enumerate() {
                tree.insert(i, *aabb);
            }
            tree.candidate_pairs().len()
        })
    });
}

criterion_group!(benches, bench_cloth_steps, bench_pile_of_balls, bench_gravity, bench_quadtree);
criterion_main!(benches);
