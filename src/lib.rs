//! A 2D particle-and-constraint physics kernel.
//!
//! `sandbox2d` simulates soft and rigid-ish bodies built from point masses
//! tied together by distance constraints, the way a physics sandbox does:
//! boxes, balls, balloons, ropes, cloth, pendulums and freeform contraptions
//! falling, colliding and attracting each other.
//!
//! # Features
//!
//! - **Verlet integration**: Störmer-Verlet point masses with implicit velocity
//! - **Position-based constraints**: substep-independent stiffness, shuffled relaxation order
//! - **Inflatable shapes**: ideal-gas pressure from the enclosed shoelace area
//! - **Collisions**: quadtree broad-phase, point-point and point-edge contacts with restitution and Coulomb friction
//! - **N-body gravity**: Barnes-Hut approximation on a background worker thread
//! - **Snapshots**: whole-world save/restore with bincode
//! - **Observable**: monitor steps via the `StepObserver` trait
//!
//! # Example
//! ```
//! use sandbox2d::{MassShape, SimConfig, Simulation, StaticCollider, Vec2};
//!
//! let mut sim = Simulation::new(SimConfig::<f64>::new()).unwrap();
//! sim.add_collider(StaticCollider::floor(300.0, -1000.0, 1000.0));
//! let ball = sim.add_shape(MassShape::ball(Vec2::new(0.0, 100.0), 20.0, 12, 1.0, 1.0).unwrap());
//! sim.advance(1.0 / 60.0);
//! assert!(sim.shape(ball).is_some());
//! ```

pub mod float;
pub mod vec;
pub mod geometry;
pub mod point_mass;
pub mod constraint;
pub mod collider;
pub mod shape;
pub mod quadtree;
pub mod barnes_hut;
pub mod collision;
pub mod nbody;
pub mod simulation;
pub mod snapshot;
pub mod observer;
pub mod config;
pub mod error;

// Re-export primary API
pub use float::Float;
pub use vec::Vec2;
pub use geometry::Aabb;
pub use point_mass::{PointId, PointMass};
pub use constraint::DistanceConstraint;
pub use collider::{StaticCollider, StaticContact};
pub use shape::{ClothConfig, MassShape, Outline, ShapeId, ShapeKind};
pub use quadtree::QuadTree;
pub use barnes_hut::{BarnesHutTree, GravityBody, GravityParams};
pub use collision::{CollisionStats, CollisionSystem};
pub use nbody::{GravityField, NbodyMessage, NbodySystem, SharedShapes, WorkerState};
pub use simulation::{ShapeDrawData, Simulation};
pub use snapshot::Snapshot;
pub use observer::{NoOpStepObserver, StepObserver};
pub use config::{NbodyConfig, SimConfig};
pub use error::PhysicsError;
