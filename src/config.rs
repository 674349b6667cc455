//! Runtime configuration of the simulation.

use serde::{Deserialize, Serialize};

use crate::barnes_hut::GravityParams;
use crate::error::PhysicsError;
use crate::float::Float;
use crate::vec::Vec2;

/// Everything the simulation reads while stepping.
///
/// Edit a copy and hand it to [`Simulation::set_config`](crate::Simulation::set_config);
/// it is validated and swapped in between steps, never during one.
///
/// # Builder Pattern
/// ```
/// use sandbox2d::config::SimConfig;
/// use sandbox2d::vec::Vec2;
///
/// let config: SimConfig<f32> = SimConfig::new()
///     .with_gravity(Vec2::new(0.0, 9.81))
///     .with_substeps(8)
///     .with_constraint_iterations(4)
///     .with_restitution(0.3);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
#[serde(default)]
pub struct SimConfig<F: Float> {
    /// Bounciness of every contact, in [0, 1]. Default: 0.5.
    pub restitution: F,
    /// Coulomb coefficient for sliding contacts. Default: 0.3.
    pub kinetic_friction: F,
    /// Coulomb coefficient below which sliding stops. Default: 0.5.
    pub static_friction: F,
    /// Gravity acceleration (world units per second squared, +y is down). Default: (0, 9.81).
    pub gravity: Vec2<F>,
    pub gravity_enabled: bool,
    /// Fixed timestep in seconds. Default: 1/60.
    pub timestep: F,
    /// Substeps per timestep. Default: 8.
    pub substeps: usize,
    /// Relaxation passes per substep. Default: 4.
    pub constraint_iterations: usize,
    pub collisions_enabled: bool,
    /// Scales pressure in inflated shapes. Default: 1.
    pub gas_constant: F,
    /// Velocity kept per substep, in [0, 1]. 1 means no damping.
    pub damping: F,
    /// Steps `advance` may take for one frame before dropping the backlog. Default: 8.
    pub max_steps_per_frame: usize,
    pub quadtree_capacity: usize,
    pub quadtree_max_depth: usize,
    /// Grows shape boxes before broad-phase insertion.
    pub collision_margin: F,
    /// Seed of the constraint-shuffling RNG.
    pub seed: u64,
    pub nbody: NbodyConfig<F>,
}

/// Settings of the background gravity worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
#[serde(default)]
pub struct NbodyConfig<F: Float> {
    pub enabled: bool,
    pub gravitational_constant: F,
    /// Shapes closer than this do not attract. Default: 10.
    pub min_distance: F,
    /// Barnes-Hut opening threshold. Default: 0.5.
    pub theta: F,
    pub post_newtonian: bool,
    /// Speed of light in world units per second, for the post-Newtonian term.
    pub speed_of_light: F,
    /// Sleep between worker cycles, in milliseconds. Default: 16.
    pub interval_ms: u64,
}

impl<F: Float> SimConfig<F> {
    /// Create a config with default values.
    pub fn new() -> Self {
        SimConfig {
            restitution: F::half(),
            kinetic_friction: F::from_f32(0.3),
            static_friction: F::half(),
            gravity: Vec2::new(F::zero(), F::from_f32(9.81)),
            gravity_enabled: true,
            timestep: F::one() / F::from_f32(60.0),
            substeps: 8,
            constraint_iterations: 4,
            collisions_enabled: true,
            gas_constant: F::one(),
            damping: F::one(),
            max_steps_per_frame: 8,
            quadtree_capacity: 8,
            quadtree_max_depth: 8,
            collision_margin: F::one(),
            seed: 0,
            nbody: NbodyConfig::default(),
        }
    }

    /// Duration of one substep.
    pub fn substep_dt(&self) -> F {
        self.timestep / F::from_usize(self.substeps.max(1))
    }

    /// Gravity vector to integrate with, `None` when switched off.
    pub fn active_gravity(&self) -> Option<Vec2<F>> {
        self.gravity_enabled.then_some(self.gravity)
    }

    pub fn with_restitution(mut self, restitution: F) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_friction(mut self, kinetic: F, static_: F) -> Self {
        self.kinetic_friction = kinetic;
        self.static_friction = static_;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec2<F>) -> Self {
        self.gravity = gravity;
        self.gravity_enabled = true;
        self
    }

    pub fn without_gravity(mut self) -> Self {
        self.gravity_enabled = false;
        self
    }

    pub fn with_timestep(mut self, timestep: F) -> Self {
        self.timestep = timestep;
        self
    }

    pub fn with_substeps(mut self, substeps: usize) -> Self {
        self.substeps = substeps;
        self
    }

    pub fn with_constraint_iterations(mut self, iterations: usize) -> Self {
        self.constraint_iterations = iterations;
        self
    }

    pub fn with_collisions(mut self, enabled: bool) -> Self {
        self.collisions_enabled = enabled;
        self
    }

    pub fn with_gas_constant(mut self, gas_constant: F) -> Self {
        self.gas_constant = gas_constant;
        self
    }

    pub fn with_damping(mut self, damping: F) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_nbody(mut self, nbody: NbodyConfig<F>) -> Self {
        self.nbody = nbody;
        self
    }

    /// Reject values the solver cannot run with.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !(self.timestep.is_finite() && self.timestep > F::zero()) {
            return Err(PhysicsError::InvalidTimestep);
        }
        if self.substeps == 0 || self.constraint_iterations == 0 || self.max_steps_per_frame == 0 {
            return Err(PhysicsError::InvalidSubsteps);
        }
        check_range("restitution", self.restitution, F::zero(), F::one())?;
        check_non_negative("kinetic_friction", self.kinetic_friction)?;
        check_non_negative("static_friction", self.static_friction)?;
        check_range("damping", self.damping, F::zero(), F::one())?;
        check_non_negative("gas_constant", self.gas_constant)?;
        check_non_negative("collision_margin", self.collision_margin)?;
        if !self.gravity.is_finite() {
            return Err(PhysicsError::InvalidCoefficient { name: "gravity" });
        }
        if self.quadtree_capacity == 0 {
            return Err(PhysicsError::InvalidCoefficient { name: "quadtree_capacity" });
        }
        self.nbody.validate()
    }
}

impl<F: Float> Default for SimConfig<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> NbodyConfig<F> {
    pub fn new() -> Self {
        NbodyConfig {
            enabled: false,
            gravitational_constant: F::one(),
            min_distance: F::from_f32(10.0),
            theta: F::half(),
            post_newtonian: false,
            speed_of_light: F::from_f32(1000.0),
            interval_ms: 16,
        }
    }

    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    pub fn with_gravitational_constant(mut self, g: F) -> Self {
        self.gravitational_constant = g;
        self
    }

    pub fn with_theta(mut self, theta: F) -> Self {
        self.theta = theta;
        self
    }

    pub fn with_min_distance(mut self, min_distance: F) -> Self {
        self.min_distance = min_distance;
        self
    }

    pub fn with_post_newtonian(mut self, speed_of_light: F) -> Self {
        self.post_newtonian = true;
        self.speed_of_light = speed_of_light;
        self
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn params(&self) -> GravityParams<F> {
        GravityParams {
            g: self.gravitational_constant,
            min_distance: self.min_distance,
            theta: self.theta,
            post_newtonian: self.post_newtonian,
            speed_of_light: self.speed_of_light,
        }
    }

    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !(self.theta.is_finite() && self.theta >= F::zero()) {
            return Err(PhysicsError::InvalidTheta);
        }
        if !self.gravitational_constant.is_finite() {
            return Err(PhysicsError::InvalidCoefficient { name: "gravitational_constant" });
        }
        check_non_negative("min_distance", self.min_distance)?;
        if self.post_newtonian && !(self.speed_of_light.is_finite() && self.speed_of_light > F::zero()) {
            return Err(PhysicsError::InvalidCoefficient { name: "speed_of_light" });
        }
        Ok(())
    }
}

impl<F: Float> Default for NbodyConfig<F> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_range<F: Float>(name: &'static str, value: F, lo: F, hi: F) -> Result<(), PhysicsError> {
    if value.is_finite() && value >= lo && value <= hi {
        Ok(())
    } else {
        Err(PhysicsError::InvalidCoefficient { name })
    }
}

fn check_non_negative<F: Float>(name: &'static str, value: F) -> Result<(), PhysicsError> {
    if value.is_finite() && value >= F::zero() {
        Ok(())
    } else {
        Err(PhysicsError::InvalidCoefficient { name })
    }
}
