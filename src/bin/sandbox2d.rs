//! Headless runner: load a YAML scenario, simulate it, report, optionally snapshot.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sandbox2d::{ClothConfig, MassShape, SimConfig, Simulation, StaticCollider, Vec2};

#[derive(Parser, Debug)]
#[command(about = "Run a sandbox2d scenario without a window")]
struct Args {
    /// Scenario file (YAML).
    #[arg(short, long, default_value = "scenarios/drop.yaml")]
    scenario: PathBuf,
    /// Simulated seconds; overrides the scenario's duration.
    #[arg(short, long)]
    duration: Option<f64>,
    /// Wall-clock frame time fed to the accumulator, in seconds.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    frame_time: f64,
    /// Write a snapshot here when the run ends.
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Restore this snapshot instead of building the scenario's shapes.
    #[arg(long)]
    restore: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
struct Scenario {
    #[serde(default)]
    config: SimConfig<f64>,
    #[serde(default = "default_duration")]
    duration: f64,
    #[serde(default)]
    colliders: Vec<StaticCollider<f64>>,
    #[serde(default)]
    shapes: Vec<ShapeSpec>,
}

fn default_duration() -> f64 {
    10.0
}

#[derive(Deserialize, Debug)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ShapeSpec {
    Particle { position: [f64; 2], mass: f64 },
    Rectangle { center: [f64; 2], width: f64, height: f64, corner_mass: f64, stiffness: f64 },
    Ball { center: [f64; 2], radius: f64, segments: usize, point_mass: f64, stiffness: f64 },
    Balloon { center: [f64; 2], radius: f64, segments: usize, point_mass: f64, stiffness: f64, gas_amount: f64 },
    Chain { start: [f64; 2], end: [f64; 2], segments: usize, point_mass: f64, stiffness: f64, #[serde(default)] pin_start: bool },
    Pendulum { anchor: [f64; 2], bob: [f64; 2], segments: usize, link_mass: f64, bob_mass: f64 },
    Cloth { origin: [f64; 2], cols: usize, rows: usize, spacing: f64, point_mass: f64, #[serde(default)] pin_top: bool },
}

fn v([x, y]: [f64; 2]) -> Vec2<f64> {
    Vec2::new(x, y)
}

impl ShapeSpec {
    fn build(&self) -> Result<MassShape<f64>> {
        let shape = match *self {
            ShapeSpec::Particle { position, mass } => MassShape::particle(v(position), mass)?,
            ShapeSpec::Rectangle { center, width, height, corner_mass, stiffness } => {
                MassShape::rectangle(v(center), width, height, corner_mass, stiffness)?
            }
            ShapeSpec::Ball { center, radius, segments, point_mass, stiffness } => {
                MassShape::ball(v(center), radius, segments, point_mass, stiffness)?
            }
            ShapeSpec::Balloon { center, radius, segments, point_mass, stiffness, gas_amount } => {
                MassShape::balloon(v(center), radius, segments, point_mass, stiffness, gas_amount)?
            }
            ShapeSpec::Chain { start, end, segments, point_mass, stiffness, pin_start } => {
                let mut chain = MassShape::chain(v(start), v(end), segments, point_mass, stiffness)?;
                if pin_start {
                    chain.pin_point(0)?;
                }
                chain
            }
            ShapeSpec::Pendulum { anchor, bob, segments, link_mass, bob_mass } => {
                MassShape::pendulum(v(anchor), v(bob), segments, link_mass, bob_mass)?
            }
            ShapeSpec::Cloth { origin, cols, rows, spacing, point_mass, pin_top } => {
                let config = ClothConfig {
                    cols,
                    rows,
                    spacing,
                    structural_stiffness: 1.0,
                    shear_stiffness: 0.5,
                    bend_stiffness: 0.3,
                    point_mass,
                };
                let mut cloth = MassShape::cloth(v(origin), &config)?;
                if pin_top {
                    for col in 0..cols {
                        cloth.pin_point(col)?;
                    }
                }
                cloth
            }
        };
        Ok(shape)
    }
}

fn load_scenario(path: &PathBuf) -> Result<Scenario> {
    let file = File::open(path).with_context(|| format!("opening scenario {}", path.display()))?;
    let scenario = serde_yaml::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing scenario {}", path.display()))?;
    Ok(scenario)
}

fn check_frame_time(frame_time: f64) -> Result<()> {
    if !(frame_time > 0.0 && frame_time.is_finite()) {
        bail!("frame time must be a positive number of seconds, got {}", frame_time);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    check_frame_time(args.frame_time)?;
    let scenario = load_scenario(&args.scenario)?;
    let duration = args.duration.unwrap_or(scenario.duration);

    let mut sim = Simulation::new(scenario.config.clone())?;
    match &args.restore {
        Some(path) => sim.restore(sandbox2d::Snapshot::load(path)?)?,
        None => {
            for collider in scenario.colliders {
                sim.add_collider(collider);
            }
            let shapes = scenario.shapes.iter().map(ShapeSpec::build).collect::<Result<Vec<_>>>()?;
            sim.add_shapes(shapes);
        }
    }
    info!(shapes = sim.shape_count(), colliders = sim.colliders().len(), duration, "scenario loaded");

    let mut elapsed = 0.0;
    let mut steps = 0;
    while elapsed < duration {
        steps += sim.advance(args.frame_time);
        elapsed += args.frame_time;
    }

    let momentum = sim.total_momentum();
    info!(
        steps,
        time = sim.time(),
        shapes = sim.shape_count(),
        energy = sim.total_energy(),
        momentum_x = momentum.x,
        momentum_y = momentum.y,
        nbody_cycles = sim.nbody_cycles().unwrap_or(0),
        "run complete"
    );

    if let Some(path) = &args.snapshot {
        sim.snapshot().save(path)?;
    }
    Ok(())
}
