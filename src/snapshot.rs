//! Whole-world snapshots, encoded with bincode.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collider::StaticCollider;
use crate::config::SimConfig;
use crate::error::PhysicsError;
use crate::float::Float;
use crate::shape::MassShape;

/// Bumped whenever the encoded layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Shapes, static colliders, configuration and clock of a simulation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Snapshot<F: Float> {
    pub version: u32,
    pub time: F,
    pub steps: u64,
    pub config: SimConfig<F>,
    pub shapes: Vec<MassShape<F>>,
    pub colliders: Vec<StaticCollider<F>>,
}

impl<F: Float> Snapshot<F> {
    pub fn to_bytes(&self) -> Result<Vec<u8>, PhysicsError> {
        bincode::serialize(self).map_err(|e| PhysicsError::Snapshot(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PhysicsError> {
        let snapshot: Self = bincode::deserialize(bytes).map_err(|e| PhysicsError::Snapshot(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PhysicsError::Snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PhysicsError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PhysicsError::Snapshot(e.to_string()))?;
        }
        let bytes = self.to_bytes()?;
        fs::write(path, &bytes).map_err(|e| PhysicsError::Snapshot(e.to_string()))?;
        info!(path = %path.display(), bytes = bytes.len(), shapes = self.shapes.len(), "snapshot saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PhysicsError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| PhysicsError::Snapshot(format!("{}: {}", path.display(), e)))?;
        let snapshot = Self::from_bytes(&bytes)?;
        info!(path = %path.display(), shapes = snapshot.shapes.len(), "snapshot loaded");
        Ok(snapshot)
    }
}
