//! Error types for physics operations.

use core::fmt;

/// Errors that can occur while building shapes, editing the world or
/// committing configuration.
///
/// Numerical edge cases inside a step (zero-length edges, coincident
/// bodies) are never reported here; they are skipped where they occur.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// Mass must be positive and finite.
    InvalidMass,
    /// Stiffness must be in [0, 1].
    InvalidStiffness,
    /// Timestep must be positive and finite.
    InvalidTimestep,
    /// Substep and iteration counts must be at least 1.
    InvalidSubsteps,
    /// A restitution or friction coefficient is out of range.
    InvalidCoefficient { name: &'static str },
    /// Barnes-Hut theta must be non-negative and finite.
    InvalidTheta,
    /// Point index is out of bounds for its shape.
    PointOutOfBounds { index: usize, count: usize },
    /// No live shape carries this id.
    ShapeNotFound { id: u64 },
    /// No live point carries this id.
    PointNotFound { id: u64 },
    /// Grid dimensions must be at least 2x2.
    InvalidGridDimensions,
    /// Closed shapes need at least 3 segments, chains at least 1.
    InsufficientSegments,
    /// Snapshot encoding, decoding or file access failed.
    Snapshot(String),
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicsError::InvalidMass => write!(f, "mass must be positive and finite"),
            PhysicsError::InvalidStiffness => write!(f, "stiffness must be in [0, 1]"),
            PhysicsError::InvalidTimestep => write!(f, "timestep must be positive and finite"),
            PhysicsError::InvalidSubsteps => write!(f, "substep and iteration counts must be at least 1"),
            PhysicsError::InvalidCoefficient { name } => write!(f, "{} is out of range", name),
            PhysicsError::InvalidTheta => write!(f, "theta must be non-negative and finite"),
            PhysicsError::PointOutOfBounds { index, count } => {
                write!(f, "point index {} out of bounds (count: {})", index, count)
            }
            PhysicsError::ShapeNotFound { id } => write!(f, "no shape with id {}", id),
            PhysicsError::PointNotFound { id } => write!(f, "no point with id {}", id),
            PhysicsError::InvalidGridDimensions => write!(f, "grid must be at least 2x2"),
            PhysicsError::InsufficientSegments => write!(f, "not enough segments for this shape"),
            PhysicsError::Snapshot(msg) => write!(f, "snapshot error: {}", msg),
        }
    }
}

impl std::error::Error for PhysicsError {}
