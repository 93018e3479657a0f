//! Error types for drrkit

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DrrError {
    /// Mismatched priorities, unknown spectrum or interpolation names, invalid render parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Non-finite or non-orthonormal transforms, degenerate voxel spacing.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Work partitioning does not fit the compute backend.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The compute backend could not be acquired, used, or released.
    #[error("Device error: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, DrrError>;
