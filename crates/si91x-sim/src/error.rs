//! Error types for the simulator

use thiserror::Error;

/// Simulator errors
#[derive(Debug, Error)]
pub enum SimError {
    /// Flash geometry the model cannot represent
    #[error("Invalid flash geometry: {0}")]
    Geometry(String),

    /// Initial image larger than the simulated flash
    #[error("Image of {len} bytes does not fit a {size} byte flash")]
    ImageTooLarge { len: usize, size: usize },

    /// The driver under test returned an error
    #[error("Driver error: {0}")]
    Driver(#[from] si91x_core::Error),
}

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, SimError>;
