//! Error types for convlens_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur in convlens_core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid tensor or image shape provided.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// Stage index outside the model's spatial backbone.
    #[error("Stage index {stage} out of range (model has {n_stages} stages)")]
    StageOutOfRange {
        /// Requested stage index.
        stage: usize,
        /// Number of stages the model exposes.
        n_stages: usize,
    },

    /// Device-to-host tensor readback failed.
    #[error("Tensor readback failed: {0}")]
    Readback(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}
