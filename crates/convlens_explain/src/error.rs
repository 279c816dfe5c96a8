//! Error types for attribution and visualization.

use convlens_core::{CoreError, LayerKind};
use thiserror::Error;

/// Result type alias using [`ExplainError`].
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors that can occur while computing attributions or visualizations.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// No model is attached to the session.
    #[error("No model attached - load a model first")]
    ModelUnavailable,

    /// Requested layer name does not exist on the current model.
    #[error("Layer '{0}' not found on the current model")]
    LayerNotFound(String),

    /// The layer exists but is not usable for the requested operation.
    #[error("Layer '{name}' has unsupported kind {kind:?} for this operation")]
    UnsupportedLayerKind {
        /// The offending layer name.
        name: String,
        /// Its kind tag.
        kind: LayerKind,
    },

    /// Filter index outside the layer's channel count.
    #[error("Filter index {index} out of range (layer has {channels} channels)")]
    FilterIndexOutOfRange {
        /// Requested filter index.
        index: usize,
        /// Number of channels the layer actually has.
        channels: usize,
    },

    /// Class index outside the model's output range.
    #[error("Class index {index} out of range (model has {classes} classes)")]
    ClassIndexOutOfRange {
        /// Requested class index.
        index: usize,
        /// Number of output classes.
        classes: usize,
    },

    /// The backward pass produced no gradient for the tracked tensor.
    #[error("Gradient unavailable for {0}")]
    GradientUnavailable(&'static str),

    /// The operation was cancelled between iterations.
    #[error("Operation cancelled")]
    Cancelled,

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}
