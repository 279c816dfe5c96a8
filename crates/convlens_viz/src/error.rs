//! Error types for presentation-layer composition.

use thiserror::Error;

/// Result type alias using [`VizError`].
pub type Result<T> = std::result::Result<T, VizError>;

/// Errors that can occur while composing pixel output.
#[derive(Error, Debug)]
pub enum VizError {
    /// A value map does not match the expected pixel count.
    #[error("Map size mismatch: expected {expected} values, got {got}")]
    MapSizeMismatch {
        /// Expected number of values.
        expected: usize,
        /// Actual number of values.
        got: usize,
    },

    /// A tile does not match the grid's tile dimensions.
    #[error("Tile size mismatch: expected {expected_width}x{expected_height}, got {got_width}x{got_height}")]
    TileSizeMismatch {
        /// Expected tile width.
        expected_width: usize,
        /// Expected tile height.
        expected_height: usize,
        /// Actual tile width.
        got_width: usize,
        /// Actual tile height.
        got_height: usize,
    },
}
