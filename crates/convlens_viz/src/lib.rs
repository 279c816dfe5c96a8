//! # convlens_viz
//!
//! Presentation adapter: turns normalized maps and image tensors into RGBA
//! pixel buffers ready for canvas rendering.
//!
//! This crate provides:
//! - [`ColorMap`] - the fixed color ramps of each visualization method
//! - [`PixelBuffer`] - an in-memory RGBA8 image
//! - [`overlay_heatmap`] - alpha blending of a colorized map over an image
//! - [`assemble_grid`] - row-major tile grid composition with blank padding
//!
//! All work here is host-side and deterministic; the numeric heavy lifting
//! happens upstream in `convlens_explain`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod color;
mod error;
mod grid;
mod pixels;

pub use color::ColorMap;
pub use error::{Result, VizError};
pub use grid::{assemble_grid, VisualizationTile};
pub use pixels::{overlay_heatmap, PixelBuffer};
