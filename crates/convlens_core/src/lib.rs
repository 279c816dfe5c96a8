//! # convlens_core
//!
//! Core types and traits for convlens CNN visualization.
//!
//! This crate provides:
//! - [`CoreError`] and the crate-wide [`Result`] alias
//! - [`LayerKind`] / [`LayerInfo`] layer taxonomy and descriptor parsing
//! - [`SpatialModel`] trait for CNNs that expose their internal stages
//! - [`RgbImage`] decoded-image input type
//! - [`Seed`] for deterministic random number generation
//! - [`CancelToken`] for cooperative cancellation of iterative work
//! - Tensor helpers: unit-range normalization, bilinear resize, host readback
//!
//! ## Shape Convention
//!
//! Image tensors follow burn's `(N, C, H, W)` convention:
//! - `N`: Batch size (always 1 for visualization requests)
//! - `C`: Channels
//! - `H`, `W`: Spatial dimensions

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod cancel;
mod error;
mod image;
mod layer;
mod model;
mod seed;
mod tensor;

pub use cancel::CancelToken;
pub use error::{CoreError, Result};
pub use image::RgbImage;
pub use layer::{parse_descriptors, LayerInfo, LayerKind};
pub use model::SpatialModel;
pub use seed::Seed;
pub use tensor::{normalize_unit, read_f32, resize_bilinear, EPS};

/// Backend type aliases for convenience
pub mod backend {
    pub use burn_ndarray::NdArray;
}
