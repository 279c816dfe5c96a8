//! # convlens_models
//!
//! Reference CNN architectures for convlens visualization.
//!
//! This crate provides:
//! - [`MobileNetV2Small`] - a compact MobileNetV2-style network with
//!   inverted residual blocks, the architecture the visualizer is built
//!   around
//! - [`SmallCnn`] - a minimal two-convolution network for tests and demos
//! - [`ModelRegistry`] - dynamic model creation by name from JSON config
//!
//! Every model implements [`convlens_core::SpatialModel`], exposing its
//! spatial backbone stage by stage for truncated forward passes, gradient
//! capture, and kernel inspection.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod mobilenet;
mod registry;
mod small;

pub use mobilenet::{MobileNetV2Small, MobileNetV2SmallConfig};
pub use registry::{default_registry, ModelRegistry, RegistryError};
pub use small::{SmallCnn, SmallCnnConfig};
