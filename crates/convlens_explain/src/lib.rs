//! # convlens_explain
//!
//! Attribution and visualization algorithms for convlens.
//!
//! This crate provides the numeric side of the visualizer:
//! - GradCAM heatmaps and Integrated Gradients attribution maps
//! - Filter-weight and activation-map inspection
//! - Activation-maximization feature synthesis
//! - Prediction with family-specific preprocessing and ranked labels
//!
//! Everything operates through [`convlens_core::SpatialModel`], so the same
//! algorithms run against any model that can expose its spatial backbone.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod attribution;
mod error;
mod inspect;
mod predict;
mod synthesis;

pub use attribution::{
    grad_cam, grad_cam_heatmap, integrated_gradients, integrated_gradients_with,
    AttributionMap, AttributionMethod, InputAttribution, IntegratedGradientsConfig,
};
pub use error::{ExplainError, Result};
pub use inspect::{
    visualize_activations, visualize_filters, ActivationVisConfig, ChannelMap, FilterVisConfig,
};
pub use predict::{predict, rank, ClassLabels, ModelFamily, Prediction, PredictionOutput};
pub use synthesis::{
    synthesize_filter, synthesize_layer_filters, GridConfig, SynthesisConfig, SynthesisResult,
};

use burn::prelude::*;
use convlens_core::SpatialModel;

/// Resolve a layer name to a spatial stage index, distinguishing "missing"
/// from "exists but is not addressable".
pub(crate) fn resolve_spatial_stage<B: Backend, M: SpatialModel<B>>(
    model: &M,
    name: &str,
) -> Result<usize> {
    match model.stage(name) {
        Some(stage) => Ok(stage),
        None => match model.layer(name) {
            Some(info) => Err(ExplainError::UnsupportedLayerKind {
                name: name.to_string(),
                kind: info.kind,
            }),
            None => Err(ExplainError::LayerNotFound(name.to_string())),
        },
    }
}
