//! # convlens
//!
//! CNN attribution and visualization toolkit: the numeric core of an
//! explainable-AI model inspector.
//!
//! convlens turns a trained convolutional network's internal tensors into
//! human-interpretable images:
//!
//! - **Attribution**: GradCAM heatmaps and Integrated Gradients maps
//! - **Inspection**: filter-weight tiles and activation-map tiles
//! - **Synthesis**: activation-maximization "preferred stimulus" images
//! - **Prediction**: ranked, labeled top-K output
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use convlens::prelude::*;
//!
//! type B = Autodiff<NdArray>;
//!
//! let device = Default::default();
//! let model = MobileNetV2SmallConfig::new(1000).init::<B>(&device);
//!
//! let mut bench = Workbench::new(device);
//! bench.attach_model(model);
//! bench.set_family(ModelFamily::MobileNet);
//!
//! let output = bench.predict(&image, 5)?;
//! let heatmap = bench.grad_cam_overlay(&image, "head_conv", None, 0.6)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod workbench;

// Re-export all crates
pub use convlens_core as core;
pub use convlens_explain as explain;
pub use convlens_models as models;
pub use convlens_viz as viz;

pub use workbench::{Workbench, WorkbenchError, DEFAULT_OVERLAY_ALPHA};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use convlens::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use convlens_core::{
        parse_descriptors, CancelToken, LayerInfo, LayerKind, RgbImage, Seed, SpatialModel,
    };

    // Models
    pub use convlens_models::{
        default_registry, MobileNetV2Small, MobileNetV2SmallConfig, SmallCnn, SmallCnnConfig,
    };

    // Explain
    pub use convlens_explain::{
        ActivationVisConfig, AttributionMap, ClassLabels, ExplainError, FilterVisConfig,
        GridConfig, IntegratedGradientsConfig, ModelFamily, Prediction, PredictionOutput,
        SynthesisConfig,
    };

    // Viz
    pub use convlens_viz::{ColorMap, PixelBuffer, VisualizationTile};

    // Facade
    pub use crate::{Workbench, WorkbenchError};

    // Backends
    pub use burn_autodiff::Autodiff;
    pub use burn_ndarray::NdArray;
}
