//! Model trait for CNNs that expose their internal stages.
//!
//! Attribution and visualization need more than `predict`: they reroute the
//! forward pass to an internal layer, resume it from there, and read raw
//! kernel weights. [`SpatialModel`] is that seam. Implementations keep the
//! invariant `forward_from(forward_to(x, s), s) == forward(x)` for every
//! stage `s`, which guarantees that activations and gradients taken at a
//! stage belong to one consistent pass.

use burn::prelude::*;

use crate::layer::LayerInfo;

/// A CNN whose spatial backbone is addressable stage by stage.
///
/// A *stage* is a truncation point in the spatial backbone: the output of
/// stage `s` is a `(1, C, H, W)` activation tensor. Head layers (global
/// pooling, classifier) appear in [`SpatialModel::layers`] for completeness
/// but have no stage index.
pub trait SpatialModel<B: Backend> {
    /// Expected input resolution as `[height, width]`.
    fn input_size(&self) -> [usize; 2];

    /// Number of output classes.
    fn n_classes(&self) -> usize;

    /// Descriptors for every layer, spatial and head alike.
    fn layers(&self) -> &[LayerInfo];

    /// Resolve a layer name to its stage index in the spatial backbone.
    ///
    /// Returns `None` for head layers and unknown names; use
    /// [`SpatialModel::layer`] to distinguish the two.
    fn stage(&self, name: &str) -> Option<usize>;

    /// Number of stages in the spatial backbone.
    fn n_stages(&self) -> usize;

    /// Number of channels in the activation produced by a stage.
    fn stage_channels(&self, stage: usize) -> usize;

    /// Full forward pass.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape (1, 3, H, W), preprocessed
    ///
    /// # Returns
    ///
    /// Logits tensor of shape (1, n_classes)
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Truncated forward pass through stages `0..=stage`.
    fn forward_to(&self, x: Tensor<B, 4>, stage: usize) -> Tensor<B, 4>;

    /// Resume the forward pass from the activation of `stage` to the logits.
    fn forward_from(&self, feat: Tensor<B, 4>, stage: usize) -> Tensor<B, 2>;

    /// Raw kernel weights of a named layer, shape
    /// `(out_channels, in_channels / groups, kH, kW)`.
    ///
    /// Returns `None` when the layer does not exist or carries no kernel.
    fn kernel(&self, name: &str) -> Option<Tensor<B, 4>>;

    /// Look up a layer descriptor by name.
    fn layer(&self, name: &str) -> Option<&LayerInfo> {
        self.layers().iter().find(|l| l.name == name)
    }
}

impl<B: Backend> SpatialModel<B> for Box<dyn SpatialModel<B>> {
    fn input_size(&self) -> [usize; 2] {
        (**self).input_size()
    }

    fn n_classes(&self) -> usize {
        (**self).n_classes()
    }

    fn layers(&self) -> &[LayerInfo] {
        (**self).layers()
    }

    fn stage(&self, name: &str) -> Option<usize> {
        (**self).stage(name)
    }

    fn n_stages(&self) -> usize {
        (**self).n_stages()
    }

    fn stage_channels(&self, stage: usize) -> usize {
        (**self).stage_channels(stage)
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        (**self).forward(x)
    }

    fn forward_to(&self, x: Tensor<B, 4>, stage: usize) -> Tensor<B, 4> {
        (**self).forward_to(x, stage)
    }

    fn forward_from(&self, feat: Tensor<B, 4>, stage: usize) -> Tensor<B, 2> {
        (**self).forward_from(feat, stage)
    }

    fn kernel(&self, name: &str) -> Option<Tensor<B, 4>> {
        (**self).kernel(name)
    }
}
