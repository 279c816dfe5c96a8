//! Request-level session tying a model, labels and cancellation together.
//!
//! The UI holds one [`Workbench`] per browser session. Each user action maps
//! to one method call; every method checks that a model is attached, runs
//! the numeric work through `convlens_explain`, and renders the result to an
//! RGBA [`PixelBuffer`] through `convlens_viz`.

use std::sync::Arc;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use thiserror::Error;

use convlens_core::{
    read_f32, resize_bilinear, CancelToken, CoreError, LayerInfo, RgbImage, SpatialModel,
};
use convlens_explain::{
    grad_cam_heatmap, integrated_gradients, predict, synthesize_filter, synthesize_layer_filters,
    visualize_activations, visualize_filters, ActivationVisConfig, ClassLabels, ExplainError,
    FilterVisConfig, GridConfig, IntegratedGradientsConfig, ModelFamily, PredictionOutput,
    SynthesisConfig,
};
use convlens_viz::{
    assemble_grid, overlay_heatmap, ColorMap, PixelBuffer, VisualizationTile, VizError,
};

/// Default blend factor for heatmap overlays.
pub const DEFAULT_OVERLAY_ALPHA: f32 = 0.6;

/// Errors surfaced by [`Workbench`] methods.
#[derive(Error, Debug)]
pub enum WorkbenchError {
    /// Attribution/visualization failure.
    #[error(transparent)]
    Explain(#[from] ExplainError),

    /// Pixel composition failure.
    #[error(transparent)]
    Viz(#[from] VizError),

    /// Core failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}

type Result<T> = std::result::Result<T, WorkbenchError>;

/// Session state for one visualization client.
///
/// Generic over the autodiff backend `B` and the model type `M`; all
/// gradient work runs on `B`, results are read back from the inner backend.
pub struct Workbench<B: AutodiffBackend, M: SpatialModel<B>> {
    model: Option<Arc<M>>,
    labels: ClassLabels,
    family: ModelFamily,
    device: B::Device,
    cancel: CancelToken,
}

impl<B, M> Workbench<B, M>
where
    B: AutodiffBackend,
    M: SpatialModel<B>,
{
    /// Create a session with no model attached.
    pub fn new(device: B::Device) -> Self {
        Self {
            model: None,
            labels: ClassLabels::empty(),
            family: ModelFamily::default(),
            device,
            cancel: CancelToken::new(),
        }
    }

    /// Attach a model. Replaces any previously attached one; the model may
    /// be a degraded fallback, the session does not care how it was loaded.
    pub fn attach_model(&mut self, model: M) {
        tracing::debug!(n_layers = model.layers().len(), "model attached");
        self.model = Some(Arc::new(model));
    }

    /// Detach the current model.
    pub fn detach_model(&mut self) {
        self.model = None;
    }

    /// Whether a model is attached.
    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Set the class label table.
    pub fn set_labels(&mut self, labels: ClassLabels) {
        self.labels = labels;
    }

    /// Set the model family tag driving input preprocessing.
    pub fn set_family(&mut self, family: ModelFamily) {
        self.family = family;
    }

    /// A clone of the session's cancellation token. Cancelling it aborts
    /// in-flight iterative work between iterations.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Clear a previously triggered cancellation so new requests can run.
    pub fn reset_cancel(&self) {
        self.cancel.reset();
    }

    /// Layer descriptors of the attached model, for the UI's layer picker.
    pub fn layers(&self) -> Result<Vec<LayerInfo>> {
        Ok(self.model()?.layers().to_vec())
    }

    /// Run inference and return ranked, labeled predictions.
    pub fn predict(&self, image: &RgbImage, top_k: usize) -> Result<PredictionOutput> {
        let model = self.model()?;
        Ok(predict(
            model,
            image,
            &self.labels,
            self.family,
            top_k,
            &self.device,
        )?)
    }

    /// GradCAM heatmap blended over the original image.
    ///
    /// The heatmap is computed at the named layer's resolution, normalized,
    /// upsampled to the image's dimensions and blended with `alpha`.
    pub fn grad_cam_overlay(
        &self,
        image: &RgbImage,
        layer_name: &str,
        class_index: Option<usize>,
        alpha: f32,
    ) -> Result<PixelBuffer> {
        let model = self.model()?;
        tracing::debug!(layer = layer_name, class = ?class_index, "computing GradCAM heatmap");

        let input = self.preprocess(model, image);
        let map = grad_cam_heatmap::<B, M>(model, input, layer_name, class_index)?;

        let values = self.resample_map(map.normalize().values, image)?;
        Ok(overlay_heatmap(image, &values, alpha, ColorMap::Fire)?)
    }

    /// Integrated Gradients magnitude map, colorized at image resolution.
    pub fn integrated_gradients_map(
        &self,
        image: &RgbImage,
        class_index: Option<usize>,
        config: &IntegratedGradientsConfig,
    ) -> Result<PixelBuffer> {
        let model = self.model()?;
        tracing::debug!(steps = config.steps, class = ?class_index, "computing Integrated Gradients");

        let input = self.preprocess(model, image);
        let attr = integrated_gradients::<B, M>(model, input, class_index, config, &self.cancel)?;

        let values = self.resample_map(attr.magnitude_map().normalize().values, image)?;
        Ok(PixelBuffer::from_map(
            &values,
            image.width(),
            image.height(),
            ColorMap::Thermal,
        )?)
    }

    /// Grayscale tiles of a convolutional layer's kernel weights.
    pub fn filter_tiles(
        &self,
        layer_name: &str,
        config: &FilterVisConfig,
    ) -> Result<Vec<VisualizationTile>> {
        let model = self.model()?;
        let maps = visualize_filters(model, layer_name, config)?;

        maps.into_iter()
            .map(|m| {
                let image = PixelBuffer::from_map(&m.values, m.width, m.height, ColorMap::Gray)?;
                Ok(VisualizationTile::new(image, m.label))
            })
            .collect()
    }

    /// Heatmap tiles of a layer's activations for an input image.
    pub fn activation_tiles(
        &self,
        image: &RgbImage,
        layer_name: &str,
        config: &ActivationVisConfig,
    ) -> Result<Vec<VisualizationTile>> {
        let model = self.model()?;
        let maps = visualize_activations(model, image, layer_name, config, &self.device)?;

        maps.into_iter()
            .map(|m| {
                let image =
                    PixelBuffer::from_map(&m.values, m.width, m.height, ColorMap::GreenRed)?;
                Ok(VisualizationTile::new(image, m.label))
            })
            .collect()
    }

    /// Synthesize one filter's preferred stimulus.
    pub fn synthesize_filter_image(
        &self,
        layer_name: &str,
        filter_index: usize,
        config: &SynthesisConfig,
    ) -> Result<PixelBuffer> {
        let model = self.model()?;
        tracing::debug!(layer = layer_name, filter = filter_index, "synthesizing filter");

        let result = synthesize_filter::<B, M>(
            model,
            layer_name,
            filter_index,
            config,
            &self.cancel,
            &self.device,
        )?;

        let [_, _, height, width] = result.image.dims();
        let values = read_f32(result.image)?;
        Ok(PixelBuffer::from_chw_rgb(&values, width, height)?)
    }

    /// Synthesize a layer's filters and compose them into a grid.
    pub fn synthesize_layer_grid(
        &self,
        layer_name: &str,
        config: &GridConfig,
    ) -> Result<PixelBuffer> {
        let model = self.model()?;
        tracing::debug!(layer = layer_name, n = config.num_filters, "synthesizing layer grid");

        let tiles =
            synthesize_layer_filters::<B, M>(model, layer_name, config, &self.cancel, &self.device)?;

        let mut buffers = Vec::with_capacity(tiles.len());
        for tile in tiles {
            let [_, _, height, width] = tile.dims();
            let values = read_f32(tile)?;
            buffers.push(PixelBuffer::from_chw_rgb(&values, width, height)?);
        }

        Ok(assemble_grid(
            &buffers,
            config.grid_width,
            config.tile_width,
            config.tile_height,
        )?)
    }

    fn model(&self) -> std::result::Result<&M, ExplainError> {
        self.model.as_deref().ok_or(ExplainError::ModelUnavailable)
    }

    /// Resize to model resolution and apply the family's input mapping.
    fn preprocess(&self, model: &M, image: &RgbImage) -> Tensor<B::InnerBackend, 4> {
        let raw = image.to_tensor::<B::InnerBackend>(&self.device);
        self.family
            .preprocess(resize_bilinear(raw, model.input_size()))
    }

    /// Upsample a normalized 2D map to the image's dimensions and read it
    /// back for pixel composition.
    fn resample_map(
        &self,
        values: Tensor<B::InnerBackend, 2>,
        image: &RgbImage,
    ) -> Result<Vec<f32>> {
        let [h, w] = values.dims();
        let resized = resize_bilinear(
            values.reshape([1, 1, h, w]),
            [image.height(), image.width()],
        );
        Ok(read_f32(resized)?)
    }
}
