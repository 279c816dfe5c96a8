//! Activation-maximization feature synthesis.
//!
//! Gradient ascent on a randomly initialized input to find the stimulus
//! that maximally excites one filter, with an L2 penalty keeping pixel
//! magnitudes coherent. Reference: Erhan et al., "Visualizing Higher-Layer
//! Features of a Deep Network" (2009), as popularized by the Keras
//! "how convnets see the world" recipe.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use rand::Rng;
use serde::{Deserialize, Serialize};

use convlens_core::{normalize_unit, resize_bilinear, CancelToken, Seed, SpatialModel, EPS};

use crate::error::{ExplainError, Result};
use crate::resolve_spatial_stage;

/// Configuration for a single filter synthesis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Number of gradient-ascent iterations.
    pub iterations: usize,
    /// Step size applied to the RMS-normalized gradient.
    pub learning_rate: f64,
    /// Weight of the L2 pixel-magnitude penalty.
    pub regularization: f64,
    /// Output width; the optimized image is resized here if it differs
    /// from the model's native input width.
    pub width: usize,
    /// Output height.
    pub height: usize,
    /// Seed for the initial noise image.
    pub seed: Seed,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            iterations: 150,
            learning_rate: 0.1,
            regularization: 1e-3,
            width: 224,
            height: 224,
            seed: Seed::new(0),
        }
    }
}

impl SynthesisConfig {
    /// Set the iteration count.
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the learning rate.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the output dimensions.
    #[must_use]
    pub fn with_output_size(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the noise seed.
    #[must_use]
    pub fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = seed;
        self
    }
}

/// Configuration for a whole-layer synthesis grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of filters to synthesize, capped at the layer's channels.
    pub num_filters: usize,
    /// Tiles per grid row.
    pub grid_width: usize,
    /// Width of each tile.
    pub tile_width: usize,
    /// Height of each tile.
    pub tile_height: usize,
    /// Per-filter synthesis settings; the seed is re-derived per filter.
    pub synthesis: SynthesisConfig,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            num_filters: 16,
            grid_width: 4,
            tile_width: 64,
            tile_height: 64,
            synthesis: SynthesisConfig::default(),
        }
    }
}

/// Result of one synthesis run.
#[derive(Debug, Clone)]
pub struct SynthesisResult<B: Backend> {
    /// The preferred stimulus, shape `(1, 3, height, width)`, values in
    /// `[0, 1]`.
    pub image: Tensor<B, 4>,
    /// Best objective value observed across the run.
    pub objective: f32,
    /// Objective value of the initial noise image.
    pub initial_objective: f32,
}

/// Synthesize the preferred stimulus of one filter by gradient ascent.
///
/// The objective is the filter's mean activation minus an L2 penalty on
/// pixel magnitudes. Each iteration RMS-normalizes the gradient for a
/// scale-invariant step, and the best-objective iterate is tracked across
/// the run; ascent on a non-convex objective can overshoot, so the last
/// iterate is not necessarily the returned one. With zero iterations the
/// normalized initial noise is returned.
///
/// # Errors
///
/// [`ExplainError::FilterIndexOutOfRange`] when `filter_index` exceeds the
/// stage's channel count, [`ExplainError::Cancelled`] when the token fires
/// between iterations, plus the usual layer-resolution failures.
pub fn synthesize_filter<B, M>(
    model: &M,
    layer_name: &str,
    filter_index: usize,
    config: &SynthesisConfig,
    cancel: &CancelToken,
    device: &B::Device,
) -> Result<SynthesisResult<B::InnerBackend>>
where
    B: AutodiffBackend,
    M: SpatialModel<B>,
{
    let stage = resolve_spatial_stage::<B, M>(model, layer_name)?;

    let channels = model.stage_channels(stage);
    if filter_index >= channels {
        return Err(ExplainError::FilterIndexOutOfRange {
            index: filter_index,
            channels,
        });
    }

    let [height, width] = model.input_size();
    let mut current = noise_image::<B::InnerBackend>(config.seed, height, width, device);

    let initial_objective =
        eval_objective::<B, M>(model, &current, stage, filter_index, config.regularization);
    let mut best_value = initial_objective;
    let mut best = current.clone();

    for step in 0..config.iterations {
        if cancel.is_cancelled() {
            return Err(ExplainError::Cancelled);
        }

        let x = Tensor::<B, 4>::from_inner(current.clone()).require_grad();
        let feat = model.forward_to(x.clone(), stage);
        let response = feat.narrow(1, filter_index, 1).mean();
        let penalty = x
            .clone()
            .powf_scalar(2.0)
            .mean()
            .mul_scalar(config.regularization);
        let objective = response - penalty;

        let value: f32 = objective.clone().into_scalar().elem();
        if value > best_value {
            best_value = value;
            best = current.clone();
        }

        let grads = objective.backward();
        let grad = x
            .grad(&grads)
            .ok_or(ExplainError::GradientUnavailable("synthesis input"))?;

        // RMS-normalize for a scale-invariant step size.
        let rms: f32 = grad
            .clone()
            .powf_scalar(2.0)
            .mean()
            .into_scalar()
            .elem::<f32>()
            .sqrt();
        let ascent = grad.div_scalar(rms + EPS).mul_scalar(config.learning_rate);
        current = current + ascent;

        tracing::trace!(step, value, best = best_value, "synthesis step");
    }

    let image = resize_bilinear(best, [config.height, config.width]);
    Ok(SynthesisResult {
        image: normalize_unit(image),
        objective: best_value,
        initial_objective,
    })
}

/// Synthesize tiles for the first `num_filters` filters of a layer.
///
/// Each filter is optimized independently with a seed derived from its
/// index. A failing filter is replaced by an all-zero tile so the batch
/// always completes; cancellation, by contrast, aborts the whole batch.
/// Tiles are returned in filter order, ready for row-major grid assembly.
///
/// # Errors
///
/// Layer-resolution failures and [`ExplainError::Cancelled`].
pub fn synthesize_layer_filters<B, M>(
    model: &M,
    layer_name: &str,
    config: &GridConfig,
    cancel: &CancelToken,
    device: &B::Device,
) -> Result<Vec<Tensor<B::InnerBackend, 4>>>
where
    B: AutodiffBackend,
    M: SpatialModel<B>,
{
    let stage = resolve_spatial_stage::<B, M>(model, layer_name)?;
    let count = config.num_filters.min(model.stage_channels(stage));
    let mut tiles = Vec::with_capacity(count);

    for filter in 0..count {
        let per_filter = SynthesisConfig {
            width: config.tile_width,
            height: config.tile_height,
            seed: config.synthesis.seed.derive(&format!("filter-{filter}")),
            ..config.synthesis.clone()
        };

        match synthesize_filter(model, layer_name, filter, &per_filter, cancel, device) {
            Ok(result) => tiles.push(result.image),
            Err(ExplainError::Cancelled) => return Err(ExplainError::Cancelled),
            Err(e) => {
                tracing::warn!(layer = layer_name, filter, error = %e, "substituting blank tile");
                tiles.push(Tensor::zeros(
                    [1, 3, config.tile_height, config.tile_width],
                    device,
                ));
            }
        }
    }

    Ok(tiles)
}

/// Uniform noise in `[-0.1, 0.1]`, deterministic for a given seed.
fn noise_image<B: Backend>(
    seed: Seed,
    height: usize,
    width: usize,
    device: &B::Device,
) -> Tensor<B, 4> {
    let mut rng = seed.to_rng();
    let values: Vec<f32> = (0..3 * height * width)
        .map(|_| rng.gen_range(-0.1..0.1))
        .collect();
    Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([1, 3, height, width])
}

/// Objective value at an input, without gradient tracking.
fn eval_objective<B, M>(
    model: &M,
    input: &Tensor<B::InnerBackend, 4>,
    stage: usize,
    filter_index: usize,
    regularization: f64,
) -> f32
where
    B: AutodiffBackend,
    M: SpatialModel<B>,
{
    let x = Tensor::<B, 4>::from_inner(input.clone());
    let feat = model.forward_to(x.clone(), stage);
    let response = feat.narrow(1, filter_index, 1).mean();
    let penalty = x.powf_scalar(2.0).mean().mul_scalar(regularization);
    (response - penalty).into_scalar().elem()
}
