//! Attribution map computation: GradCAM and Integrated Gradients.
//!
//! GradCAM reference: Selvaraju et al., "Grad-CAM: Visual Explanations from
//! Deep Networks via Gradient-based Localization", ICCV 2017.
//!
//! Integrated Gradients reference: Sundararajan et al., "Axiomatic
//! Attribution for Deep Networks", ICML 2017.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use convlens_core::{normalize_unit, CancelToken, SpatialModel};

use crate::error::{ExplainError, Result};
use crate::resolve_spatial_stage;

/// Method for computing attribution maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributionMethod {
    /// Gradient-weighted Class Activation Mapping.
    GradCam,
    /// Integrated Gradients.
    IntegratedGradients,
}

/// A 2D attribution map aligned with a spatial grid.
///
/// Values are not pre-normalized; call [`AttributionMap::normalize`] before
/// colorization.
#[derive(Debug, Clone)]
pub struct AttributionMap<B: Backend> {
    /// The attribution values, shape `(H, W)`.
    pub values: Tensor<B, 2>,
    /// The method that produced the map.
    pub method: AttributionMethod,
    /// Target class the map explains.
    pub target_class: Option<usize>,
}

impl<B: Backend> AttributionMap<B> {
    /// Create a new attribution map.
    pub fn new(values: Tensor<B, 2>, method: AttributionMethod) -> Self {
        Self {
            values,
            method,
            target_class: None,
        }
    }

    /// Set the target class.
    #[must_use]
    pub fn with_target_class(mut self, class: usize) -> Self {
        self.target_class = Some(class);
        self
    }

    /// Get the shape of the attribution map.
    pub fn shape(&self) -> [usize; 2] {
        self.values.dims()
    }

    /// Normalize the attribution values to `[0, 1]`.
    ///
    /// Uses `(x - min) / (max - min + ε)`; a constant map normalizes to all
    /// zeros instead of dividing by zero.
    #[must_use]
    pub fn normalize(&self) -> Self {
        Self {
            values: normalize_unit(self.values.clone()),
            method: self.method,
            target_class: self.target_class,
        }
    }
}

/// Combine a layer activation with its gradients into a GradCAM map.
///
/// This is the pure combination step, usable with captured tensors; the
/// model-driven entry point is [`grad_cam_heatmap`].
///
/// # Arguments
///
/// * `activation` - Layer activation of shape (1, C, H, W)
/// * `gradients` - Gradients of the class score w.r.t. the activation,
///   same shape
///
/// # Returns
///
/// Un-normalized, non-negative attribution map of shape (H, W).
pub fn grad_cam<B: Backend>(
    activation: Tensor<B, 4>,
    gradients: Tensor<B, 4>,
) -> AttributionMap<B> {
    // Global average pool the gradients: (1, C, H, W) -> (1, C, 1, 1)
    let weights = gradients.mean_dim(3).mean_dim(2);

    // Weight the activation channels and sum them: -> (1, 1, H, W)
    let cam = (activation * weights).sum_dim(1);

    // ReLU: negative evidence is discarded by design of the algorithm.
    let cam = cam.clamp_min(0.0);

    let [_, _, h, w] = cam.dims();
    AttributionMap::new(cam.reshape([h, w]), AttributionMethod::GradCam)
}

/// Compute a GradCAM heatmap for a model, input and target layer.
///
/// The activation and its gradients come from one gradient-tracked pass:
/// the forward pass is truncated at the layer, re-entered from the detached
/// activation, and differentiated back to it. When `class_index` is `None`
/// the arg-max class of that same pass is explained, so the predicted and
/// explained class can never disagree.
///
/// # Arguments
///
/// * `model` - The model under inspection
/// * `image` - Preprocessed input of shape (1, 3, H, W)
/// * `layer_name` - Name of the target spatial layer
/// * `class_index` - Class to explain; defaults to the predicted class
///
/// # Errors
///
/// [`ExplainError::LayerNotFound`] for unknown names,
/// [`ExplainError::UnsupportedLayerKind`] for non-spatial layers,
/// [`ExplainError::ClassIndexOutOfRange`] for a bad explicit class.
pub fn grad_cam_heatmap<B, M>(
    model: &M,
    image: Tensor<B::InnerBackend, 4>,
    layer_name: &str,
    class_index: Option<usize>,
) -> Result<AttributionMap<B::InnerBackend>>
where
    B: AutodiffBackend,
    M: SpatialModel<B>,
{
    let stage = resolve_spatial_stage::<B, M>(model, layer_name)?;

    let x = Tensor::<B, 4>::from_inner(image);
    let feat = model.forward_to(x, stage).detach().require_grad();
    let logits = model.forward_from(feat.clone(), stage);

    let class = match class_index {
        Some(c) if c < model.n_classes() => c,
        Some(c) => {
            return Err(ExplainError::ClassIndexOutOfRange {
                index: c,
                classes: model.n_classes(),
            })
        }
        None => argmax_class(&logits),
    };

    let score = logits.narrow(1, class, 1).sum();
    let grads = score.backward();
    let grad = feat
        .grad(&grads)
        .ok_or(ExplainError::GradientUnavailable("layer activation"))?;

    Ok(grad_cam(feat.inner(), grad).with_target_class(class))
}

/// Configuration for Integrated Gradients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegratedGradientsConfig {
    /// Number of steps for the Riemann approximation of the path integral.
    /// Cost grows linearly with the step count; 50 is the standard
    /// accuracy/cost compromise from the source paper.
    pub steps: usize,
}

impl Default for IntegratedGradientsConfig {
    fn default() -> Self {
        Self { steps: 50 }
    }
}

/// Signed, full-resolution Integrated Gradients attribution.
#[derive(Debug, Clone)]
pub struct InputAttribution<B: Backend> {
    /// Attribution values, same shape as the input, sign retained.
    pub values: Tensor<B, 4>,
    /// The class that was explained.
    pub target_class: usize,
}

impl<B: Backend> InputAttribution<B> {
    /// Collapse to a 2D importance map by summing absolute values across
    /// the channel axis. Sign information is discarded for display.
    pub fn magnitude_map(&self) -> AttributionMap<B> {
        let summed = self.values.clone().abs().sum_dim(1);
        let [_, _, h, w] = summed.dims();
        AttributionMap::new(summed.reshape([h, w]), AttributionMethod::IntegratedGradients)
            .with_target_class(self.target_class)
    }

    /// Sum of all signed attributions. By the completeness axiom this
    /// approximates `f(input) - f(baseline)`.
    pub fn total(&self) -> f32 {
        self.values.clone().sum().into_scalar().elem()
    }
}

/// Integrated Gradients over an explicit gradient function.
///
/// Samples `steps + 1` points along the straight-line path from `baseline`
/// to `input` (`alpha = i / steps`; a step count of zero degenerates to the
/// single sample at the input itself), averages the gradients, and scales by
/// `(input - baseline)`.
///
/// # Arguments
///
/// * `input` - Model input of shape (1, C, H, W)
/// * `baseline` - Path start of the same shape, typically zeros
/// * `grad_fn` - Returns the gradient of the class score at a path point
/// * `steps` - Number of interpolation steps
/// * `cancel` - Checked between steps
///
/// # Errors
///
/// [`ExplainError::Cancelled`] when the token fires; `grad_fn` failures
/// propagate.
pub fn integrated_gradients_with<B, F>(
    input: &Tensor<B, 4>,
    baseline: &Tensor<B, 4>,
    grad_fn: F,
    steps: usize,
    cancel: &CancelToken,
) -> Result<Tensor<B, 4>>
where
    B: Backend,
    F: Fn(&Tensor<B, 4>) -> Result<Tensor<B, 4>>,
{
    let diff = input.clone() - baseline.clone();
    let mut integral = input.zeros_like();

    for step in 0..=steps {
        if cancel.is_cancelled() {
            return Err(ExplainError::Cancelled);
        }

        let alpha = if steps == 0 {
            1.0
        } else {
            step as f64 / steps as f64
        };
        let point = baseline.clone() + diff.clone().mul_scalar(alpha);
        integral = integral + grad_fn(&point)?;
    }

    let averaged = integral.div_scalar((steps + 1) as f32);
    Ok(diff * averaged)
}

/// Compute Integrated Gradients attribution for a model input.
///
/// The baseline is the all-zero tensor of the input's shape ("no
/// information"). When `class_index` is `None` the predicted class of the
/// unperturbed input is explained.
///
/// # Errors
///
/// [`ExplainError::ClassIndexOutOfRange`] for a bad explicit class,
/// [`ExplainError::Cancelled`] when the token fires mid-loop.
pub fn integrated_gradients<B, M>(
    model: &M,
    input: Tensor<B::InnerBackend, 4>,
    class_index: Option<usize>,
    config: &IntegratedGradientsConfig,
    cancel: &CancelToken,
) -> Result<InputAttribution<B::InnerBackend>>
where
    B: AutodiffBackend,
    M: SpatialModel<B>,
{
    let class = match class_index {
        Some(c) if c < model.n_classes() => c,
        Some(c) => {
            return Err(ExplainError::ClassIndexOutOfRange {
                index: c,
                classes: model.n_classes(),
            })
        }
        None => {
            let logits = model.forward(Tensor::<B, 4>::from_inner(input.clone()));
            argmax_class(&logits)
        }
    };

    let baseline = input.zeros_like();
    let values = integrated_gradients_with(
        &input,
        &baseline,
        |point| input_gradient_at::<B, M>(model, point.clone(), class),
        config.steps,
        cancel,
    )?;

    Ok(InputAttribution {
        values,
        target_class: class,
    })
}

/// Gradient of `logits[class]` w.r.t. the input at one path point.
fn input_gradient_at<B, M>(
    model: &M,
    point: Tensor<B::InnerBackend, 4>,
    class: usize,
) -> Result<Tensor<B::InnerBackend, 4>>
where
    B: AutodiffBackend,
    M: SpatialModel<B>,
{
    let x = Tensor::<B, 4>::from_inner(point).require_grad();
    let logits = model.forward(x.clone());
    let score = logits.narrow(1, class, 1).sum();
    let grads = score.backward();
    x.grad(&grads)
        .ok_or(ExplainError::GradientUnavailable("model input"))
}

fn argmax_class<B: Backend>(logits: &Tensor<B, 2>) -> usize {
    logits.clone().argmax(1).into_scalar().elem::<i64>() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;
    use convlens_core::read_f32;
    use convlens_models::SmallCnnConfig;

    type TestBackend = NdArray;
    type TestAutodiff = Autodiff<NdArray>;

    #[test]
    fn test_grad_cam_shape() {
        let device = Default::default();
        let activation = Tensor::<TestBackend, 4>::ones([1, 16, 8, 8], &device);
        let gradients = Tensor::<TestBackend, 4>::ones([1, 16, 8, 8], &device);

        let cam = grad_cam(activation, gradients);
        assert_eq!(cam.shape(), [8, 8]);
        assert_eq!(cam.method, AttributionMethod::GradCam);
    }

    #[test]
    fn test_grad_cam_discards_negative_evidence() {
        let device = Default::default();
        let activation = Tensor::<TestBackend, 4>::ones([1, 2, 4, 4], &device);
        // Channel 0 votes +1, channel 1 votes -3: the weighted sum is
        // negative everywhere and must be rectified to zero, not colored
        // as negative evidence.
        let gradients = Tensor::cat(
            vec![
                Tensor::<TestBackend, 4>::ones([1, 1, 4, 4], &device),
                Tensor::<TestBackend, 4>::ones([1, 1, 4, 4], &device).mul_scalar(-3.0),
            ],
            1,
        );

        let cam = grad_cam(activation, gradients);
        for v in read_f32(cam.values).unwrap() {
            assert!(v >= 0.0);
            assert!(v.abs() < 1e-6);
        }
    }

    #[test]
    fn test_attribution_map_normalize_bounds() {
        let device = Default::default();
        let values = Tensor::<TestBackend, 2>::from_floats([[-4.0, 0.0], [2.0, 8.0]], &device);
        let map = AttributionMap::new(values, AttributionMethod::GradCam);

        let normalized = map.normalize();
        for v in read_f32(normalized.values).unwrap() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_attribution_map_normalize_constant() {
        let device = Default::default();
        let values = Tensor::<TestBackend, 2>::full([4, 4], 2.5, &device);
        let map = AttributionMap::new(values, AttributionMethod::GradCam);

        for v in read_f32(map.normalize().values).unwrap() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_integrated_gradients_zero_steps_boundary() {
        // With steps = 0 the path collapses to the single sample at the
        // input: attribution == (input - baseline) * grad(input).
        let device = Default::default();
        let input = Tensor::<TestBackend, 1>::from_floats([0.5, 1.0, 1.5, 2.0], &device)
            .reshape([1, 1, 2, 2]);
        let baseline = input.zeros_like();
        let cancel = CancelToken::new();

        // grad(x) = x so the expected result is input * input.
        let attr = integrated_gradients_with(
            &input,
            &baseline,
            |point| Ok(point.clone()),
            0,
            &cancel,
        )
        .unwrap();

        let got = read_f32(attr).unwrap();
        let expected = [0.25, 1.0, 2.25, 4.0];
        for (g, e) in got.iter().zip(expected) {
            assert!((g - e).abs() < 1e-6, "{g} vs {e}");
        }
    }

    #[test]
    fn test_integrated_gradients_completeness_improves_with_steps() {
        // f(x) = sum(x^3), grad = 3x^2. The completeness discrepancy of the
        // Riemann mean shrinks as the step count grows.
        let device = Default::default();
        let input = Tensor::<TestBackend, 1>::from_floats([0.2, 0.4, 0.6, 0.8], &device)
            .reshape([1, 1, 2, 2]);
        let baseline = input.zeros_like();
        let cancel = CancelToken::new();

        let true_delta: f32 = read_f32(input.clone().powf_scalar(3.0).sum()).unwrap()[0];

        let discrepancy = |steps: usize| -> f32 {
            let attr = integrated_gradients_with(
                &input,
                &baseline,
                |point| Ok(point.clone().powf_scalar(2.0).mul_scalar(3.0)),
                steps,
                &cancel,
            )
            .unwrap();
            let total: f32 = read_f32(attr.sum()).unwrap()[0];
            (total - true_delta).abs()
        };

        let d1 = discrepancy(1);
        let d10 = discrepancy(10);
        let d100 = discrepancy(100);

        assert!(d1 > d10, "{d1} vs {d10}");
        assert!(d10 > d100, "{d10} vs {d100}");
    }

    #[test]
    fn test_integrated_gradients_cancellation() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device);
        let baseline = input.zeros_like();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = integrated_gradients_with(
            &input,
            &baseline,
            |point| Ok(point.clone()),
            10,
            &cancel,
        );
        assert!(matches!(result, Err(ExplainError::Cancelled)));
    }

    #[test]
    fn test_grad_cam_heatmap_on_model() {
        let device = Default::default();
        let model = SmallCnnConfig::new(4).init::<TestAutodiff>(&device);
        let image = Tensor::<TestBackend, 4>::random(
            [1, 3, 32, 32],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let map = grad_cam_heatmap(&model, image, "conv2", None).unwrap();
        assert_eq!(map.shape(), [16, 16]);
        assert!(map.target_class.is_some());
        for v in read_f32(map.values).unwrap() {
            assert!(v >= 0.0);
        }
    }

    #[test]
    fn test_grad_cam_heatmap_layer_errors() {
        let device = Default::default();
        let model = SmallCnnConfig::new(4).init::<TestAutodiff>(&device);
        let image = Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &device);

        let missing = grad_cam_heatmap(&model, image.clone(), "conv9", None);
        assert!(matches!(missing, Err(ExplainError::LayerNotFound(_))));

        let head = grad_cam_heatmap(&model, image.clone(), "fc", None);
        assert!(matches!(
            head,
            Err(ExplainError::UnsupportedLayerKind { .. })
        ));

        let bad_class = grad_cam_heatmap(&model, image, "conv2", Some(99));
        assert!(matches!(
            bad_class,
            Err(ExplainError::ClassIndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_integrated_gradients_on_model() {
        let device = Default::default();
        let model = SmallCnnConfig::new(3).init::<TestAutodiff>(&device);
        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 32, 32],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let config = IntegratedGradientsConfig { steps: 4 };
        let cancel = CancelToken::new();
        let attr = integrated_gradients(&model, input, None, &config, &cancel).unwrap();

        assert_eq!(attr.values.dims(), [1, 3, 32, 32]);
        assert!(attr.target_class < 3);
        assert!(attr.total().is_finite());
        assert_eq!(attr.magnitude_map().shape(), [32, 32]);
    }
}
