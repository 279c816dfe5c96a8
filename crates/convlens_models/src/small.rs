//! Minimal convolutional network for tests and demos.
//!
//! Two convolution stages and a pooling stage, no normalization layers, so
//! forward passes are cheap and numerically predictable. Used throughout the
//! workspace tests as the synthetic model behind attribution and synthesis.

use burn::module::Ignored;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{
    AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig,
};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use convlens_core::{LayerInfo, LayerKind, SpatialModel};

/// Configuration for [`SmallCnn`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmallCnnConfig {
    /// Number of output classes.
    pub n_classes: usize,
    /// Input resolution (square).
    pub input_size: usize,
    /// Filters in the first conv stage.
    pub n_filters_1: usize,
    /// Filters in the second conv stage.
    pub n_filters_2: usize,
}

impl Default for SmallCnnConfig {
    fn default() -> Self {
        Self {
            n_classes: 10,
            input_size: 32,
            n_filters_1: 8,
            n_filters_2: 16,
        }
    }
}

impl SmallCnnConfig {
    /// Create a new config with the given class count.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            ..Default::default()
        }
    }

    /// Set the input resolution.
    #[must_use]
    pub fn with_input_size(mut self, input_size: usize) -> Self {
        self.input_size = input_size;
        self
    }

    /// Set the filter counts of both conv stages.
    #[must_use]
    pub fn with_filters(mut self, n_filters_1: usize, n_filters_2: usize) -> Self {
        self.n_filters_1 = n_filters_1;
        self.n_filters_2 = n_filters_2;
        self
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> SmallCnn<B> {
        SmallCnn::new(self.clone(), device)
    }
}

/// Minimal CNN: Conv -> ReLU -> MaxPool -> Conv -> ReLU -> GAP -> Linear.
///
/// Spatial stages: `conv1` (0), `pool1` (1), `conv2` (2).
#[derive(Module, Debug)]
pub struct SmallCnn<B: Backend> {
    /// First convolution.
    conv1: Conv2d<B>,
    /// Downsampling pool.
    pool1: MaxPool2d,
    /// Second convolution.
    conv2: Conv2d<B>,
    /// Global average pooling.
    gap: AdaptiveAvgPool2d,
    /// Final classifier.
    fc: Linear<B>,
    /// Layer descriptors.
    layers: Ignored<Vec<LayerInfo>>,
    /// Channel count per spatial stage.
    channels: Ignored<Vec<usize>>,
    /// Input resolution.
    input_size: Ignored<usize>,
    /// Output classes.
    n_classes: Ignored<usize>,
}

impl<B: Backend> SmallCnn<B> {
    /// Create a new model.
    pub fn new(config: SmallCnnConfig, device: &B::Device) -> Self {
        let conv1 = Conv2dConfig::new([3, config.n_filters_1], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let pool1 = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let conv2 = Conv2dConfig::new([config.n_filters_1, config.n_filters_2], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let gap = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc = LinearConfig::new(config.n_filters_2, config.n_classes).init(device);

        let layers = vec![
            LayerInfo::new("input_1", LayerKind::Input),
            LayerInfo::new("conv1", LayerKind::Conv2d)
                .with_filters(config.n_filters_1)
                .with_kernel_size([3, 3])
                .with_strides([1, 1])
                .with_activation("relu"),
            LayerInfo::new("pool1", LayerKind::MaxPool2d).with_pool_size([2, 2]),
            LayerInfo::new("conv2", LayerKind::Conv2d)
                .with_filters(config.n_filters_2)
                .with_kernel_size([3, 3])
                .with_strides([1, 1])
                .with_activation("relu"),
            LayerInfo::new("gap", LayerKind::AvgPool2d),
            LayerInfo::new("fc", LayerKind::Dense)
                .with_units(config.n_classes)
                .with_activation("softmax"),
        ];
        let channels = vec![
            config.n_filters_1,
            config.n_filters_1,
            config.n_filters_2,
        ];

        Self {
            conv1,
            pool1,
            conv2,
            gap,
            fc,
            layers: Ignored(layers),
            channels: Ignored(channels),
            input_size: Ignored(config.input_size),
            n_classes: Ignored(config.n_classes),
        }
    }

    fn stage_forward(&self, stage: usize, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match stage {
            0 => Relu::new().forward(self.conv1.forward(x)),
            1 => self.pool1.forward(x),
            _ => Relu::new().forward(self.conv2.forward(x)),
        }
    }

    fn head(&self, feat: Tensor<B, 4>) -> Tensor<B, 2> {
        let out = self.gap.forward(feat);
        let [batch, ch, _, _] = out.dims();
        self.fc.forward(out.reshape([batch, ch]))
    }
}

impl<B: Backend> SpatialModel<B> for SmallCnn<B> {
    fn input_size(&self) -> [usize; 2] {
        [*self.input_size, *self.input_size]
    }

    fn n_classes(&self) -> usize {
        *self.n_classes
    }

    fn layers(&self) -> &[LayerInfo] {
        &self.layers
    }

    fn stage(&self, name: &str) -> Option<usize> {
        match name {
            "conv1" => Some(0),
            "pool1" => Some(1),
            "conv2" => Some(2),
            _ => None,
        }
    }

    fn n_stages(&self) -> usize {
        3
    }

    fn stage_channels(&self, stage: usize) -> usize {
        self.channels[stage.min(self.channels.len() - 1)]
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let feat = self.forward_to(x, 2);
        self.head(feat)
    }

    fn forward_to(&self, x: Tensor<B, 4>, stage: usize) -> Tensor<B, 4> {
        let mut out = x;
        for s in 0..=stage.min(2) {
            out = self.stage_forward(s, out);
        }
        out
    }

    fn forward_from(&self, feat: Tensor<B, 4>, stage: usize) -> Tensor<B, 2> {
        let mut out = feat;
        for s in (stage + 1)..3 {
            out = self.stage_forward(s, out);
        }
        self.head(out)
    }

    fn kernel(&self, name: &str) -> Option<Tensor<B, 4>> {
        match name {
            "conv1" => Some(self.conv1.weight.val()),
            "conv2" => Some(self.conv2.weight.val()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use convlens_core::read_f32;

    type TestBackend = NdArray;

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = SmallCnnConfig::new(5).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &device);

        let logits = model.forward(x);
        assert_eq!(logits.dims(), [1, 5]);
    }

    #[test]
    fn test_forward_to_shapes() {
        let device = Default::default();
        let model = SmallCnnConfig::new(5).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &device);

        assert_eq!(model.forward_to(x.clone(), 0).dims(), [1, 8, 32, 32]);
        assert_eq!(model.forward_to(x.clone(), 1).dims(), [1, 8, 16, 16]);
        assert_eq!(model.forward_to(x, 2).dims(), [1, 16, 16, 16]);
    }

    #[test]
    fn test_split_forward_matches_full() {
        let device = Default::default();
        let model = SmallCnnConfig::new(4).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random(
            [1, 3, 32, 32],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let full = read_f32(model.forward(x.clone())).unwrap();
        for stage in 0..model.n_stages() {
            let feat = model.forward_to(x.clone(), stage);
            let split = read_f32(model.forward_from(feat, stage)).unwrap();
            for (a, b) in full.iter().zip(&split) {
                assert!((a - b).abs() < 1e-5, "stage {stage}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_stage_lookup() {
        let device = Default::default();
        let model = SmallCnnConfig::default().init::<TestBackend>(&device);

        assert_eq!(model.stage("conv1"), Some(0));
        assert_eq!(model.stage("conv2"), Some(2));
        assert_eq!(model.stage("fc"), None);
        assert_eq!(model.stage("nope"), None);
        assert!(model.layer("fc").is_some());
        assert!(model.layer("nope").is_none());
    }

    #[test]
    fn test_kernel_shapes() {
        let device = Default::default();
        let model = SmallCnnConfig::default().init::<TestBackend>(&device);

        assert_eq!(model.kernel("conv1").unwrap().dims(), [8, 3, 3, 3]);
        assert_eq!(model.kernel("conv2").unwrap().dims(), [16, 8, 3, 3]);
        assert!(model.kernel("pool1").is_none());
    }
}
