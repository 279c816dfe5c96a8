//! Compact MobileNetV2-style network.
//!
//! Based on "MobileNetV2: Inverted Residuals and Linear Bottlenecks" by
//! Sandler et al. (2018), scaled down to four inverted residual blocks.
//!
//! The architecture keeps the parts that matter for visualization: a strided
//! stem, depthwise separable blocks with linear bottlenecks and residual
//! connections, a 1x1 head convolution, then global average pooling and a
//! classifier. Every spatial stage is addressable for truncated forward
//! passes.

use burn::module::Ignored;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use convlens_core::{LayerInfo, LayerKind, SpatialModel};

/// ReLU capped at 6, the MobileNet activation.
fn relu6<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    x.clamp(0.0, 6.0)
}

/// Configuration for [`MobileNetV2Small`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobileNetV2SmallConfig {
    /// Number of output classes.
    pub n_classes: usize,
    /// Input resolution (square, must be divisible by 8).
    pub input_size: usize,
    /// Expansion factor inside inverted residual blocks.
    pub expansion: usize,
}

impl Default for MobileNetV2SmallConfig {
    fn default() -> Self {
        Self {
            n_classes: 1000,
            input_size: 224,
            expansion: 6,
        }
    }
}

impl MobileNetV2SmallConfig {
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

    /// Set the expansion factor.
    #[must_use]
    pub fn with_expansion(mut self, expansion: usize) -> Self {
        self.expansion = expansion;
        self
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> MobileNetV2Small<B> {
        MobileNetV2Small::new(self.clone(), device)
    }
}

/// Convolution followed by batch normalization and ReLU6.
#[derive(Module, Debug)]
struct ConvBnBlock<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBnBlock<B> {
    fn new(
        in_channels: usize,
        out_channels: usize,
        kernel: [usize; 2],
        stride: usize,
        padding: usize,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], kernel)
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_bias(false)
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);

        Self { conv, bn }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu6(self.bn.forward(self.conv.forward(x)))
    }
}

/// Inverted residual block: expand (1x1) -> depthwise (3x3) -> project (1x1).
///
/// The projection is linear; a residual connection is added when the block
/// keeps both resolution and channel count.
#[derive(Module, Debug)]
struct InvertedResidual<B: Backend> {
    expand: Conv2d<B>,
    expand_bn: BatchNorm<B, 2>,
    depthwise: Conv2d<B>,
    depthwise_bn: BatchNorm<B, 2>,
    project: Conv2d<B>,
    project_bn: BatchNorm<B, 2>,
    residual: Ignored<bool>,
}

impl<B: Backend> InvertedResidual<B> {
    fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        expansion: usize,
        device: &B::Device,
    ) -> Self {
        let hidden = in_channels * expansion;

        let expand = Conv2dConfig::new([in_channels, hidden], [1, 1])
            .with_bias(false)
            .init(device);
        let expand_bn = BatchNormConfig::new(hidden).init(device);

        let depthwise = Conv2dConfig::new([hidden, hidden], [3, 3])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_groups(hidden)
            .with_bias(false)
            .init(device);
        let depthwise_bn = BatchNormConfig::new(hidden).init(device);

        let project = Conv2dConfig::new([hidden, out_channels], [1, 1])
            .with_bias(false)
            .init(device);
        let project_bn = BatchNormConfig::new(out_channels).init(device);

        Self {
            expand,
            expand_bn,
            depthwise,
            depthwise_bn,
            project,
            project_bn,
            residual: Ignored(stride == 1 && in_channels == out_channels),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let shortcut = if *self.residual { Some(x.clone()) } else { None };

        let out = relu6(self.expand_bn.forward(self.expand.forward(x)));
        let out = relu6(self.depthwise_bn.forward(self.depthwise.forward(out)));
        let out = self.project_bn.forward(self.project.forward(out));

        match shortcut {
            Some(identity) => out + identity,
            None => out,
        }
    }

    fn depthwise_kernel(&self) -> Tensor<B, 4> {
        self.depthwise.weight.val()
    }
}

/// Compact MobileNetV2-style classifier.
///
/// Spatial stages:
///
/// | stage | name        | output channels | resolution |
/// |-------|-------------|-----------------|------------|
/// | 0     | `stem_conv` | 16              | in / 2     |
/// | 1     | `block1`    | 24              | in / 4     |
/// | 2     | `block2`    | 24              | in / 4     |
/// | 3     | `block3`    | 32              | in / 8     |
/// | 4     | `block4`    | 32              | in / 8     |
/// | 5     | `head_conv` | 128             | in / 8     |
#[derive(Module, Debug)]
pub struct MobileNetV2Small<B: Backend> {
    stem: ConvBnBlock<B>,
    block1: InvertedResidual<B>,
    block2: InvertedResidual<B>,
    block3: InvertedResidual<B>,
    block4: InvertedResidual<B>,
    head: ConvBnBlock<B>,
    gap: AdaptiveAvgPool2d,
    fc: Linear<B>,
    layers: Ignored<Vec<LayerInfo>>,
    channels: Ignored<Vec<usize>>,
    input_size: Ignored<usize>,
    n_classes: Ignored<usize>,
}

impl<B: Backend> MobileNetV2Small<B> {
    /// Create a new model.
    pub fn new(config: MobileNetV2SmallConfig, device: &B::Device) -> Self {
        let t = config.expansion;

        let stem = ConvBnBlock::new(3, 16, [3, 3], 2, 1, device);
        let block1 = InvertedResidual::new(16, 24, 2, t, device);
        let block2 = InvertedResidual::new(24, 24, 1, t, device);
        let block3 = InvertedResidual::new(24, 32, 2, t, device);
        let block4 = InvertedResidual::new(32, 32, 1, t, device);
        let head = ConvBnBlock::new(32, 128, [1, 1], 1, 0, device);
        let gap = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc = LinearConfig::new(128, config.n_classes).init(device);

        let layers = vec![
            LayerInfo::new("input_1", LayerKind::Input),
            LayerInfo::new("stem_conv", LayerKind::Conv2d)
                .with_filters(16)
                .with_kernel_size([3, 3])
                .with_strides([2, 2])
                .with_activation("relu6"),
            LayerInfo::new("block1", LayerKind::DepthwiseConv2d)
                .with_filters(24)
                .with_kernel_size([3, 3])
                .with_strides([2, 2]),
            LayerInfo::new("block2", LayerKind::DepthwiseConv2d)
                .with_filters(24)
                .with_kernel_size([3, 3])
                .with_strides([1, 1]),
            LayerInfo::new("block3", LayerKind::DepthwiseConv2d)
                .with_filters(32)
                .with_kernel_size([3, 3])
                .with_strides([2, 2]),
            LayerInfo::new("block4", LayerKind::DepthwiseConv2d)
                .with_filters(32)
                .with_kernel_size([3, 3])
                .with_strides([1, 1]),
            LayerInfo::new("head_conv", LayerKind::Conv2d)
                .with_filters(128)
                .with_kernel_size([1, 1])
                .with_strides([1, 1])
                .with_activation("relu6"),
            LayerInfo::new("gap", LayerKind::AvgPool2d),
            LayerInfo::new("fc", LayerKind::Dense)
                .with_units(config.n_classes)
                .with_activation("softmax"),
        ];
        let channels = vec![16, 24, 24, 32, 32, 128];

        Self {
            stem,
            block1,
            block2,
            block3,
            block4,
            head,
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
            0 => self.stem.forward(x),
            1 => self.block1.forward(x),
            2 => self.block2.forward(x),
            3 => self.block3.forward(x),
            4 => self.block4.forward(x),
            _ => self.head.forward(x),
        }
    }

    fn classify(&self, feat: Tensor<B, 4>) -> Tensor<B, 2> {
        let out = self.gap.forward(feat);
        let [batch, ch, _, _] = out.dims();
        self.fc.forward(out.reshape([batch, ch]))
    }
}

impl<B: Backend> SpatialModel<B> for MobileNetV2Small<B> {
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
            "stem_conv" => Some(0),
            "block1" => Some(1),
            "block2" => Some(2),
            "block3" => Some(3),
            "block4" => Some(4),
            "head_conv" => Some(5),
            _ => None,
        }
    }

    fn n_stages(&self) -> usize {
        6
    }

    fn stage_channels(&self, stage: usize) -> usize {
        self.channels[stage.min(self.channels.len() - 1)]
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let feat = self.forward_to(x, 5);
        self.classify(feat)
    }

    fn forward_to(&self, x: Tensor<B, 4>, stage: usize) -> Tensor<B, 4> {
        let mut out = x;
        for s in 0..=stage.min(5) {
            out = self.stage_forward(s, out);
        }
        out
    }

    fn forward_from(&self, feat: Tensor<B, 4>, stage: usize) -> Tensor<B, 2> {
        let mut out = feat;
        for s in (stage + 1)..6 {
            out = self.stage_forward(s, out);
        }
        self.classify(out)
    }

    fn kernel(&self, name: &str) -> Option<Tensor<B, 4>> {
        match name {
            "stem_conv" => Some(self.stem.conv.weight.val()),
            "block1" => Some(self.block1.depthwise_kernel()),
            "block2" => Some(self.block2.depthwise_kernel()),
            "block3" => Some(self.block3.depthwise_kernel()),
            "block4" => Some(self.block4.depthwise_kernel()),
            "head_conv" => Some(self.head.conv.weight.val()),
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

    fn tiny() -> (MobileNetV2Small<TestBackend>, <TestBackend as Backend>::Device) {
        let device = Default::default();
        let model = MobileNetV2SmallConfig::new(7)
            .with_input_size(64)
            .init::<TestBackend>(&device);
        (model, device)
    }

    #[test]
    fn test_forward_shape() {
        let (model, device) = tiny();
        let x = Tensor::<TestBackend, 4>::ones([1, 3, 64, 64], &device);
        assert_eq!(model.forward(x).dims(), [1, 7]);
    }

    #[test]
    fn test_stage_shapes() {
        let (model, device) = tiny();
        let x = Tensor::<TestBackend, 4>::ones([1, 3, 64, 64], &device);

        assert_eq!(model.forward_to(x.clone(), 0).dims(), [1, 16, 32, 32]);
        assert_eq!(model.forward_to(x.clone(), 1).dims(), [1, 24, 16, 16]);
        assert_eq!(model.forward_to(x.clone(), 4).dims(), [1, 32, 8, 8]);
        assert_eq!(model.forward_to(x, 5).dims(), [1, 128, 8, 8]);
    }

    #[test]
    fn test_split_forward_matches_full() {
        let (model, device) = tiny();
        let x = Tensor::<TestBackend, 4>::random(
            [1, 3, 64, 64],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let full = read_f32(model.forward(x.clone())).unwrap();
        for stage in [0, 2, 5] {
            let feat = model.forward_to(x.clone(), stage);
            let split = read_f32(model.forward_from(feat, stage)).unwrap();
            for (a, b) in full.iter().zip(&split) {
                assert!((a - b).abs() < 1e-4, "stage {stage}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_kernel_layouts() {
        let (model, _) = tiny();

        // Stem is a full conv, blocks expose their depthwise kernels.
        assert_eq!(model.kernel("stem_conv").unwrap().dims(), [16, 3, 3, 3]);
        assert_eq!(model.kernel("block1").unwrap().dims(), [96, 1, 3, 3]);
        assert!(model.kernel("gap").is_none());
    }

    #[test]
    fn test_descriptor_export() {
        let (model, _) = tiny();
        let json = serde_json::to_string(model.layers()).unwrap();

        assert!(json.contains("\"depthwiseconv2d\""));
        assert!(json.contains("\"stem_conv\""));

        let back = convlens_core::parse_descriptors(&json).unwrap();
        assert_eq!(back.len(), model.layers().len());
        assert_eq!(back[2].kind, LayerKind::DepthwiseConv2d);
    }
}
