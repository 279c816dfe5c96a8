//! Layer taxonomy and descriptor parsing.
//!
//! Layer descriptors arrive as a JSON array exported from the trained model,
//! one entry per layer with a `type` tag from a small closed vocabulary.
//! The tag is parsed once into a [`LayerKind`]; everything downstream
//! matches on the enum and never re-inspects the string.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Closed vocabulary of layer kinds.
///
/// The serialized form matches the descriptor `type` tags emitted by the
/// model-export tooling (`"conv2d"`, `"maxpooling2d"`, ...). Tags outside
/// the vocabulary deserialize to [`LayerKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    /// Standard 2D convolution.
    #[serde(rename = "conv2d")]
    Conv2d,
    /// Depthwise 2D convolution (one filter per input channel).
    #[serde(rename = "depthwiseconv2d")]
    DepthwiseConv2d,
    /// 2D max pooling.
    #[serde(rename = "maxpooling2d")]
    MaxPool2d,
    /// 2D average pooling.
    #[serde(rename = "averagepooling2d")]
    AvgPool2d,
    /// Flatten to a vector.
    #[serde(rename = "flatten")]
    Flatten,
    /// Fully connected layer.
    #[serde(rename = "dense")]
    Dense,
    /// Dropout.
    #[serde(rename = "dropout")]
    Dropout,
    /// Batch normalization.
    #[serde(rename = "batchnorm")]
    BatchNorm,
    /// Standalone activation layer.
    #[serde(rename = "activation")]
    Activation,
    /// Elementwise addition (residual connection).
    #[serde(rename = "add")]
    Add,
    /// Channel concatenation.
    #[serde(rename = "concat")]
    Concat,
    /// Input placeholder.
    #[serde(rename = "inputlayer")]
    Input,
    /// Anything outside the vocabulary.
    #[serde(rename = "unknown")]
    Unknown,
}

impl LayerKind {
    /// Parse a descriptor `type` tag.
    ///
    /// Matching is case-insensitive; unrecognized tags map to
    /// [`LayerKind::Unknown`] rather than failing.
    #[must_use]
    pub fn from_type_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "conv2d" => Self::Conv2d,
            "depthwiseconv2d" => Self::DepthwiseConv2d,
            "maxpooling2d" => Self::MaxPool2d,
            "averagepooling2d" => Self::AvgPool2d,
            "flatten" => Self::Flatten,
            "dense" => Self::Dense,
            "dropout" => Self::Dropout,
            "batchnorm" | "batchnormalization" => Self::BatchNorm,
            "activation" => Self::Activation,
            "add" => Self::Add,
            "concat" | "concatenate" => Self::Concat,
            "inputlayer" => Self::Input,
            _ => Self::Unknown,
        }
    }

    /// Whether this kind carries a convolutional kernel.
    #[must_use]
    pub const fn is_convolutional(&self) -> bool {
        matches!(self, Self::Conv2d | Self::DepthwiseConv2d)
    }
}

/// Metadata for a single model layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerInfo {
    /// Unique layer name.
    pub name: String,
    /// Layer kind tag.
    #[serde(rename = "type")]
    pub kind: LayerKind,
    /// Number of output filters (convolutional kinds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<usize>,
    /// Kernel size as `[height, width]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_size: Option<[usize; 2]>,
    /// Number of output units (dense kind).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<usize>,
    /// Activation function name, if the layer has one fused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<String>,
    /// Strides as `[height, width]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strides: Option<[usize; 2]>,
    /// Pooling window as `[height, width]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<[usize; 2]>,
    /// Dropout rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
}

impl LayerInfo {
    /// Create a new layer descriptor with just a name and kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            name: name.into(),
            kind,
            filters: None,
            kernel_size: None,
            units: None,
            activation: None,
            strides: None,
            pool_size: None,
            rate: None,
        }
    }

    /// Set the filter count.
    #[must_use]
    pub fn with_filters(mut self, filters: usize) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Set the kernel size.
    #[must_use]
    pub fn with_kernel_size(mut self, kernel_size: [usize; 2]) -> Self {
        self.kernel_size = Some(kernel_size);
        self
    }

    /// Set the unit count.
    #[must_use]
    pub fn with_units(mut self, units: usize) -> Self {
        self.units = Some(units);
        self
    }

    /// Set the activation name.
    #[must_use]
    pub fn with_activation(mut self, activation: impl Into<String>) -> Self {
        self.activation = Some(activation.into());
        self
    }

    /// Set the strides.
    #[must_use]
    pub fn with_strides(mut self, strides: [usize; 2]) -> Self {
        self.strides = Some(strides);
        self
    }

    /// Set the pooling window.
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: [usize; 2]) -> Self {
        self.pool_size = Some(pool_size);
        self
    }
}

/// Raw descriptor as exported by the model tooling, before the `type` tag
/// has been resolved to a [`LayerKind`].
#[derive(Debug, Deserialize)]
struct RawDescriptor {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    filters: Option<usize>,
    #[serde(default)]
    kernel_size: Option<[usize; 2]>,
    #[serde(default)]
    units: Option<usize>,
    #[serde(default)]
    activation: Option<String>,
    #[serde(default)]
    strides: Option<[usize; 2]>,
    #[serde(default)]
    pool_size: Option<[usize; 2]>,
    #[serde(default)]
    rate: Option<f64>,
}

impl From<RawDescriptor> for LayerInfo {
    fn from(raw: RawDescriptor) -> Self {
        Self {
            name: raw.name,
            kind: LayerKind::from_type_tag(&raw.kind),
            filters: raw.filters,
            kernel_size: raw.kernel_size,
            units: raw.units,
            activation: raw.activation,
            strides: raw.strides,
            pool_size: raw.pool_size,
            rate: raw.rate,
        }
    }
}

/// Parse a JSON array of layer descriptors.
///
/// The `type` tag of each entry is resolved to a [`LayerKind`] here, once;
/// downstream code only ever sees the enum.
///
/// # Arguments
///
/// * `json` - JSON text containing an array of descriptor objects
///
/// # Errors
///
/// Returns [`CoreError::SerializationError`] when the text is not a valid
/// descriptor array. Unknown `type` tags do not fail; they become
/// [`LayerKind::Unknown`].
pub fn parse_descriptors(json: &str) -> Result<Vec<LayerInfo>> {
    let raw: Vec<RawDescriptor> =
        serde_json::from_str(json).map_err(|e| CoreError::SerializationError(e.to_string()))?;
    Ok(raw.into_iter().map(LayerInfo::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_type_tag() {
        assert_eq!(LayerKind::from_type_tag("conv2d"), LayerKind::Conv2d);
        assert_eq!(
            LayerKind::from_type_tag("DepthwiseConv2D"),
            LayerKind::DepthwiseConv2d
        );
        assert_eq!(LayerKind::from_type_tag("maxpooling2d"), LayerKind::MaxPool2d);
        assert_eq!(LayerKind::from_type_tag("mystery"), LayerKind::Unknown);
    }

    #[test]
    fn test_kind_is_convolutional() {
        assert!(LayerKind::Conv2d.is_convolutional());
        assert!(LayerKind::DepthwiseConv2d.is_convolutional());
        assert!(!LayerKind::Dense.is_convolutional());
        assert!(!LayerKind::MaxPool2d.is_convolutional());
    }

    #[test]
    fn test_layer_info_builder() {
        let info = LayerInfo::new("conv_1", LayerKind::Conv2d)
            .with_filters(32)
            .with_kernel_size([3, 3])
            .with_strides([2, 2])
            .with_activation("relu6");

        assert_eq!(info.name, "conv_1");
        assert_eq!(info.filters, Some(32));
        assert_eq!(info.kernel_size, Some([3, 3]));
        assert_eq!(info.units, None);
    }

    #[test]
    fn test_parse_descriptors() {
        let json = r#"[
            {"name": "input_1", "type": "inputlayer"},
            {"name": "conv_1", "type": "conv2d", "filters": 16, "kernel_size": [3, 3], "strides": [2, 2]},
            {"name": "dw_1", "type": "depthwiseconv2d", "kernel_size": [3, 3]},
            {"name": "fc", "type": "dense", "units": 1000, "activation": "softmax"}
        ]"#;

        let layers = parse_descriptors(json).unwrap();
        assert_eq!(layers.len(), 4);
        assert_eq!(layers[0].kind, LayerKind::Input);
        assert_eq!(layers[1].kind, LayerKind::Conv2d);
        assert_eq!(layers[1].filters, Some(16));
        assert_eq!(layers[2].kind, LayerKind::DepthwiseConv2d);
        assert_eq!(layers[3].units, Some(1000));
    }

    #[test]
    fn test_parse_descriptors_unknown_tag() {
        let json = r#"[{"name": "exotic", "type": "wavelet2d"}]"#;
        let layers = parse_descriptors(json).unwrap();
        assert_eq!(layers[0].kind, LayerKind::Unknown);
    }

    #[test]
    fn test_descriptor_roundtrip() {
        let info = LayerInfo::new("pool_1", LayerKind::MaxPool2d).with_pool_size([2, 2]);
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"maxpooling2d\""));

        let back: LayerInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, LayerKind::MaxPool2d);
        assert_eq!(back.pool_size, Some([2, 2]));
    }
}
