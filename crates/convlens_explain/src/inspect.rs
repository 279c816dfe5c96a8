//! Filter-weight and activation-map inspection.
//!
//! Both inspectors produce [`ChannelMap`]s: per-channel 2D maps normalized
//! to the unit range and resized to a display tile, read back to host
//! memory. Colorization is left to the presentation layer so the same map
//! can be rendered grayscale (weights) or as a heatmap (activations).

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use convlens_core::{normalize_unit, read_f32, resize_bilinear, RgbImage, SpatialModel};

use crate::error::{ExplainError, Result};
use crate::resolve_spatial_stage;

/// One channel's 2D map, normalized to `[0, 1]` and read back to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMap {
    /// Display label, e.g. `"conv2 / filter 3"`.
    pub label: String,
    /// Map width in pixels.
    pub width: usize,
    /// Map height in pixels.
    pub height: usize,
    /// Row-major values in `[0, 1]`.
    pub values: Vec<f32>,
}

/// Configuration for filter-weight visualization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterVisConfig {
    /// Maximum number of filters to extract.
    pub max_filters: usize,
    /// Output tile size (square).
    pub size: usize,
}

impl Default for FilterVisConfig {
    fn default() -> Self {
        Self {
            max_filters: 16,
            size: 64,
        }
    }
}

/// Configuration for activation-map visualization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationVisConfig {
    /// Maximum number of channels to extract.
    pub max_activations: usize,
    /// Output tile size (square).
    pub size: usize,
}

impl Default for ActivationVisConfig {
    fn default() -> Self {
        Self {
            max_activations: 16,
            size: 64,
        }
    }
}

/// Extract and normalize convolutional kernel weights as display maps.
///
/// Returns one map per output channel, capped at `max_filters`. Each map is
/// the kernel slice for that channel, averaged across input channels when
/// there are several, normalized per-filter and upsampled to `size × size`.
///
/// A layer of the wrong kind or without a kernel yields an empty result
/// with a warning rather than a hard failure; a failing individual filter
/// is skipped without aborting the batch.
///
/// # Errors
///
/// [`ExplainError::LayerNotFound`] when the name does not resolve.
pub fn visualize_filters<B, M>(
    model: &M,
    layer_name: &str,
    config: &FilterVisConfig,
) -> Result<Vec<ChannelMap>>
where
    B: Backend,
    M: SpatialModel<B>,
{
    let info = model
        .layer(layer_name)
        .ok_or_else(|| ExplainError::LayerNotFound(layer_name.to_string()))?;

    if !info.kind.is_convolutional() {
        tracing::warn!(
            layer = layer_name,
            kind = ?info.kind,
            "filter visualization requires a convolutional layer"
        );
        return Ok(Vec::new());
    }

    let Some(kernel) = model.kernel(layer_name) else {
        tracing::warn!(layer = layer_name, "layer has no kernel tensor");
        return Ok(Vec::new());
    };

    let [out_channels, in_channels, _, _] = kernel.dims();
    let count = out_channels.min(config.max_filters);
    let mut maps = Vec::with_capacity(count);

    for filter in 0..count {
        let slice = kernel.clone().narrow(0, filter, 1);
        let map = if in_channels > 1 {
            slice.mean_dim(1)
        } else {
            slice
        };
        let map = resize_bilinear(normalize_unit(map), [config.size, config.size]);

        match read_f32(map) {
            Ok(values) => maps.push(ChannelMap {
                label: format!("{layer_name} / filter {filter}"),
                width: config.size,
                height: config.size,
                values,
            }),
            Err(e) => {
                tracing::warn!(layer = layer_name, filter, error = %e, "skipping filter");
            }
        }
    }

    Ok(maps)
}

/// Run a truncated forward pass and extract per-channel activation maps.
///
/// The image is resized to the model's input resolution and scaled to
/// `[0, 1]`; the forward pass stops at the named layer and the first
/// `max_activations` channels are normalized and upsampled individually.
///
/// # Errors
///
/// [`ExplainError::LayerNotFound`] / [`ExplainError::UnsupportedLayerKind`]
/// when the layer cannot be resolved to a spatial stage.
pub fn visualize_activations<B, M>(
    model: &M,
    image: &RgbImage,
    layer_name: &str,
    config: &ActivationVisConfig,
    device: &B::Device,
) -> Result<Vec<ChannelMap>>
where
    B: Backend,
    M: SpatialModel<B>,
{
    let stage = resolve_spatial_stage::<B, M>(model, layer_name)?;

    let input = resize_bilinear(image.to_tensor::<B>(device), model.input_size());
    let input = input.div_scalar(255.0);
    let feat = model.forward_to(input, stage);

    let [_, channels, _, _] = feat.dims();
    let count = channels.min(config.max_activations);
    let mut maps = Vec::with_capacity(count);

    for channel in 0..count {
        let slice = feat.clone().narrow(1, channel, 1);
        let map = resize_bilinear(normalize_unit(slice), [config.size, config.size]);

        match read_f32(map) {
            Ok(values) => maps.push(ChannelMap {
                label: format!("{layer_name} / channel {channel}"),
                width: config.size,
                height: config.size,
                values,
            }),
            Err(e) => {
                tracing::warn!(layer = layer_name, channel, error = %e, "skipping channel");
            }
        }
    }

    Ok(maps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use convlens_models::SmallCnnConfig;

    type TestBackend = NdArray;

    fn test_image() -> RgbImage {
        let mut data = Vec::with_capacity(16 * 16 * 3);
        for i in 0..(16 * 16) {
            data.push((i % 256) as u8);
            data.push((i * 3 % 256) as u8);
            data.push((i * 7 % 256) as u8);
        }
        RgbImage::new(16, 16, data).unwrap()
    }

    #[test]
    fn test_visualize_filters_caps_at_channel_count() {
        let device = Default::default();
        let model = SmallCnnConfig::default().init::<TestBackend>(&device);

        // conv1 has 8 filters; asking for 16 returns exactly 8, not padded.
        let maps = visualize_filters(&model, "conv1", &FilterVisConfig::default()).unwrap();
        assert_eq!(maps.len(), 8);
        assert_eq!(maps[0].width, 64);
        assert_eq!(maps[0].values.len(), 64 * 64);
        assert_eq!(maps[3].label, "conv1 / filter 3");
    }

    #[test]
    fn test_visualize_filters_values_in_unit_range() {
        let device = Default::default();
        let model = SmallCnnConfig::default().init::<TestBackend>(&device);

        let maps = visualize_filters(
            &model,
            "conv2",
            &FilterVisConfig {
                max_filters: 4,
                size: 16,
            },
        )
        .unwrap();
        assert_eq!(maps.len(), 4);
        for map in &maps {
            for &v in &map.values {
                assert!((0.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn test_visualize_filters_wrong_kind_is_empty() {
        let device = Default::default();
        let model = SmallCnnConfig::default().init::<TestBackend>(&device);

        let maps = visualize_filters(&model, "fc", &FilterVisConfig::default()).unwrap();
        assert!(maps.is_empty());

        let maps = visualize_filters(&model, "pool1", &FilterVisConfig::default()).unwrap();
        assert!(maps.is_empty());
    }

    #[test]
    fn test_visualize_filters_missing_layer() {
        let device = Default::default();
        let model = SmallCnnConfig::default().init::<TestBackend>(&device);

        let result = visualize_filters(&model, "conv99", &FilterVisConfig::default());
        assert!(matches!(result, Err(ExplainError::LayerNotFound(_))));
    }

    #[test]
    fn test_visualize_activations_shapes() {
        let device = Default::default();
        let model = SmallCnnConfig::default().init::<TestBackend>(&device);
        let image = test_image();

        let maps = visualize_activations(
            &model,
            &image,
            "conv1",
            &ActivationVisConfig::default(),
            &device,
        )
        .unwrap();

        // conv1 has 8 channels, under the cap of 16.
        assert_eq!(maps.len(), 8);
        for map in &maps {
            assert_eq!(map.values.len(), 64 * 64);
            for &v in &map.values {
                assert!((0.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn test_visualize_activations_respects_cap() {
        let device = Default::default();
        let model = SmallCnnConfig::default().init::<TestBackend>(&device);
        let image = test_image();

        let maps = visualize_activations(
            &model,
            &image,
            "conv2",
            &ActivationVisConfig {
                max_activations: 5,
                size: 32,
            },
            &device,
        )
        .unwrap();
        assert_eq!(maps.len(), 5);
        assert_eq!(maps[0].values.len(), 32 * 32);
    }

    #[test]
    fn test_visualize_activations_head_layer_fails() {
        let device = Default::default();
        let model = SmallCnnConfig::default().init::<TestBackend>(&device);
        let image = test_image();

        let result = visualize_activations(
            &model,
            &image,
            "fc",
            &ActivationVisConfig::default(),
            &device,
        );
        assert!(matches!(
            result,
            Err(ExplainError::UnsupportedLayerKind { .. })
        ));
    }
}
