//! Inference with family-specific preprocessing and ranked, labeled output.

use burn::prelude::*;
use burn::tensor::activation::softmax;
use serde::{Deserialize, Serialize};

use convlens_core::{read_f32, resize_bilinear, RgbImage, SpatialModel};

use crate::error::Result;

/// Model family tag driving input preprocessing.
///
/// Each family maps raw `[0, 255]` pixels through its own affine transform;
/// the dispatch is on this tag, assigned when the model is loaded, never on
/// the model's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelFamily {
    /// MobileNet-family: inputs scaled to `[-1, 1]` as `x / 127.5 - 1`.
    MobileNet,
    /// Inception-family: inputs scaled to `[-1, 1]` as `x * 2/255 - 1`.
    Inception,
    /// Anything else: inputs scaled to `[0, 1]`.
    #[default]
    Generic,
}

impl ModelFamily {
    /// The affine input mapping as `(scale, offset)`, applied to raw
    /// `[0, 255]` pixel values.
    #[must_use]
    pub fn input_mapping(&self) -> (f32, f32) {
        match self {
            Self::MobileNet => (1.0 / 127.5, -1.0),
            Self::Inception => (2.0 / 255.0, -1.0),
            Self::Generic => (1.0 / 255.0, 0.0),
        }
    }

    /// Apply the family's input mapping to a raw pixel tensor.
    pub fn preprocess<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let (scale, offset) = self.input_mapping();
        x.mul_scalar(scale).add_scalar(offset)
    }
}

/// Mapping from class index to human-readable label.
///
/// Missing labels never fail a prediction; they fall back to a
/// `"Class {index}"` placeholder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassLabels {
    names: Vec<String>,
}

impl ClassLabels {
    /// Create labels from an ordered list of names.
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// An empty label table; every lookup falls back to a placeholder.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Label for a class index, or a placeholder when unavailable.
    pub fn get(&self, index: usize) -> String {
        self.names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("Class {index}"))
    }

    /// Number of known labels.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One ranked prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Output index of the class.
    pub class_index: usize,
    /// Human-readable label.
    pub class_name: String,
    /// Softmax probability in `[0, 1]`.
    pub probability: f32,
}

/// Full prediction output: ranked top-K plus the raw probability vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionOutput {
    /// Top-K predictions, sorted descending by probability.
    pub top_predictions: Vec<Prediction>,
    /// Softmax probabilities for every class, in output order.
    pub raw_probabilities: Vec<f32>,
}

impl PredictionOutput {
    /// The highest-probability prediction.
    pub fn top_prediction(&self) -> Option<&Prediction> {
        self.top_predictions.first()
    }
}

/// Rank class probabilities descending, ties broken by ascending index.
pub fn rank(probabilities: &[f32], labels: &ClassLabels, top_k: usize) -> Vec<Prediction> {
    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| {
        probabilities[b]
            .partial_cmp(&probabilities[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    order
        .into_iter()
        .take(top_k)
        .map(|index| Prediction {
            class_index: index,
            class_name: labels.get(index),
            probability: probabilities[index],
        })
        .collect()
}

/// Run inference on an image and return ranked, labeled predictions.
///
/// The image is resized to the model's input resolution, mapped through the
/// family's affine preprocessing, and pushed through the model; logits are
/// converted to probabilities with softmax.
///
/// # Errors
///
/// [`crate::ExplainError::Core`] when the probability readback fails.
pub fn predict<B, M>(
    model: &M,
    image: &RgbImage,
    labels: &ClassLabels,
    family: ModelFamily,
    top_k: usize,
    device: &B::Device,
) -> Result<PredictionOutput>
where
    B: Backend,
    M: SpatialModel<B>,
{
    let input = resize_bilinear(image.to_tensor::<B>(device), model.input_size());
    let input = family.preprocess(input);

    let logits = model.forward(input);
    let probabilities = softmax(logits, 1);
    let raw = read_f32(probabilities)?;

    let top_predictions = rank(&raw, labels, top_k);
    Ok(PredictionOutput {
        top_predictions,
        raw_probabilities: raw,
    })
}
