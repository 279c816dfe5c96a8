//! Tensor helpers shared across the workspace.

use burn::prelude::*;
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};

use crate::error::{CoreError, Result};

/// Guard against division by zero in normalization paths.
pub const EPS: f32 = 1e-5;

/// Normalize a tensor to the unit range.
///
/// Computes `(x - min) / (max - min + EPS)`. A constant tensor maps to all
/// zeros rather than dividing by zero.
pub fn normalize_unit<B: Backend, const D: usize>(t: Tensor<B, D>) -> Tensor<B, D> {
    let min: f32 = t.clone().min().into_scalar().elem();
    let max: f32 = t.clone().max().into_scalar().elem();
    t.sub_scalar(min).div_scalar(max - min + EPS)
}

/// Bilinear resize of a `(N, C, H, W)` tensor to `[height, width]`.
///
/// Returns the input unchanged when it already has the target size.
pub fn resize_bilinear<B: Backend>(t: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    let [_, _, h, w] = t.dims();
    if [h, w] == size {
        return t;
    }
    interpolate(t, size, InterpolateOptions::new(InterpolateMode::Bilinear))
}

/// Read a tensor back to host memory as a flat `Vec<f32>` in row-major order.
///
/// # Errors
///
/// Returns [`CoreError::Readback`] when the device-to-host transfer fails.
pub fn read_f32<B: Backend, const D: usize>(t: Tensor<B, D>) -> Result<Vec<f32>> {
    t.into_data()
        .to_vec::<f32>()
        .map_err(|e| CoreError::Readback(format!("{e:?}")))
}
