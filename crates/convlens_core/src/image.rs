//! Decoded-image input type.
//!
//! The UI layer owns decoding; the core receives a raw RGB8 buffer of
//! arbitrary dimensions and converts it to a float tensor itself.

use burn::prelude::*;

use crate::error::{CoreError, Result};

/// A decoded RGB image: row-major, 3 bytes per pixel, no padding.
#[derive(Debug, Clone)]
pub struct RgbImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl RgbImage {
    /// Wrap a decoded pixel buffer.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidShape`] when `data.len()` is not
    /// `width * height * 3`.
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        let expected = width * height * 3;
        if data.len() != expected {
            return Err(CoreError::InvalidShape {
                expected: format!("{width}x{height}x3 = {expected} bytes"),
                got: format!("{} bytes", data.len()),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw RGB8 bytes, row-major.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Convert to a `(1, 3, H, W)` float tensor with values in `[0, 255]`.
    ///
    /// Scaling to the model's expected input range is a separate,
    /// family-specific step; this conversion is lossless.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4> {
        let (h, w) = (self.height, self.width);
        let mut chw = vec![0.0f32; 3 * h * w];
        for y in 0..h {
            for x in 0..w {
                let px = (y * w + x) * 3;
                for c in 0..3 {
                    chw[c * h * w + y * w + x] = f32::from(self.data[px + c]);
                }
            }
        }
        Tensor::<B, 1>::from_floats(chw.as_slice(), device).reshape([1, 3, h, w])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NdArray;
    use crate::tensor::read_f32;

    type TestBackend = NdArray;

    #[test]
    fn test_rgb_image_shape_check() {
        assert!(RgbImage::new(2, 2, vec![0; 12]).is_ok());
        assert!(RgbImage::new(2, 2, vec![0; 11]).is_err());
    }

    #[test]
    fn test_to_tensor_layout() {
        // 1x2 image: red pixel then blue pixel.
        let img = RgbImage::new(2, 1, vec![255, 0, 0, 0, 0, 255]).unwrap();
        let device = Default::default();
        let t = img.to_tensor::<TestBackend>(&device);
        assert_eq!(t.dims(), [1, 3, 1, 2]);

        let vals = read_f32(t).unwrap();
        // CHW order: R plane, G plane, B plane.
        assert_eq!(vals, vec![255.0, 0.0, 0.0, 0.0, 0.0, 255.0]);
    }
}
