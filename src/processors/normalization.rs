//! Pixel normalization.
//!
//! Each backend variant declares the value range its models expect through a
//! [`NormalizationPolicy`]. A policy resolves to a [`NormalizeImage`], a
//! per-channel affine map `v * alpha + beta` applied while the image is
//! written into the NHWC tensor.

use crate::core::inference::{InputShape, Tensor4D};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Input value range a model was exported against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationPolicy {
    /// Pixel values passed through unchanged, in [0, 255].
    RawPixels,
    /// `v / 127.5 - 1`, mapping [0, 255] onto [-1, 1].
    SymmetricUnit,
}

impl NormalizationPolicy {
    pub fn normalizer(self) -> NormalizeImage {
        match self {
            NormalizationPolicy::RawPixels => NormalizeImage::identity(),
            NormalizationPolicy::SymmetricUnit => NormalizeImage {
                alpha: [1.0 / 127.5; 3],
                beta: [-1.0; 3],
            },
        }
    }
}

/// Per-channel affine normalization, `v * alpha + beta`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeImage {
    /// Scaling factors for each channel (alpha = scale / std)
    pub alpha: [f32; 3],
    /// Offset values for each channel (beta = -mean / std)
    pub beta: [f32; 3],
}

impl NormalizeImage {
    pub fn identity() -> Self {
        Self {
            alpha: [1.0; 3],
            beta: [0.0; 3],
        }
    }

    /// Writes `img` into a `(1, height, width, 3)` tensor, normalizing each
    /// channel. The image must already have the target size.
    pub fn normalize_to_tensor(&self, img: &RgbImage) -> Tensor4D {
        let (width, height) = img.dimensions();
        let mut tensor = Tensor4D::zeros((
            1,
            height as usize,
            width as usize,
            InputShape::CHANNELS,
        ));
        for (x, y, pixel) in img.enumerate_pixels() {
            for c in 0..InputShape::CHANNELS {
                tensor[[0, y as usize, x as usize, c]] =
                    pixel[c] as f32 * self.alpha[c] + self.beta[c];
            }
        }
        tensor
    }
}
