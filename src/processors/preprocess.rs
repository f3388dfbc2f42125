//! Image preprocessing: decode, resize, normalize.

use crate::core::config::ResizeFilter;
use crate::core::errors::ClassifyResult;
use crate::core::inference::{InputShape, Tensor4D};
use crate::processors::NormalizationPolicy;
use crate::utils::load_image;
use image::RgbImage;
use image::imageops::FilterType;
use std::path::Path;

/// Turns an image reference into a `(1, height, width, 3)` tensor.
///
/// The output always has the requested size; whether that size suits the
/// backend is checked by the backend itself.
#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    resize_filter: FilterType,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(ResizeFilter::default())
    }
}

impl ImagePreprocessor {
    pub fn new(filter: ResizeFilter) -> Self {
        Self {
            resize_filter: filter.to_filter_type(),
        }
    }

    /// Decodes the image at `path` and prepares it for a backend.
    ///
    /// # Arguments
    ///
    /// * `path` - Image file to read
    /// * `target` - Spatial size the tensor must have
    /// * `policy` - Normalization declared by the active backend variant
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::ImageDecode`](crate::core::ClassifyError::ImageDecode)
    /// if the file cannot be opened or decoded.
    pub fn preprocess(
        &self,
        path: &Path,
        target: InputShape,
        policy: NormalizationPolicy,
    ) -> ClassifyResult<Tensor4D> {
        let img = load_image(path)?;
        Ok(self.preprocess_image(&img, target, policy))
    }

    /// Resizes an already decoded image (ignoring aspect ratio) and normalizes it.
    pub fn preprocess_image(
        &self,
        img: &RgbImage,
        target: InputShape,
        policy: NormalizationPolicy,
    ) -> Tensor4D {
        let normalizer = policy.normalizer();
        if img.dimensions() == (target.width, target.height) {
            normalizer.normalize_to_tensor(img)
        } else {
            let resized =
                image::imageops::resize(img, target.width, target.height, self.resize_filter);
            normalizer.normalize_to_tensor(&resized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ClassifyError;
    use crate::core::inference::BackendKind;
    use image::Rgb;

    #[test]
    fn test_output_has_requested_shape() {
        let img = RgbImage::from_pixel(37, 19, Rgb([1, 2, 3]));
        let tensor = ImagePreprocessor::default().preprocess_image(
            &img,
            InputShape::new(100, 100),
            NormalizationPolicy::RawPixels,
        );
        assert_eq!(tensor.shape(), &[1, 100, 100, 3]);
    }

    #[test]
    fn test_policy_follows_backend_variant() {
        let img = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let pre = ImagePreprocessor::default();
        let shape = InputShape::new(4, 4);

        let dense = pre.preprocess_image(&img, shape, BackendKind::Dense.normalization());
        let compiled = pre.preprocess_image(&img, shape, BackendKind::Compiled.normalization());

        assert_eq!(dense[[0, 0, 0, 0]], 255.0);
        assert!((compiled[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!(compiled.iter().all(|v| v.abs() <= 1.0 + 1e-6));
    }

    #[test]
    fn test_nearest_resize_keeps_exact_pixel_values() {
        let img = RgbImage::from_pixel(10, 10, Rgb([200, 100, 50]));
        let tensor = ImagePreprocessor::new(ResizeFilter::Nearest).preprocess_image(
            &img,
            InputShape::new(5, 7),
            NormalizationPolicy::RawPixels,
        );
        assert!(tensor.iter().all(|&v| v == 200.0 || v == 100.0 || v == 50.0));
    }

    #[test]
    fn test_preprocess_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cow.png");
        RgbImage::from_pixel(8, 6, Rgb([0, 0, 0])).save(&path).unwrap();

        let tensor = ImagePreprocessor::default()
            .preprocess(&path, InputShape::new(4, 4), NormalizationPolicy::SymmetricUnit)
            .unwrap();
        assert!(tensor.iter().all(|&v| (v + 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_unsupported_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "moo").unwrap();

        let err = ImagePreprocessor::default()
            .preprocess(&path, InputShape::new(4, 4), NormalizationPolicy::RawPixels)
            .unwrap_err();
        assert!(matches!(err, ClassifyError::ImageDecode { .. }));
    }
}
