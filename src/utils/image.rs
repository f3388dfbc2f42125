//! Image loading helpers.

use crate::core::errors::{ClassifyError, ClassifyResult};
use image::{DynamicImage, ImageError, ImageReader, RgbImage};
use std::path::Path;

/// Converts a DynamicImage of any color type to 8-bit RGB.
pub fn dynamic_to_rgb(img: DynamicImage) -> RgbImage {
    img.to_rgb8()
}

/// Loads an image from a file path and converts it to RgbImage.
///
/// The format is guessed from the file contents, so files with a missing or
/// misleading extension still decode.
///
/// # Errors
///
/// Returns [`ClassifyError::ImageDecode`] if the file cannot be opened, its
/// format is not supported, or its bytes do not decode.
pub fn load_image(path: &Path) -> ClassifyResult<RgbImage> {
    let decode_error = |source: ImageError| ClassifyError::ImageDecode {
        path: path.to_path_buf(),
        source,
    };
    let img = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| decode_error(ImageError::IoError(e)))?
        .decode()
        .map_err(decode_error)?;
    Ok(dynamic_to_rgb(img))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::io::Write;

    #[test]
    fn test_load_image_converts_gray_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        GrayImage::from_pixel(3, 2, Luma([77])).save(&path).unwrap();

        let img = load_image(&path).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(0, 0).0, [77, 77, 77]);
    }

    #[test]
    fn test_load_image_guesses_format_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("img.png");
        RgbImage::new(4, 4).save(&png).unwrap();
        let bare = dir.path().join("upload");
        std::fs::copy(&png, &bare).unwrap();

        assert!(load_image(&bare).is_ok());
    }

    #[test]
    fn test_load_image_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not an image").unwrap();

        let err = load_image(file.path()).unwrap_err();
        assert!(matches!(err, ClassifyError::ImageDecode { .. }));
    }
}
