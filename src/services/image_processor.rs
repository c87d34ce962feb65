// src/services/image_processor.rs
use crate::errors::StockwiseError;
use image::{GenericImageView, ImageFormat};

// Upstream rejects inline payloads past ~4MB once base64 has inflated them,
// so raw bytes have to stay under roughly three quarters of that.
const MAX_INLINE_BYTES: usize = 3_000_000;
const MAX_DIMENSION: u32 = 4096;

pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Confirm the bytes decode as an image within the dimension cap.
    pub fn validate_image(&self, data: &[u8]) -> Result<(u32, u32), StockwiseError> {
        let img = image::load_from_memory(data).map_err(|e| {
            StockwiseError::ImageProcessing(format!("Invalid image format: {}", e))
        })?;

        let (width, height) = img.dimensions();
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(StockwiseError::ImageProcessing(format!(
                "Image dimensions exceed {}x{}",
                MAX_DIMENSION, MAX_DIMENSION
            )));
        }

        Ok((width, height))
    }

    /// Downscale and re-encode an image whose raw size would blow the
    /// model's inline payload limit. Images already under the limit pass
    /// through untouched.
    pub fn shrink_for_inline(&self, data: &[u8]) -> Result<Vec<u8>, StockwiseError> {
        if data.len() <= MAX_INLINE_BYTES {
            return Ok(data.to_vec());
        }

        let img = image::load_from_memory(data)
            .map_err(|e| StockwiseError::ImageProcessing(format!("Failed to load image: {}", e)))?;

        let (width, height) = img.dimensions();
        let scale = ((MAX_INLINE_BYTES as f64 / data.len() as f64).sqrt() * 0.9) as f32;
        let new_width = ((width as f32 * scale) as u32).max(256);
        let new_height = ((height as f32 * scale) as u32).max(256);

        let resized = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);

        let mut output = Vec::new();
        resized
            .write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Jpeg)
            .map_err(|e| {
                StockwiseError::ImageProcessing(format!("Failed to encode resized image: {}", e))
            })?;

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 120, 200]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn valid_png_reports_dimensions() {
        let processor = ImageProcessor::new();
        assert_eq!(processor.validate_image(&png_bytes(3, 2)).unwrap(), (3, 2));
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let processor = ImageProcessor::new();
        let err = processor.validate_image(b"not an image").unwrap_err();
        assert!(matches!(err, StockwiseError::ImageProcessing(_)));
    }

    #[test]
    fn small_images_pass_through_unchanged() {
        let processor = ImageProcessor::new();
        let original = png_bytes(8, 8);
        assert_eq!(processor.shrink_for_inline(&original).unwrap(), original);
    }
}
