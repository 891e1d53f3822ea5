//! PNG and JPEG encoding of RGBA bitmaps.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;

use crate::decode::Bitmap;

/// Errors that can occur during encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes (width * height * 4), got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The underlying encoder failed
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}

fn validate(bitmap: &Bitmap) -> Result<(), EncodeError> {
    if bitmap.width == 0 || bitmap.height == 0 {
        return Err(EncodeError::InvalidDimensions {
            width: bitmap.width,
            height: bitmap.height,
        });
    }
    if bitmap.pixels.len() != bitmap.expected_len() {
        return Err(EncodeError::InvalidPixelData {
            expected: bitmap.expected_len(),
            actual: bitmap.pixels.len(),
        });
    }
    Ok(())
}

/// Encode a bitmap as PNG, keeping alpha.
pub fn encode_png(bitmap: &Bitmap) -> Result<Vec<u8>, EncodeError> {
    validate(bitmap)?;

    let mut buffer = Cursor::new(Vec::new());
    PngEncoder::new(&mut buffer)
        .write_image(
            &bitmap.pixels,
            bitmap.width,
            bitmap.height,
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;
    Ok(buffer.into_inner())
}

/// Encode a bitmap as JPEG.
///
/// JPEG has no alpha channel, so pixels are composited over black first.
/// `quality` is clamped to 1-100.
pub fn encode_jpeg(bitmap: &Bitmap, quality: u8) -> Result<Vec<u8>, EncodeError> {
    validate(bitmap)?;

    let rgb: Vec<u8> = bitmap
        .pixels
        .chunks_exact(4)
        .flat_map(|px| {
            let a = px[3] as u32;
            let over_black = |c: u8| ((c as u32 * a + 127) / 255) as u8;
            [over_black(px[0]), over_black(px[1]), over_black(px[2])]
        })
        .collect();

    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .write_image(&rgb, bitmap.width, bitmap.height, ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_jpeg_markers() {
        let jpeg = encode_jpeg(&Bitmap::filled(100, 100, [128, 128, 128, 255]), 90).unwrap();
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_png_signature() {
        let png = encode_png(&Bitmap::filled(8, 8, [1, 2, 3, 4])).unwrap();
        assert_eq!(&png[0..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn test_encode_jpeg_quality_clamping() {
        let bitmap = Bitmap::filled(10, 10, [128, 128, 128, 255]);
        assert!(encode_jpeg(&bitmap, 0).is_ok());
        assert!(encode_jpeg(&bitmap, 255).is_ok());
    }

    #[test]
    fn test_encode_invalid_pixel_data() {
        let bitmap = Bitmap::new(10, 10, vec![0; 10 * 9 * 4]);
        assert!(matches!(
            encode_png(&bitmap),
            Err(EncodeError::InvalidPixelData { .. })
        ));
        assert!(matches!(
            encode_jpeg(&bitmap, 90),
            Err(EncodeError::InvalidPixelData { .. })
        ));
    }

    #[test]
    fn test_encode_zero_dimensions() {
        let bitmap = Bitmap::new(0, 10, vec![]);
        assert!(matches!(
            encode_png(&bitmap),
            Err(EncodeError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_encode_jpeg_transparent_is_black() {
        let bitmap = Bitmap::filled(16, 16, [255, 255, 255, 0]);
        let jpeg = encode_jpeg(&bitmap, 95).unwrap();
        let decoded = crate::decode::decode_image(&jpeg).unwrap();
        assert!(decoded.pixels.chunks_exact(4).all(|p| p[0] < 8));
    }
}
