//! Image decoding with EXIF orientation handling.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageReader};

use super::{Bitmap, DecodeError, Orientation};

/// Decode a JPEG or PNG from bytes into an upright RGBA bitmap.
///
/// The format is sniffed from the content. EXIF orientation, when present,
/// is applied so the result is in display orientation.
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` if the format cannot be recognized
/// and `DecodeError::CorruptedFile` if decoding fails.
pub fn decode_image(bytes: &[u8]) -> Result<Bitmap, DecodeError> {
    let orientation = get_orientation(bytes);

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
    if reader.format().is_none() {
        return Err(DecodeError::InvalidFormat);
    }

    let img = reader
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let upright = apply_orientation(img, orientation);
    Ok(Bitmap::from_rgba_image(upright.into_rgba8()))
}

/// EXIF orientation of an encoded image, `Normal` when absent.
pub fn get_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);
    Reader::new()
        .read_from_container(&mut cursor)
        .ok()
        .and_then(|exif| {
            exif.get_field(Tag::Orientation, In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .map(Orientation::from)
        .unwrap_or_default()
}

fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{encode_jpeg, encode_png};

    #[test]
    fn test_decode_png_round_trip() {
        let mut source = Bitmap::filled(5, 3, [200, 100, 50, 255]);
        source.pixels[3] = 0;
        let bytes = encode_png(&source).unwrap();
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded, source);
    }

    #[test]
    fn test_decode_jpeg_dimensions() {
        let bytes = encode_jpeg(&Bitmap::filled(16, 8, [90, 90, 90, 255]), 90).unwrap();
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!((decoded.width, decoded.height), (16, 8));
        assert!(decoded.pixels.chunks_exact(4).all(|p| p[3] == 255));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_image(&[0, 1, 2, 3, 4, 5]).is_err());
        assert!(decode_image(&[]).is_err());
    }

    #[test]
    fn test_orientation_without_exif_is_normal() {
        let bytes = encode_png(&Bitmap::filled(2, 2, [0, 0, 0, 255])).unwrap();
        assert_eq!(get_orientation(&bytes), Orientation::Normal);
    }

    #[test]
    fn test_apply_orientation_rotate90_swaps_dimensions() {
        let img = DynamicImage::new_rgba8(4, 2);
        let rotated = apply_orientation(img, Orientation::Rotate90CW);
        assert_eq!((rotated.width(), rotated.height()), (2, 4));
    }
}
