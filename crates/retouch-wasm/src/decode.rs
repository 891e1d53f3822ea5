//! Image decoding WASM bindings.
//!
//! # Example
//!
//! ```typescript
//! import { decode_image } from '@retouch/wasm';
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! const image = decode_image(bytes);
//! editor.load_image(image);
//! ```

use crate::types::JsBitmap;
use retouch_core::decode;
use wasm_bindgen::prelude::*;

/// Decode a JPEG or PNG into RGBA, upright according to its EXIF orientation.
///
/// # Errors
///
/// Returns an error if the format is unsupported or the data is corrupted.
#[wasm_bindgen]
pub fn decode_image(bytes: &[u8]) -> Result<JsBitmap, JsValue> {
    decode::decode_image(bytes)
        .map(JsBitmap::from_bitmap)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// EXIF orientation tag value (1-8); 1 when absent.
#[wasm_bindgen]
pub fn get_orientation(bytes: &[u8]) -> u8 {
    decode::get_orientation(bytes) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_defaults_to_normal() {
        assert_eq!(get_orientation(&[0, 1, 2, 3]), 1);
        assert_eq!(get_orientation(&[]), 1);
    }
}

/// These tests use functions that return `Result<T, JsValue>` and can only
/// run on wasm32 targets. Use `wasm-pack test` to run these.
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_decode_image_invalid() {
        assert!(decode_image(&[0, 1, 2, 3]).is_err());
    }

    #[wasm_bindgen_test]
    fn test_decode_image_empty() {
        assert!(decode_image(&[]).is_err());
    }

    #[wasm_bindgen_test]
    fn test_decode_encoded_png() {
        let png = retouch_core::encode::encode_png(&retouch_core::Bitmap::filled(3, 2, [9, 8, 7, 255])).unwrap();
        let image = decode_image(&png).unwrap();
        assert_eq!((image.width(), image.height()), (3, 2));
        assert_eq!(&image.pixels()[..4], &[9, 8, 7, 255]);
    }
}
