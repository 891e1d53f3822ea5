//! Image encoding WASM bindings for export.
//!
//! ```typescript
//! import { encode_png, encode_jpeg } from '@retouch/wasm';
//!
//! const result = editor.render_final_image();
//! const png = encode_png(result);
//! const jpeg = encode_jpeg(result, 90);
//! ```

use crate::types::JsBitmap;
use retouch_core::encode;
use wasm_bindgen::prelude::*;

/// Encode a bitmap as PNG, keeping transparency.
///
/// # Errors
///
/// Returns an error if the pixel buffer does not match the dimensions.
#[wasm_bindgen]
pub fn encode_png(image: &JsBitmap) -> Result<Vec<u8>, JsValue> {
    encode::encode_png(&image.to_bitmap()).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Encode a bitmap as JPEG. Alpha is dropped.
///
/// # Arguments
///
/// * `image` - The bitmap to encode
/// * `quality` - JPEG quality (1-100, recommended: 90)
#[wasm_bindgen]
pub fn encode_jpeg(image: &JsBitmap, quality: u8) -> Result<Vec<u8>, JsValue> {
    encode::encode_jpeg(&image.to_bitmap(), quality).map_err(|e| JsValue::from_str(&e.to_string()))
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_encode_mismatched_buffer_errors() {
        let image = JsBitmap::new(10, 10, vec![0u8; 12]);
        assert!(encode_png(&image).is_err());
        assert!(encode_jpeg(&image, 90).is_err());
    }
}
