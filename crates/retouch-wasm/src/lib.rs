//! Retouch WASM - WebAssembly bindings for Retouch
//!
//! This crate exposes the retouch-core editing engine to JavaScript and
//! TypeScript applications.
//!
//! # Module Structure
//!
//! - `types` - WASM-compatible wrapper for RGBA bitmaps
//! - `decode` - Image decoding bindings (JPEG, PNG, EXIF orientation)
//! - `encode` - Export encoding bindings (PNG, JPEG)
//! - `editor` - The interactive editing session
//!
//! # Usage
//!
//! ```typescript
//! import init, { decode_image, JsEditor } from '@retouch/wasm';
//!
//! // Initialize WASM module (must call first)
//! await init();
//!
//! const image = decode_image(new Uint8Array(await file.arrayBuffer()));
//! const editor = new JsEditor(undefined);
//! editor.load_image(image);
//! ```

use wasm_bindgen::prelude::*;

mod decode;
mod editor;
mod encode;
mod types;

// Re-export public types
pub use decode::{decode_image, get_orientation};
pub use editor::JsEditor;
pub use encode::{encode_jpeg, encode_png};
pub use types::JsBitmap;

/// Initialize the WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Names of the adjustments accepted by `JsEditor::change`.
#[wasm_bindgen]
pub fn adjustment_names() -> Vec<String> {
    retouch_core::Adjustment::ALL
        .iter()
        .map(|a| a.name().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_adjustment_names() {
        let names = adjustment_names();
        assert_eq!(names.len(), 11);
        assert!(names.contains(&"brightness".to_string()));
    }
}
