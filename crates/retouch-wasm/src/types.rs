//! WASM-compatible wrapper types for image data.
//!
//! `JsBitmap` carries straight-alpha RGBA pixels between JavaScript and the
//! core `Bitmap` type.

use retouch_core::decode::Bitmap;
use wasm_bindgen::prelude::*;

/// An RGBA image for JavaScript.
///
/// Pixel data lives in WASM memory; `pixels()` copies it out as a
/// `Uint8Array` that can be wrapped in an `ImageData`.
#[wasm_bindgen]
pub struct JsBitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

#[wasm_bindgen]
impl JsBitmap {
    /// Create a bitmap from dimensions and RGBA data (4 bytes per pixel, row-major).
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> JsBitmap {
        JsBitmap {
            width,
            height,
            pixels,
        }
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of bytes in the pixel buffer
    #[wasm_bindgen(getter)]
    pub fn byte_length(&self) -> usize {
        self.pixels.len()
    }

    /// RGBA pixel data as a Uint8Array copy.
    pub fn pixels(&self) -> Vec<u8> {
        self.pixels.clone()
    }

    /// Explicitly free WASM memory.
    pub fn free(self) {}
}

impl JsBitmap {
    pub(crate) fn from_bitmap(bitmap: Bitmap) -> Self {
        Self {
            width: bitmap.width,
            height: bitmap.height,
            pixels: bitmap.pixels,
        }
    }

    /// Copy into a core bitmap.
    pub(crate) fn to_bitmap(&self) -> Bitmap {
        Bitmap::new(self.width, self.height, self.pixels.clone())
    }
}
