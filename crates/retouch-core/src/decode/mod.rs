//! Image decoding for the editor.
//!
//! Source photos arrive as encoded bytes from the host. They are decoded once,
//! turned upright according to their EXIF orientation, and handed to the
//! editor as an RGBA [`Bitmap`]. Sticker assets go through the same path.
//!
//! # Examples
//!
//! ```ignore
//! use retouch_core::decode::decode_image;
//!
//! let bytes = std::fs::read("photo.jpg").unwrap();
//! let bitmap = decode_image(&bytes).unwrap();
//! println!("Decoded {}x{} image", bitmap.width, bitmap.height);
//! ```

mod source;
mod types;

pub use source::{decode_image, get_orientation};
pub use types::{Bitmap, DecodeError, Orientation};
