//! Encoding of rendered images for export.
//!
//! The final render is an owned [`Bitmap`](crate::decode::Bitmap) snapshot, so
//! encoding can run independently of any edits made after the render was
//! requested.
//!
//! # Examples
//!
//! ```ignore
//! use retouch_core::encode::encode_png;
//!
//! let bitmap = editor.render_final_image()?;
//! let png = encode_png(&bitmap)?;
//! ```

mod codec;

pub use codec::{encode_jpeg, encode_png, EncodeError};
