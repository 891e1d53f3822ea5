//! Retouch Core - Non-destructive photo editing engine
//!
//! This crate provides everything behind the Retouch editor that does not
//! touch the browser: the tile-equalized color pipeline, crop and rotation,
//! text, sticker and freehand overlays, the undo history and the
//! [`Editor`] session that ties them together.

pub mod adjustments;
pub mod color;
pub mod config;
pub mod decode;
pub mod editor;
pub mod encode;
pub mod geometry;
pub mod histogram;
pub mod history;
pub mod overlay;
pub mod pipeline;
pub mod raster;
pub mod state;
pub mod transform;
pub mod view;

pub use adjustments::{apply_adjustments, Adjustment, Adjustments};
pub use color::{Color, ColorError};
pub use config::EditorConfig;
pub use decode::{decode_image, Bitmap, DecodeError};
pub use editor::{Editor, EditorError, EditorEvent, Mode};
pub use encode::{encode_jpeg, encode_png, EncodeError};
pub use history::{History, HistoryEntry, SavedSession};
pub use overlay::{Overlay, OverlayKind, OverlayType};
pub use pipeline::AdjustmentPipeline;
pub use state::{Document, EditState};
pub use transform::{AspectRatio, CropRect};
