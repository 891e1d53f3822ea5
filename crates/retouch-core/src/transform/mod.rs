//! Geometric edits under the overlays: crop insets and background placement.
//!
//! # Coordinate System
//!
//! - Image space is source pixels in the displayed orientation, origin top-left
//! - Crop insets are pixel distances from each image edge
//! - Rotation angles are in degrees, positive = clockwise on screen

mod crop;
mod placement;

pub use crop::{AspectRatio, CropAnchor, CropRect, Region, ASPECT_PRESETS, MIN_CROP_EXTENT};
pub use placement::Placement;
