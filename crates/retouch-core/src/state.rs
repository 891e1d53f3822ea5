//! The canonical, serializable document state.

use serde::{Deserialize, Serialize};

use crate::adjustments::Adjustments;
use crate::overlay::Overlay;
use crate::transform::CropRect;

/// Straightening angle limit, in degrees.
pub const MAX_ANGLE: f64 = 90.0;

/// Everything about an edit except the overlays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditState {
    pub adjustments: Adjustments,
    /// Quarter turns in degrees, accumulated and never normalized.
    pub rotation: i32,
    /// Fine straightening in degrees, within ±90.
    pub angle: f64,
    pub flip: bool,
    pub crop: CropRect,
}

impl EditState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total background rotation in degrees.
    pub fn total_rotation(&self) -> f64 {
        self.rotation as f64 + self.angle
    }

    /// Add the nearest multiple of 90 to `rotation`.
    pub fn rotate_by(&mut self, degrees: f64) {
        if degrees.is_finite() {
            self.rotation += ((degrees / 90.0).round() as i32) * 90;
        }
    }

    pub fn set_angle(&mut self, degrees: f64) {
        if degrees.is_finite() {
            self.angle = degrees.clamp(-MAX_ANGLE, MAX_ANGLE);
        }
    }
}

/// Live state plus the overlay stack; what undo and redo act on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub state: EditState,
    pub overlays: Vec<Overlay>,
}

impl Document {
    pub fn new(state: EditState, overlays: Vec<Overlay>) -> Self {
        Self { state, overlays }
    }
}
