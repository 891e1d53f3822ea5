//! Hit testing and drag snapping for crop handles, text and stickers.
//!
//! All tests run in image space. Overlay boxes are tested in the overlay's
//! own rotated frame: the pointer is rotated back about the overlay center
//! before the box comparison.

use serde::Serialize;

use super::{Overlay, OverlayKind, OverlayType};
use crate::geometry::{rotate_about, Point};
use crate::transform::{CropAnchor, CropRect};

/// What a pointer landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    /// A crop corner handle.
    Crop(CropAnchor),
    /// A rotation handle of the selected overlay.
    Corner(usize),
    /// The body of an overlay.
    Select(usize),
}

/// Snap lines shown while dragging an overlay, in image space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SnapGuides {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// The padded, rotated box of a text or sticker overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub center: Point,
    pub angle: f64,
    /// Box bounds relative to `center` before rotation: `[x0, y0, x1, y1]`.
    pub bounds: [f64; 4],
}

impl Frame {
    /// Frame of a text or sticker overlay; `None` for strokes.
    pub fn of(overlay: &Overlay) -> Option<Frame> {
        let (width, height, padx, pady, offset) = match &overlay.kind {
            OverlayKind::Text(text) => (
                text.width,
                text.height,
                text.size * 0.5,
                text.size * 0.25,
                text.size * 0.3,
            ),
            OverlayKind::Sticker(sticker) => (sticker.width, sticker.height, 0.0, 0.0, 0.0),
            _ => return None,
        };
        let half_w = width * overlay.scale / 2.0 + padx;
        let half_h = height * overlay.scale / 2.0 + pady;
        Some(Frame {
            center: overlay.center,
            angle: overlay.angle,
            bounds: [-half_w, -offset - half_h, half_w, -offset + half_h],
        })
    }

    /// Corners in image space: top-left, top-right, bottom-left, bottom-right.
    pub fn corners(&self) -> [Point; 4] {
        let [x0, y0, x1, y1] = self.bounds;
        let (cx, cy) = (self.center[0], self.center[1]);
        [[x0, y0], [x1, y0], [x0, y1], [x1, y1]]
            .map(|[x, y]| rotate_about([cx + x, cy + y], self.center, self.angle))
    }

    /// Whether an image-space point lies inside the box.
    pub fn contains(&self, p: Point) -> bool {
        let local = rotate_about(p, self.center, -self.angle);
        let (x, y) = (local[0] - self.center[0], local[1] - self.center[1]);
        let [x0, y0, x1, y1] = self.bounds;
        x >= x0 && x <= x1 && y >= y0 && y <= y1
    }
}

#[inline]
fn within(p: Point, q: Point, radius: f64) -> bool {
    let (dx, dy) = (p[0] - q[0], p[1] - q[1]);
    dx * dx + dy * dy < radius * radius
}

/// The crop handle under `point`, checked in anchor order.
pub fn hit_crop(point: Point, crop: &CropRect, width: f64, height: f64, radius: f64) -> Option<CropAnchor> {
    CropAnchor::ALL
        .into_iter()
        .find(|&anchor| within(point, crop.corner(anchor, width, height), radius))
}

/// The overlay of kind `target` under `point`.
///
/// The selected overlay's rotation handles win over everything else; after
/// that overlays are tested from the topmost down.
pub fn hit_overlays(
    point: Point,
    overlays: &[Overlay],
    selected: Option<usize>,
    target: OverlayType,
    radius: f64,
) -> Option<Hit> {
    if !matches!(target, OverlayType::Text | OverlayType::Sticker) {
        return None;
    }
    let eligible = |overlay: &Overlay| overlay.overlay_type() == target;

    if let Some(index) = selected {
        if let Some(frame) = overlays.get(index).filter(|o| eligible(*o)).and_then(Frame::of) {
            if frame.corners().iter().any(|&c| within(point, c, radius)) {
                return Some(Hit::Corner(index));
            }
        }
    }

    overlays
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, overlay)| eligible(*overlay))
        .find(|(_, overlay)| Frame::of(overlay).is_some_and(|frame| frame.contains(point)))
        .map(|(index, _)| Hit::Select(index))
}

/// Snap a dragged center to the crop center lines.
///
/// `offset_y` is the vertical distance between the center and the visual
/// middle of the overlay (text sits above its center).
pub fn snap_center(center: Point, crop_center: Point, offset_y: f64, distance: f64) -> (Point, SnapGuides) {
    let mut out = center;
    let mut guides = SnapGuides::default();
    if (center[0] - crop_center[0]).abs() < distance {
        out[0] = crop_center[0];
        guides.x = Some(crop_center[0]);
    }
    if (center[1] - offset_y - crop_center[1]).abs() < distance {
        out[1] = crop_center[1] + offset_y;
        guides.y = Some(crop_center[1]);
    }
    (out, guides)
}
