//! Vector overlays drawn over the edited image.
//!
//! Every overlay shares a placement (`center`, `angle`, `scale`) and carries
//! one of eight kinds. The JSON form is a single flat object discriminated by
//! `type`, which is also the shape stored in the undo history:
//!
//! ```json
//! {"center":[50.0,50.0],"angle":0.0,"scale":1.0,"type":"text","text":"Hi",...}
//! {"center":[0.0,0.0],"angle":0.0,"scale":1.0,"type":"pen","points":[[1.0,2.0]],"size":15.0,"color":"#FE4438"}
//! ```
//!
//! Overlays are identified by their index in the document's overlay list.
//! Field-level edits are recorded as partial JSON objects; see
//! [`Overlay::diff`] and [`Overlay::merged`].

mod hit;
mod render;
mod stroke;

pub use hit::{hit_crop, hit_overlays, snap_center, Frame, Hit, SnapGuides};
pub use render::{render_overlays, OverlayContext, StickerLookup};
pub use stroke::{brush_seed, finish_stroke, StrokeFit};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::color::Color;
use crate::geometry::{Point, Segment};

/// A partial overlay: only the keys that changed.
pub type FieldSet = serde_json::Map<String, Value>;

/// Cached brush direction seed: `[angle, dx, dy]`.
pub type BrushSeed = [f64; 3];

fn unit_scale() -> f64 {
    1.0
}

/// Discriminator of an overlay kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayType {
    Text,
    Sticker,
    Pen,
    Arrow,
    Brush,
    Neon,
    Blur,
    Eraser,
}

impl OverlayType {
    /// Freehand kinds created by dragging in draw mode.
    pub fn is_stroke(self) -> bool {
        !matches!(self, OverlayType::Text | OverlayType::Sticker)
    }

    /// Whether strokes of this kind carry a color.
    pub fn has_color(self) -> bool {
        !matches!(self, OverlayType::Blur | OverlayType::Eraser)
    }
}

/// Horizontal text alignment inside the measured box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// How text is decorated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextStyle {
    /// Plain fill in the overlay color.
    #[default]
    None,
    /// Contrast-colored outline under the fill.
    Stroke,
    /// Rounded pill per line, text in the contrast color.
    Fill,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub text: String,
    pub font: String,
    pub size: f64,
    #[serde(default)]
    pub align: TextAlign,
    #[serde(default)]
    pub style: TextStyle,
    pub color: Color,
    /// Measured layout width.
    #[serde(default)]
    pub width: f64,
    /// Measured layout height.
    #[serde(default)]
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickerOverlay {
    /// Key of the asset in the host's sticker store.
    pub asset_ref: String,
    pub width: f64,
    pub height: f64,
}

/// A freehand stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<Point>,
    pub size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    /// Fitted curve, empty while the stroke is being drawn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub curve: Vec<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<BrushSeed>,
}

impl Stroke {
    pub fn new(start: Point, size: f64, color: Option<Color>) -> Self {
        Self {
            points: vec![start],
            size,
            color,
            curve: Vec::new(),
            first: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OverlayKind {
    Text(TextOverlay),
    Sticker(StickerOverlay),
    Pen(Stroke),
    Arrow(Stroke),
    Brush(Stroke),
    Neon(Stroke),
    Blur(Stroke),
    Eraser(Stroke),
}

/// One overlay in image space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    #[serde(default)]
    pub center: Point,
    /// Radians, clockwise on screen.
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "unit_scale")]
    pub scale: f64,
    #[serde(flatten)]
    pub kind: OverlayKind,
}

impl Overlay {
    pub fn new(center: Point, kind: OverlayKind) -> Self {
        Self {
            center,
            angle: 0.0,
            scale: 1.0,
            kind,
        }
    }

    /// A stroke overlay of the given kind; `None` for text and sticker.
    pub fn from_stroke(kind: OverlayType, stroke: Stroke) -> Option<Self> {
        let kind = match kind {
            OverlayType::Pen => OverlayKind::Pen(stroke),
            OverlayType::Arrow => OverlayKind::Arrow(stroke),
            OverlayType::Brush => OverlayKind::Brush(stroke),
            OverlayType::Neon => OverlayKind::Neon(stroke),
            OverlayType::Blur => OverlayKind::Blur(stroke),
            OverlayType::Eraser => OverlayKind::Eraser(stroke),
            OverlayType::Text | OverlayType::Sticker => return None,
        };
        Some(Self::new([0.0, 0.0], kind))
    }

    pub fn overlay_type(&self) -> OverlayType {
        match &self.kind {
            OverlayKind::Text(_) => OverlayType::Text,
            OverlayKind::Sticker(_) => OverlayType::Sticker,
            OverlayKind::Pen(_) => OverlayType::Pen,
            OverlayKind::Arrow(_) => OverlayType::Arrow,
            OverlayKind::Brush(_) => OverlayType::Brush,
            OverlayKind::Neon(_) => OverlayType::Neon,
            OverlayKind::Blur(_) => OverlayType::Blur,
            OverlayKind::Eraser(_) => OverlayType::Eraser,
        }
    }

    pub fn as_text(&self) -> Option<&TextOverlay> {
        match &self.kind {
            OverlayKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextOverlay> {
        match &mut self.kind {
            OverlayKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_sticker(&self) -> Option<&StickerOverlay> {
        match &self.kind {
            OverlayKind::Sticker(sticker) => Some(sticker),
            _ => None,
        }
    }

    pub fn as_stroke(&self) -> Option<&Stroke> {
        match &self.kind {
            OverlayKind::Pen(s)
            | OverlayKind::Arrow(s)
            | OverlayKind::Brush(s)
            | OverlayKind::Neon(s)
            | OverlayKind::Blur(s)
            | OverlayKind::Eraser(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_stroke_mut(&mut self) -> Option<&mut Stroke> {
        match &mut self.kind {
            OverlayKind::Pen(s)
            | OverlayKind::Arrow(s)
            | OverlayKind::Brush(s)
            | OverlayKind::Neon(s)
            | OverlayKind::Blur(s)
            | OverlayKind::Eraser(s) => Some(s),
            _ => None,
        }
    }

    /// The overlay as a flat JSON object.
    pub fn to_fields(&self) -> Result<FieldSet, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(serde::ser::Error::custom("overlay did not serialize to an object")),
        }
    }

    /// Changed keys between two versions of one overlay, as `(new, old)`.
    ///
    /// A key present on only one side maps to `null` on the other.
    pub fn diff(old: &Overlay, new: &Overlay) -> Result<(FieldSet, FieldSet), serde_json::Error> {
        let before = old.to_fields()?;
        let after = new.to_fields()?;
        let mut new_fields = FieldSet::new();
        let mut old_fields = FieldSet::new();
        for key in before.keys().chain(after.keys()) {
            if new_fields.contains_key(key) {
                continue;
            }
            let (a, b) = (before.get(key), after.get(key));
            if a != b {
                new_fields.insert(key.clone(), b.cloned().unwrap_or(Value::Null));
                old_fields.insert(key.clone(), a.cloned().unwrap_or(Value::Null));
            }
        }
        Ok((new_fields, old_fields))
    }

    /// A copy with `fields` applied. `null` removes a key.
    ///
    /// Fails without touching `self` when the result is not a valid overlay.
    pub fn merged(&self, fields: &FieldSet) -> Result<Overlay, serde_json::Error> {
        let mut map = self.to_fields()?;
        for (key, value) in fields {
            if value.is_null() {
                map.remove(key);
            } else {
                map.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(Value::Object(map))
    }
}
