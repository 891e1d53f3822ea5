//! Font registry and glyph rasterization for text overlays.
//!
//! Fonts are registered by name from raw TTF/OTF bytes. Lookups for a name
//! that was never registered fall back to the first registered face; with no
//! face at all, text is measured with a fixed per-character advance and no
//! glyphs are drawn.

use ab_glyph::{point, Font, FontArc, FontVec, GlyphId, InvalidFont, PxScale, ScaleFont};
use thiserror::Error;

use super::Mask;
use crate::geometry::Point;

/// Advance per character, in em, when no face is registered.
pub const FALLBACK_ADVANCE: f64 = 0.6;

/// Line height relative to the font size.
pub const LINE_HEIGHT: f64 = 1.2;

/// Font registration errors.
#[derive(Debug, Error)]
pub enum FontError {
    #[error("Invalid font data for {name:?}: {source}")]
    Invalid {
        name: String,
        #[source]
        source: InvalidFont,
    },
}

/// Registered font faces, in registration order.
#[derive(Clone, Default)]
pub struct FontBook {
    faces: Vec<(String, FontArc)>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("faces", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` under `name`, replacing any face with that name.
    pub fn register(&mut self, name: &str, bytes: Vec<u8>) -> Result<(), FontError> {
        let font = FontVec::try_from_vec(bytes).map_err(|source| FontError::Invalid {
            name: name.to_string(),
            source,
        })?;
        let font = FontArc::from(font);
        match self.faces.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = font,
            None => self.faces.push((name.to_string(), font)),
        }
        tracing::debug!(font = name, "font registered");
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.faces.iter().map(|(n, _)| n.as_str())
    }

    /// The face registered as `name`, else the first face.
    pub fn resolve(&self, name: &str) -> Option<&FontArc> {
        if let Some((_, font)) = self.faces.iter().find(|(n, _)| n == name) {
            return Some(font);
        }
        let fallback = self.faces.first().map(|(_, f)| f);
        if fallback.is_some() {
            tracing::trace!(font = name, "unknown font, using first registered face");
        }
        fallback
    }

    /// Advance width of one line of `text` at `size` pixels.
    pub fn measure(&self, font: &str, size: f64, text: &str) -> f64 {
        match self.resolve(font) {
            Some(face) => {
                let scaled = face.as_scaled(PxScale::from(size as f32));
                let mut width = 0.0f32;
                let mut prev: Option<GlyphId> = None;
                for ch in text.chars() {
                    let id = face.glyph_id(ch);
                    if let Some(prev) = prev {
                        width += scaled.kern(prev, id);
                    }
                    width += scaled.h_advance(id);
                    prev = Some(id);
                }
                width as f64
            }
            None => text.chars().count() as f64 * size * FALLBACK_ADVANCE,
        }
    }

    /// Measured `(width, height)` of multi-line text.
    pub fn measure_block(&self, font: &str, size: f64, text: &str) -> (f64, f64) {
        let lines: Vec<&str> = text.split('\n').collect();
        let width = lines
            .iter()
            .map(|line| self.measure(font, size, line))
            .fold(0.0, f64::max);
        (width, lines.len() as f64 * size * LINE_HEIGHT)
    }

    /// Rasterize one line with its alphabetic baseline starting at `origin`.
    ///
    /// Returns `false` when no face is available and nothing was drawn.
    pub fn draw_line(&self, font: &str, size: f64, text: &str, origin: Point, mask: &mut Mask) -> bool {
        let Some(face) = self.resolve(font) else {
            return false;
        };
        let scale = PxScale::from(size as f32);
        let scaled = face.as_scaled(scale);
        let mut caret = point(origin[0] as f32, origin[1] as f32);
        let mut prev: Option<GlyphId> = None;
        for ch in text.chars() {
            let id = face.glyph_id(ch);
            if let Some(prev) = prev {
                caret.x += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(scale, caret);
            caret.x += scaled.h_advance(id);
            prev = Some(id);
            if let Some(outlined) = face.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|x, y, coverage| {
                    let px = bounds.min.x as i64 + x as i64;
                    let py = bounds.min.y as i64 + y as i64;
                    if px >= 0 && py >= 0 {
                        mask.raise(px as u32, py as u32, coverage);
                    }
                });
            }
        }
        true
    }
}
