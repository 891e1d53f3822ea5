//! Background placement: where each output pixel reads the source image.
//!
//! The background sits under the overlays rotated by `rotation + angle`
//! about the crop center and optionally mirrored. Rendering uses inverse
//! mapping: for each output point we compute the matching source point and
//! sample it bilinearly.
//!
//! # Algorithm
//!
//! For an image-space point `p` and pivot `c` (the crop center), with
//! `θ = rotation + angle`:
//!
//! ```text
//! d = p - c
//! x = c.x + d.x·cos θ + d.y·sin θ
//! y = c.y - d.x·sin θ + d.y·cos θ
//! x = W - x            (when mirrored)
//! ```

use crate::geometry::Point;
use crate::raster::{Composite, Surface};

/// Inverse mapping from image space to source pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pivot: Point,
    cos: f64,
    sin: f64,
    mirrored: bool,
    source_width: f64,
}

impl Placement {
    /// Rotation by `degrees` about `pivot`, then a horizontal mirror when `mirrored`.
    pub fn new(degrees: f64, pivot: Point, mirrored: bool, source_width: u32) -> Self {
        let (sin, cos) = if degrees.is_finite() {
            degrees.to_radians().sin_cos()
        } else {
            (0.0, 1.0)
        };
        Self {
            pivot,
            cos,
            sin,
            mirrored,
            source_width: source_width as f64,
        }
    }

    /// No rotation and no mirror.
    pub fn is_identity(&self) -> bool {
        !self.mirrored && self.sin.abs() < 1e-12 && (self.cos - 1.0).abs() < 1e-12
    }

    /// Source pixel coordinates for the image-space point `p`.
    pub fn source_point(&self, p: Point) -> Point {
        let dx = p[0] - self.pivot[0];
        let dy = p[1] - self.pivot[1];
        let x = self.pivot[0] + dx * self.cos + dy * self.sin;
        let y = self.pivot[1] - dx * self.sin + dy * self.cos;
        if self.mirrored {
            [self.source_width - x, y]
        } else {
            [x, y]
        }
    }

    /// Where the source point `s` lands in image space.
    pub fn image_point(&self, s: Point) -> Point {
        let x = if self.mirrored { self.source_width - s[0] } else { s[0] };
        let dx = x - self.pivot[0];
        let dy = s[1] - self.pivot[1];
        [
            self.pivot[0] + dx * self.cos - dy * self.sin,
            self.pivot[1] + dx * self.sin + dy * self.cos,
        ]
    }

    /// Draw `source` onto `target`, where `to_image` maps target pixels to image space.
    pub fn draw<F>(&self, source: &Surface, target: &mut Surface, mode: Composite, to_image: F)
    where
        F: Fn(Point) -> Point,
    {
        target.draw_mapped(source, mode, |p| self.source_point(to_image(p)));
    }
}
