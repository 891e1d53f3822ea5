//! CPU rasterization: premultiplied float surfaces, coverage masks and text.
//!
//! Overlays and the background are composed on a [`Surface`], an
//! `image::Rgba32FImage` holding premultiplied RGBA in `[0, 1]`. Shapes are
//! rasterized into a [`Mask`] first and then painted through it with one of
//! the canvas compositing operators.
//!
//! ## Compositing
//!
//! With premultiplied source `s` and destination `d`:
//!
//! - `SourceOver`: `s + d·(1 − αs)`
//! - `DestinationOut`: `d·(1 − αs)`
//! - `DestinationIn`: `d·αs`
//! - `DestinationAtop`: `s·(1 − αd) + d·αs`
//!
//! `DestinationIn` and `DestinationAtop` affect every pixel of the surface,
//! including those outside the source.

mod affine;
mod mask;
mod text;

pub use affine::Affine;
pub use mask::Mask;
pub use text::{FontBook, FontError, FALLBACK_ADVANCE, LINE_HEIGHT};

use image::{imageops, Rgba, Rgba32FImage};

use crate::decode::Bitmap;
use crate::geometry::Point;

/// Premultiplied RGBA in `[0, 1]`.
pub type Rgba32 = [f32; 4];

/// Compositing operator for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Composite {
    #[default]
    SourceOver,
    DestinationOut,
    DestinationIn,
    DestinationAtop,
}

impl Composite {
    /// Whether pixels outside the source are affected.
    fn is_unbounded(self) -> bool {
        matches!(self, Composite::DestinationIn | Composite::DestinationAtop)
    }

    #[inline]
    fn blend(self, dst: &mut Rgba32, src: Rgba32) {
        let (sa, da) = (src[3], dst[3]);
        for i in 0..4 {
            dst[i] = match self {
                Composite::SourceOver => src[i] + dst[i] * (1.0 - sa),
                Composite::DestinationOut => dst[i] * (1.0 - sa),
                Composite::DestinationIn => dst[i] * sa,
                Composite::DestinationAtop => src[i] * (1.0 - da) + dst[i] * sa,
            };
        }
    }
}

/// Premultiply a straight RGBA8 pixel.
#[inline]
pub fn premultiply(px: [u8; 4]) -> Rgba32 {
    let a = px[3] as f32 / 255.0;
    [
        px[0] as f32 / 255.0 * a,
        px[1] as f32 / 255.0 * a,
        px[2] as f32 / 255.0 * a,
        a,
    ]
}

/// Back to straight RGBA8.
#[inline]
pub fn unpremultiply(px: Rgba32) -> [u8; 4] {
    let a = px[3].clamp(0.0, 1.0);
    if a <= 0.0 {
        return [0, 0, 0, 0];
    }
    let q = |c: f32| ((c / a).clamp(0.0, 1.0) * 255.0).round() as u8;
    [q(px[0]), q(px[1]), q(px[2]), (a * 255.0).round() as u8]
}

/// A premultiplied RGBA float raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    image: Rgba32FImage,
}

impl Surface {
    /// A transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: Rgba32FImage::new(width, height),
        }
    }

    pub fn from_bitmap(bitmap: &Bitmap) -> Self {
        let mut surface = Self::new(bitmap.width, bitmap.height);
        for (dst, src) in surface
            .image
            .pixels_mut()
            .zip(bitmap.pixels.chunks_exact(4))
        {
            dst.0 = premultiply([src[0], src[1], src[2], src[3]]);
        }
        surface
    }

    pub fn to_bitmap(&self) -> Bitmap {
        let mut pixels = Vec::with_capacity(self.image.len());
        for px in self.image.pixels() {
            pixels.extend_from_slice(&unpremultiply(px.0));
        }
        Bitmap::new(self.width(), self.height(), pixels)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Rgba32 {
        self.image.get_pixel(x, y).0
    }

    /// An empty mask matching this surface.
    pub fn mask(&self) -> Mask {
        Mask::new(self.width(), self.height())
    }

    /// Paint a solid premultiplied color through `mask`.
    pub fn fill(&mut self, mask: &Mask, color: Rgba32, mode: Composite) {
        let (x0, y0, x1, y1) = if mode.is_unbounded() {
            (0, 0, self.width(), self.height())
        } else {
            match mask.bounds() {
                Some(b) => b,
                None => return,
            }
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let cov = mask.get(x, y);
                let src = color.map(|c| c * cov);
                mode.blend(&mut self.image.get_pixel_mut(x, y).0, src);
            }
        }
    }

    /// Composite a same-sized surface onto this one.
    pub fn draw(&mut self, source: &Surface, mode: Composite) {
        for (dst, src) in self.image.pixels_mut().zip(source.image.pixels()) {
            mode.blend(&mut dst.0, src.0);
        }
    }

    /// Keep this surface only where `mask` covers it.
    pub fn retain(&mut self, mask: &Mask) {
        self.fill(mask, [0.0, 0.0, 0.0, 1.0], Composite::DestinationIn);
    }

    /// Draw `source` with a per-pixel inverse mapping.
    ///
    /// `to_source` takes the center of a destination pixel and returns the
    /// matching point in source pixel coordinates. Sampling is bilinear and
    /// points outside the source are transparent.
    pub fn draw_mapped<F>(&mut self, source: &Surface, mode: Composite, to_source: F)
    where
        F: Fn(Point) -> Point,
    {
        for y in 0..self.height() {
            for x in 0..self.width() {
                let p = to_source([x as f64 + 0.5, y as f64 + 0.5]);
                let src = source.sample(p[0] - 0.5, p[1] - 0.5);
                if src[3] <= 0.0 && !mode.is_unbounded() {
                    continue;
                }
                mode.blend(&mut self.image.get_pixel_mut(x, y).0, src);
            }
        }
    }

    /// Draw `source` placed by `transform` (source pixels to surface pixels).
    pub fn draw_transformed(&mut self, source: &Surface, transform: &Affine, mode: Composite) {
        let Some(inverse) = transform.inverse() else {
            return;
        };
        self.draw_mapped(source, mode, |p| inverse.apply(p));
    }

    /// Bilinear sample at continuous pixel coordinates; pixel centers sit on integers.
    pub fn sample(&self, x: f64, y: f64) -> Rgba32 {
        let (w, h) = (self.width() as i64, self.height() as i64);
        if !(x.is_finite() && y.is_finite()) || x <= -1.0 || y <= -1.0 || x >= w as f64 || y >= h as f64 {
            return [0.0; 4];
        }
        let (x0, y0) = (x.floor() as i64, y.floor() as i64);
        let (fx, fy) = ((x - x0 as f64) as f32, (y - y0 as f64) as f32);
        let texel = |px: i64, py: i64| -> Rgba32 {
            if px < 0 || py < 0 || px >= w || py >= h {
                [0.0; 4]
            } else {
                self.image.get_pixel(px as u32, py as u32).0
            }
        };
        let (a, b) = (texel(x0, y0), texel(x0 + 1, y0));
        let (c, d) = (texel(x0, y0 + 1), texel(x0 + 1, y0 + 1));
        let mut out = [0.0; 4];
        for i in 0..4 {
            let top = a[i] + (b[i] - a[i]) * fx;
            let bottom = c[i] + (d[i] - c[i]) * fx;
            out[i] = top + (bottom - top) * fy;
        }
        out
    }

    /// Gaussian blur of the area `(x0, y0, x1, y1)` grown by three sigma.
    ///
    /// Returns a full-size surface that is transparent outside the blurred area.
    pub fn blurred(&self, sigma: f32, bounds: (u32, u32, u32, u32)) -> Surface {
        let margin = (sigma.max(0.0) * 3.0).ceil() as u32;
        let (x0, y0) = (bounds.0.saturating_sub(margin), bounds.1.saturating_sub(margin));
        let x1 = bounds.2.saturating_add(margin).min(self.width());
        let y1 = bounds.3.saturating_add(margin).min(self.height());
        let mut out = Surface::new(self.width(), self.height());
        if x1 <= x0 || y1 <= y0 {
            return out;
        }
        let region = imageops::crop_imm(&self.image, x0, y0, x1 - x0, y1 - y0).to_image();
        let blurred = if sigma > 0.0 {
            imageops::blur(&region, sigma)
        } else {
            region
        };
        imageops::replace(&mut out.image, &blurred, x0 as i64, y0 as i64);
        out
    }

    /// Fill every pixel with one premultiplied color.
    pub fn clear(&mut self, color: Rgba32) {
        for px in self.image.pixels_mut() {
            *px = Rgba(color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque(rgb: [u8; 3]) -> Rgba32 {
        premultiply([rgb[0], rgb[1], rgb[2], 255])
    }

    // ===== Conversion Tests =====

    #[test]
    fn test_bitmap_round_trip() {
        let mut pixels = Vec::new();
        for i in 0..16u8 {
            pixels.extend_from_slice(&[i * 16, 255 - i, i, 255]);
        }
        let bitmap = Bitmap::new(4, 4, pixels);
        assert_eq!(Surface::from_bitmap(&bitmap).to_bitmap(), bitmap);
    }

    #[test]
    fn test_transparent_pixels_unpremultiply_to_zero() {
        assert_eq!(unpremultiply([0.3, 0.2, 0.1, 0.0]), [0, 0, 0, 0]);
    }

    // ===== Composite Tests =====

    #[test]
    fn test_source_over_half_coverage() {
        let mut surface = Surface::new(2, 1);
        let mut mask = surface.mask();
        mask.raise(0, 0, 0.5);
        surface.fill(&mask, opaque([255, 0, 0]), Composite::SourceOver);
        assert_eq!(surface.pixel(0, 0), [0.5, 0.0, 0.0, 0.5]);
        assert_eq!(surface.pixel(1, 0), [0.0; 4]);
    }

    #[test]
    fn test_destination_out_erases() {
        let mut surface = Surface::new(2, 1);
        surface.clear(opaque([0, 0, 255]));
        let mut mask = surface.mask();
        mask.raise(1, 0, 1.0);
        surface.fill(&mask, [0.0, 0.0, 0.0, 1.0], Composite::DestinationOut);
        assert_eq!(surface.pixel(1, 0), [0.0; 4]);
        assert_eq!(surface.pixel(0, 0), opaque([0, 0, 255]));
    }

    #[test]
    fn test_retain_clears_outside_mask() {
        let mut surface = Surface::new(3, 1);
        surface.clear(opaque([255, 255, 255]));
        let mut mask = surface.mask();
        mask.raise(1, 0, 1.0);
        surface.retain(&mask);
        assert_eq!(surface.pixel(0, 0), [0.0; 4]);
        assert_eq!(surface.pixel(1, 0), [1.0; 4]);
    }

    #[test]
    fn test_destination_atop_puts_background_under() {
        let mut layer = Surface::new(2, 1);
        let mut mask = layer.mask();
        mask.raise(0, 0, 1.0);
        layer.fill(&mask, opaque([255, 0, 0]), Composite::SourceOver);

        let mut background = Surface::new(2, 1);
        background.clear(opaque([0, 0, 255]));
        layer.draw(&background, Composite::DestinationAtop);
        assert_eq!(layer.pixel(0, 0), opaque([255, 0, 0]));
        assert_eq!(layer.pixel(1, 0), opaque([0, 0, 255]));
    }

    // ===== Sampling Tests =====

    #[test]
    fn test_identity_draw_is_exact() {
        let bitmap = Bitmap::new(
            3,
            1,
            vec![10, 20, 30, 255, 40, 50, 60, 255, 70, 80, 90, 128],
        );
        let source = Surface::from_bitmap(&bitmap);
        let mut target = Surface::new(3, 1);
        target.draw_transformed(&source, &Affine::IDENTITY, Composite::SourceOver);
        assert_eq!(target.to_bitmap(), bitmap);
    }

    #[test]
    fn test_sample_outside_is_transparent() {
        let mut source = Surface::new(2, 2);
        source.clear([1.0; 4]);
        assert_eq!(source.sample(-5.0, 0.0), [0.0; 4]);
        assert_eq!(source.sample(0.0, f64::NAN), [0.0; 4]);
        let edge = source.sample(-0.5, 0.0);
        assert!((edge[3] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_translated_draw() {
        let mut source = Surface::new(1, 1);
        source.clear([1.0; 4]);
        let mut target = Surface::new(3, 3);
        target.draw_transformed(&source, &Affine::translation(2.0, 1.0), Composite::SourceOver);
        assert_eq!(target.pixel(2, 1), [1.0; 4]);
        assert_eq!(target.pixel(0, 0), [0.0; 4]);
    }

    // ===== Blur Tests =====

    #[test]
    fn test_blur_spreads_and_preserves_flat_areas() {
        let mut surface = Surface::new(21, 21);
        let mut mask = surface.mask();
        mask.raise(10, 10, 1.0);
        surface.fill(&mask, [1.0; 4], Composite::SourceOver);
        let blurred = surface.blurred(2.0, (10, 10, 11, 11));
        assert!(blurred.pixel(11, 10)[3] > 0.0);
        assert!(blurred.pixel(10, 10)[3] < 1.0);
        assert_eq!(blurred.pixel(0, 0), [0.0; 4]);
    }
}
