//! Tiled, contrast-limited histogram equalization (CLAHE).
//!
//! The source image is split into a 4×4 grid of tiles. Each tile gets its own
//! clipped cumulative distribution, and the whole set is packed into a small
//! RGBA8 table (256 columns, one row per tile) that the enhance stage of the
//! adjustment pipeline samples with bilinear blending between tiles.
//!
//! The table is computed once per loaded image.

use crate::color::{LUMA_B, LUMA_G, LUMA_R};
use crate::decode::Bitmap;

/// Histogram bins per tile.
pub const BINS: usize = 256;

/// Tiles along each axis.
pub const TILE_GRID: usize = 4;

/// Number of rows in the table.
pub const TILE_COUNT: usize = TILE_GRID * TILE_GRID;

/// Clip limit relative to a perfectly flat histogram.
const CLIP_FACTOR: f64 = 1.25;

/// Per-tile equalization curves, one RGBA8 row per tile.
///
/// Column `bin` of row `tile` holds `(equalized, cdf_min, cdf_max, 255)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualizationTable {
    data: Vec<u8>,
}

impl EqualizationTable {
    /// Build the table from an RGBA8 bitmap.
    pub fn compute(bitmap: &Bitmap) -> Self {
        Self::from_rgba(&bitmap.pixels, bitmap.width, bitmap.height)
    }

    /// Build the table from RGBA8 pixels (4 bytes per pixel, row-major).
    pub fn from_rgba(pixels: &[u8], width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        debug_assert!(
            pixels.len() >= w * h * 4,
            "Pixel data size mismatch. Expected {}, got {}",
            w * h * 4,
            pixels.len()
        );

        let mut data = vec![0u8; BINS * TILE_COUNT * 4];
        for ty in 0..TILE_GRID {
            let (y0, y1) = tile_bounds(ty, h);
            for tx in 0..TILE_GRID {
                let (x0, x1) = tile_bounds(tx, w);
                let mut hist = [0u32; BINS];
                for y in y0..y1 {
                    let row = &pixels[(y * w + x0) * 4..(y * w + x1) * 4];
                    for px in row.chunks_exact(4) {
                        hist[luma_bin(px[0], px[1], px[2])] += 1;
                    }
                }
                let area = ((x1 - x0) * (y1 - y0)) as u32;
                let offset = (ty * TILE_GRID + tx) * BINS * 4;
                write_tile_row(&mut data[offset..offset + BINS * 4], &mut hist, area);
            }
        }
        Self { data }
    }

    /// Raw RGBA8 bytes, `256 × 16` texels.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        BINS as u32
    }

    pub fn height(&self) -> u32 {
        TILE_COUNT as u32
    }

    /// `(equalized, cdf_min, cdf_max, 255)` for a tile and bin.
    pub fn entry(&self, tile: usize, bin: usize) -> [u8; 4] {
        let i = (tile * BINS + bin) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Equalize a normalized value at normalized image position `(u, v)`.
    ///
    /// Blends the four nearest tile curves bilinearly. A tile whose curve is
    /// flat (`cdf_max <= cdf_min`) leaves the value unchanged.
    pub fn equalize(&self, value: f32, u: f32, v: f32) -> f32 {
        let bin = (value.clamp(0.0, 1.0) * 255.0).round() as usize;
        let (tx, fx) = tile_coordinate(u);
        let (ty, fy) = tile_coordinate(v);

        let sample = |x: usize, y: usize| {
            let [eq, min, max, _] = self.entry(y * TILE_GRID + x, bin);
            if max <= min {
                value
            } else {
                ((eq as f32 - min as f32) / (max as f32 - min as f32)).clamp(0.0, 1.0)
            }
        };

        let top = lerp(sample(tx, ty), sample(tx + 1, ty), fx);
        let bottom = lerp(sample(tx, ty + 1), sample(tx + 1, ty + 1), fx);
        lerp(top, bottom, fy)
    }
}

/// Start and end of tile `index` along an axis of length `dim`.
fn tile_bounds(index: usize, dim: usize) -> (usize, usize) {
    let edge = |i: usize| ((i * dim) as f64 / TILE_GRID as f64).round() as usize;
    let start = edge(index).min(dim);
    let end = if index + 1 == TILE_GRID {
        dim
    } else {
        edge(index + 1).min(dim)
    };
    (start, end.max(start))
}

/// Left tile index and blend factor for a normalized coordinate.
fn tile_coordinate(t: f32) -> (usize, f32) {
    let half = 0.5 / TILE_GRID as f32;
    let c = (t.clamp(half, 1.0 - half) - half) * TILE_GRID as f32;
    let index = (c.floor() as usize).min(TILE_GRID - 2);
    (index, c - index as f32)
}

#[inline]
fn luma_bin(r: u8, g: u8, b: u8) -> usize {
    let l = LUMA_R * r as f32 + LUMA_G * g as f32 + LUMA_B * b as f32;
    l.round().clamp(0.0, 255.0) as usize
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Clip, redistribute and accumulate one tile's histogram into `row`.
fn write_tile_row(row: &mut [u8], hist: &mut [u32; BINS], area: u32) {
    if area == 0 {
        for (bin, texel) in row.chunks_exact_mut(4).enumerate() {
            texel.copy_from_slice(&[bin as u8, 0, 255, 255]);
        }
        return;
    }

    let limit = ((CLIP_FACTOR * area as f64 / BINS as f64).floor() as u32).max(1);
    let mut clipped = 0u32;
    for count in hist.iter_mut() {
        if *count > limit {
            clipped += *count - limit;
            *count = limit;
        }
    }
    let batch = clipped / BINS as u32;
    let residual = (clipped % BINS as u32) as usize;
    for (bin, count) in hist.iter_mut().enumerate() {
        *count += batch + u32::from(bin < residual);
    }

    let h_min = hist.iter().position(|&c| c > 0).unwrap_or(0);
    let mut cdf = [0u8; BINS];
    let mut running = 0u64;
    for bin in h_min..BINS {
        running += hist[bin] as u64;
        cdf[bin] = (running * 255 / area as u64).min(255) as u8;
    }

    let (cdf_min, cdf_max) = (cdf[h_min], cdf[BINS - 1]);
    for (bin, texel) in row.chunks_exact_mut(4).enumerate() {
        texel.copy_from_slice(&[cdf[bin], cdf_min, cdf_max, 255]);
    }
}
