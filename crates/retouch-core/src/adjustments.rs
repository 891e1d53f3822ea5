//! Color adjustment parameters and the per-pixel stage chain.
//!
//! Eleven parameters drive ten stages that always run in the same order:
//!
//! 1. Sharpen
//! 2. Enhance
//! 3. Shadows / Highlights
//! 4. Contrast
//! 5. Fade
//! 6. Saturation
//! 7. Exposure (`brightness`)
//! 8. Warmth
//! 9. Grain
//! 10. Vignette
//!
//! Values are normalized slider positions. `enhance`, `fade`, `vignette`,
//! `grain` and `sharpen` are in [0, 1], the others in [-1, 1]. Zero is the
//! no-op for every stage, and a stage whose parameter is zero is skipped so
//! that neutral parameters reproduce the source exactly.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::color::{hsv_to_rgb, luma, rgb_to_hsv};
use crate::decode::Bitmap;
use crate::histogram::EqualizationTable;

/// Strength of the unsharp mask at `sharpen = 1`.
const SHARPEN_STRENGTH: f32 = 1.5;

/// Saturation multiplier applied by the enhance stage.
const ENHANCE_SATURATION: f32 = 1.2;

/// Luminance weights used by the shadows/highlights stage.
const HS_WEIGHT: f32 = 0.3;

/// Luminance weights for the saturation stage (BT.709).
const SAT_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Grain amplitude at `grain = 1`.
const GRAIN_SCALE: f32 = 0.08;

/// Grain lattice spacing in pixels.
const GRAIN_SIZE: f32 = 1.6;

/// Names of the pipeline parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjustment {
    Enhance,
    Brightness,
    Contrast,
    Saturation,
    Warmth,
    Fade,
    Highlights,
    Shadows,
    Vignette,
    Grain,
    Sharpen,
}

impl Adjustment {
    pub const ALL: [Adjustment; 11] = [
        Adjustment::Enhance,
        Adjustment::Brightness,
        Adjustment::Contrast,
        Adjustment::Saturation,
        Adjustment::Warmth,
        Adjustment::Fade,
        Adjustment::Highlights,
        Adjustment::Shadows,
        Adjustment::Vignette,
        Adjustment::Grain,
        Adjustment::Sharpen,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Adjustment::Enhance => "enhance",
            Adjustment::Brightness => "brightness",
            Adjustment::Contrast => "contrast",
            Adjustment::Saturation => "saturation",
            Adjustment::Warmth => "warmth",
            Adjustment::Fade => "fade",
            Adjustment::Highlights => "highlights",
            Adjustment::Shadows => "shadows",
            Adjustment::Vignette => "vignette",
            Adjustment::Grain => "grain",
            Adjustment::Sharpen => "sharpen",
        }
    }

    /// Accepted value range.
    pub fn range(self) -> (f32, f32) {
        match self {
            Adjustment::Enhance
            | Adjustment::Fade
            | Adjustment::Vignette
            | Adjustment::Grain
            | Adjustment::Sharpen => (0.0, 1.0),
            _ => (-1.0, 1.0),
        }
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Adjustment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Adjustment::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| format!("unknown adjustment: {s}"))
    }
}

/// The full parameter set. Serializes as an object with the eleven names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adjustments {
    pub enhance: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub warmth: f32,
    pub fade: f32,
    pub highlights: f32,
    pub shadows: f32,
    pub vignette: f32,
    pub grain: f32,
    pub sharpen: f32,
}

impl Adjustments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if all values are at their defaults
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn get(&self, adjustment: Adjustment) -> f32 {
        match adjustment {
            Adjustment::Enhance => self.enhance,
            Adjustment::Brightness => self.brightness,
            Adjustment::Contrast => self.contrast,
            Adjustment::Saturation => self.saturation,
            Adjustment::Warmth => self.warmth,
            Adjustment::Fade => self.fade,
            Adjustment::Highlights => self.highlights,
            Adjustment::Shadows => self.shadows,
            Adjustment::Vignette => self.vignette,
            Adjustment::Grain => self.grain,
            Adjustment::Sharpen => self.sharpen,
        }
    }

    /// Set a value, clamped to the parameter's range. Non-finite input is ignored.
    pub fn set(&mut self, adjustment: Adjustment, value: f32) {
        if !value.is_finite() {
            tracing::warn!(%adjustment, "ignoring non-finite adjustment value");
            return;
        }
        let (lo, hi) = adjustment.range();
        let value = value.clamp(lo, hi);
        let slot = match adjustment {
            Adjustment::Enhance => &mut self.enhance,
            Adjustment::Brightness => &mut self.brightness,
            Adjustment::Contrast => &mut self.contrast,
            Adjustment::Saturation => &mut self.saturation,
            Adjustment::Warmth => &mut self.warmth,
            Adjustment::Fade => &mut self.fade,
            Adjustment::Highlights => &mut self.highlights,
            Adjustment::Shadows => &mut self.shadows,
            Adjustment::Vignette => &mut self.vignette,
            Adjustment::Grain => &mut self.grain,
            Adjustment::Sharpen => &mut self.sharpen,
        };
        *slot = value;
    }

    /// Apply a partial update.
    pub fn merge(&mut self, partial: &[(Adjustment, f32)]) {
        for &(adjustment, value) in partial {
            self.set(adjustment, value);
        }
    }

    /// Build from a name → value map. Unknown names are skipped, missing ones stay 0.
    pub fn from_map(map: &HashMap<String, f32>) -> Self {
        let mut adjustments = Self::default();
        for (name, &value) in map {
            match name.parse::<Adjustment>() {
                Ok(adjustment) => adjustments.set(adjustment, value),
                Err(_) => tracing::warn!(name = %name, "unknown adjustment"),
            }
        }
        adjustments
    }
}

/// Run the stage chain over `source`, writing RGBA8 into `out`.
///
/// `out` must be the same length as `source.pixels`. Alpha is copied.
pub fn apply_adjustments(
    source: &Bitmap,
    table: &EqualizationTable,
    adjustments: &Adjustments,
    out: &mut [u8],
) {
    debug_assert_eq!(out.len(), source.pixels.len(), "Pixel buffer size mismatch");

    if adjustments.is_default() {
        out.copy_from_slice(&source.pixels);
        return;
    }

    let (w, h) = (source.width as usize, source.height as usize);
    let sharpen = adjustments.sharpen.clamp(0.0, 1.0);
    let fetch = |x: usize, y: usize| -> (f32, f32, f32) {
        let i = (y * w + x) * 4;
        (
            source.pixels[i] as f32 / 255.0,
            source.pixels[i + 1] as f32 / 255.0,
            source.pixels[i + 2] as f32 / 255.0,
        )
    };

    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) * 4;
            let u = (x as f32 + 0.5) / w as f32;
            let v = (y as f32 + 0.5) / h as f32;

            let mut rgb = fetch(x, y);
            if sharpen > 0.0 {
                let neighbors = [
                    fetch(x.saturating_sub(1), y),
                    fetch((x + 1).min(w - 1), y),
                    fetch(x, y.saturating_sub(1)),
                    fetch(x, (y + 1).min(h - 1)),
                ];
                rgb = apply_sharpen(rgb, &neighbors, sharpen);
            }
            rgb = apply_enhance(rgb, table, u, v, adjustments.enhance);
            rgb = apply_shadows_highlights(rgb, adjustments.shadows, adjustments.highlights);
            rgb = apply_contrast(rgb, adjustments.contrast);
            rgb = apply_fade(rgb, adjustments.fade);
            rgb = apply_saturation(rgb, adjustments.saturation);
            rgb = apply_exposure(rgb, adjustments.brightness);
            rgb = apply_warmth(rgb, adjustments.warmth);
            rgb = apply_grain(rgb, x as f32, y as f32, adjustments.grain);
            rgb = apply_vignette(rgb, u, v, adjustments.vignette);

            out[i] = quantize(rgb.0);
            out[i + 1] = quantize(rgb.1);
            out[i + 2] = quantize(rgb.2);
            out[i + 3] = source.pixels[i + 3];
        }
    }
}

#[inline]
fn quantize(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[inline]
fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
fn mix3(a: (f32, f32, f32), b: (f32, f32, f32), t: f32) -> (f32, f32, f32) {
    (mix(a.0, b.0, t), mix(a.1, b.1, t), mix(a.2, b.2, t))
}

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Unsharp mask against the 4-neighbor average.
#[inline]
fn apply_sharpen(
    (r, g, b): (f32, f32, f32),
    neighbors: &[(f32, f32, f32); 4],
    amount: f32,
) -> (f32, f32, f32) {
    let k = amount * SHARPEN_STRENGTH;
    let avg = |pick: fn(&(f32, f32, f32)) -> f32| neighbors.iter().map(pick).sum::<f32>() * 0.25;
    (
        r + (r - avg(|n| n.0)) * k,
        g + (g - avg(|n| n.1)) * k,
        b + (b - avg(|n| n.2)) * k,
    )
}

/// Replace value with the tile-equalized value, boost saturation, mix by amount.
#[inline]
fn apply_enhance(
    rgb: (f32, f32, f32),
    table: &EqualizationTable,
    u: f32,
    v: f32,
    amount: f32,
) -> (f32, f32, f32) {
    if amount == 0.0 {
        return rgb;
    }
    let [hue, sat, value] = rgb_to_hsv([rgb.0.clamp(0.0, 1.0), rgb.1.clamp(0.0, 1.0), rgb.2.clamp(0.0, 1.0)]);
    let equalized = table.equalize(value, u, v);
    let [r, g, b] = hsv_to_rgb([hue, (sat * ENHANCE_SATURATION).min(1.0), equalized]);
    mix3(rgb, (r, g, b), amount)
}

/// Power-curve shadow lift and highlight recovery.
///
/// Parameters map to `1 + shadows * 0.55` and `1 + highlights * 0.75`, where
/// 1 leaves the image untouched.
#[inline]
fn apply_shadows_highlights(rgb: (f32, f32, f32), shadows: f32, highlights: f32) -> (f32, f32, f32) {
    if shadows == 0.0 && highlights == 0.0 {
        return rgb;
    }
    let s = 1.0 + shadows * 0.55;
    let h = 1.0 + highlights * 0.75;

    let l = ((rgb.0 + rgb.1 + rgb.2) * HS_WEIGHT).clamp(0.0, 1.0);
    let shadow = (l.powf(1.0 / s) - 0.76 * l.powf(2.0 / s) - l).clamp(0.0, 1.0);
    let inv = 1.0 - l;
    let he = 2.0 - h;
    let highlight = (1.0 - (inv.powf(1.0 / he) - 0.8 * inv.powf(2.0 / he)) - l).clamp(-1.0, 0.0);

    let mut out = if l > 0.0 {
        let gain = (l + shadow + highlight) / l;
        (rgb.0 * gain, rgb.1 * gain, rgb.2 * gain)
    } else {
        rgb
    };

    let contrasted = ((l - 0.5) * 1.5 + 0.5).clamp(0.0, 1.0);
    let white = contrasted.powi(3) * (h.clamp(1.0, 2.0) - 1.0);
    out = mix3(out, (1.0, 1.0, 1.0), white);
    let black = (1.0 - contrasted).powi(3) * (1.0 - s.clamp(0.0, 1.0));
    mix3(out, (0.0, 0.0, 0.0), black)
}

/// Linear contrast around mid-gray.
#[inline]
fn apply_contrast((r, g, b): (f32, f32, f32), contrast: f32) -> (f32, f32, f32) {
    if contrast == 0.0 {
        return (r, g, b);
    }
    let factor = 1.0 + contrast * 0.3;
    let pivot = |c: f32| ((c - 0.5) * factor + 0.5).clamp(0.0, 1.0);
    (pivot(r), pivot(g), pivot(b))
}

/// Blend toward a lifted, partially desaturated film curve.
#[inline]
fn apply_fade((r, g, b): (f32, f32, f32), fade: f32) -> (f32, f32, f32) {
    if fade == 0.0 {
        return (r, g, b);
    }
    let curve = |c: f32| {
        c + (-0.9772 * c * c * c + 1.708 * c * c - 0.1603 * c + 0.2878 - 0.9 * c)
    };
    let faded = (curve(r), curve(g), curve(b));
    let gray = luma(faded.0, faded.1, faded.2);
    let faded = mix3(faded, (gray, gray, gray), 0.25);
    mix3((r, g, b), faded, fade)
}

/// Scale distance from grayscale.
#[inline]
fn apply_saturation((r, g, b): (f32, f32, f32), saturation: f32) -> (f32, f32, f32) {
    if saturation == 0.0 {
        return (r, g, b);
    }
    let amount = if saturation > 0.0 {
        1.0 + saturation * 1.05
    } else {
        1.0 + saturation
    };
    let gray = SAT_WEIGHTS[0] * r + SAT_WEIGHTS[1] * g + SAT_WEIGHTS[2] * b;
    let sat = |c: f32| mix(gray, c, amount).clamp(0.0, 1.0);
    (sat(r), sat(g), sat(b))
}

/// Power curve on the inverted channel, `1 - (1 - c)^p`.
#[inline]
fn apply_exposure((r, g, b): (f32, f32, f32), brightness: f32) -> (f32, f32, f32) {
    if brightness == 0.0 {
        return (r, g, b);
    }
    let magnitude = brightness * 1.045;
    let mut power = 1.0 + magnitude.abs();
    if magnitude < 0.0 {
        power = 1.0 / power;
    }
    let expose = |c: f32| 1.0 - (1.0 - c.clamp(0.0, 1.0)).powf(power);
    (expose(r), expose(g), expose(b))
}

/// Shift chroma in YUV, strongest in midtones.
#[inline]
fn apply_warmth((r, g, b): (f32, f32, f32), warmth: f32) -> (f32, f32, f32) {
    if warmth == 0.0 {
        return (r, g, b);
    }
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let mut u = -0.14713 * r - 0.28886 * g + 0.436 * b;
    let mut v = 0.615 * r - 0.51499 * g - 0.10001 * b;

    let shift = if warmth > 0.0 {
        [0.1765, -0.1255, 0.0902]
    } else {
        [-0.0588, -0.1569, 0.1255]
    };
    let k = 0.375 * warmth * (y.clamp(0.0, 1.0) * PI).sin();
    let y = y + shift[0] * k;
    u += shift[1] * k;
    v += shift[2] * k;

    (
        y + 1.13983 * v,
        y - 0.39465 * u - 0.5806 * v,
        y + 2.03211 * u,
    )
}

/// Monochrome value noise, faded out in deep shadows and highlights.
#[inline]
fn apply_grain((r, g, b): (f32, f32, f32), x: f32, y: f32, grain: f32) -> (f32, f32, f32) {
    if grain == 0.0 {
        return (r, g, b);
    }
    let lum = luma(r, g, b).clamp(0.0, 1.0);
    let attenuation = (smoothstep(0.2, 0.0, lum) + lum).powi(4).clamp(0.0, 1.0);
    let n = value_noise(x / GRAIN_SIZE, y / GRAIN_SIZE) * (1.0 - attenuation) * grain * GRAIN_SCALE;
    (r + n, g + n, b + n)
}

/// Radial darkening toward the corners.
#[inline]
fn apply_vignette((r, g, b): (f32, f32, f32), u: f32, v: f32, vignette: f32) -> (f32, f32, f32) {
    if vignette == 0.0 {
        return (r, g, b);
    }
    let dist = (u - 0.5).hypot(v - 0.5) / 0.5f32.sqrt();
    let magnitude = ease_in_out_sigmoid(dist * 0.7, 0.62) * vignette * 0.645;
    let gamma = 1.0 / (1.0 - magnitude);
    let darken = magnitude * magnitude;
    let vig = |c: f32| mix(c.clamp(0.0, 1.0).powf(gamma), 0.0, darken);
    (vig(r), vig(g), vig(b))
}

fn ease_in_out_sigmoid(value: f32, strength: f32) -> f32 {
    let t = 1.0 / (1.0 - strength);
    if value > 0.5 {
        1.0 - (2.0 - 2.0 * value).max(0.0).powf(t) * 0.5
    } else {
        (2.0 * value).max(0.0).powf(t) * 0.5
    }
}

/// Lattice hash in [-1, 1].
fn hash(x: i32, y: i32) -> f32 {
    let mut h = (x as u32).wrapping_mul(0x8DA6_B343) ^ (y as u32).wrapping_mul(0xD816_3841);
    h ^= h >> 13;
    h = h.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 16;
    (h as f32 / u32::MAX as f32) * 2.0 - 1.0
}

/// Smoothly interpolated lattice noise in [-1, 1].
fn value_noise(x: f32, y: f32) -> f32 {
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (sx, sy) = (fx * fx * (3.0 - 2.0 * fx), fy * fy * (3.0 - 2.0 * fy));
    let (ix, iy) = (x0 as i32, y0 as i32);
    let top = mix(hash(ix, iy), hash(ix + 1, iy), sx);
    let bottom = mix(hash(ix, iy + 1), hash(ix + 1, iy + 1), sx);
    mix(top, bottom, sy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(width: u32, height: u32, value: u8) -> Bitmap {
        Bitmap::filled(width, height, [value, value, value, 255])
    }

    fn run(source: &Bitmap, adj: &Adjustments) -> Vec<u8> {
        let table = EqualizationTable::compute(source);
        let mut out = vec![0; source.pixels.len()];
        apply_adjustments(source, &table, adj, &mut out);
        out
    }

    fn single(adjustment: Adjustment, value: f32) -> Adjustments {
        let mut adj = Adjustments::default();
        adj.set(adjustment, value);
        adj
    }

    fn varied(width: u32, height: u32) -> Bitmap {
        let mut pixels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[
                    (x * 255 / width) as u8,
                    (y * 255 / height) as u8,
                    ((x + y) * 97 % 256) as u8,
                    200,
                ]);
            }
        }
        Bitmap::new(width, height, pixels)
    }

    // ===== Parameter Tests =====

    #[test]
    fn test_names_round_trip() {
        for adjustment in Adjustment::ALL {
            assert_eq!(adjustment.name().parse::<Adjustment>().unwrap(), adjustment);
        }
        assert!("exposure".parse::<Adjustment>().is_err());
    }

    #[test]
    fn test_serializes_eleven_keys() {
        let value = serde_json::to_value(Adjustments::default()).unwrap();
        let map = value.as_object().unwrap();
        assert_eq!(map.len(), 11);
        for adjustment in Adjustment::ALL {
            assert!(map.contains_key(adjustment.name()));
        }
    }

    #[test]
    fn test_missing_keys_default_to_zero() {
        let adj: Adjustments = serde_json::from_str(r#"{"contrast": 0.5}"#).unwrap();
        assert_eq!(adj.contrast, 0.5);
        assert_eq!(adj.brightness, 0.0);
    }

    #[test]
    fn test_set_clamps_to_range() {
        let mut adj = Adjustments::default();
        adj.set(Adjustment::Grain, -0.5);
        adj.set(Adjustment::Contrast, 3.0);
        adj.set(Adjustment::Fade, f32::NAN);
        assert_eq!(adj.grain, 0.0);
        assert_eq!(adj.contrast, 1.0);
        assert_eq!(adj.fade, 0.0);
    }

    #[test]
    fn test_from_map_ignores_unknown() {
        let mut map = HashMap::new();
        map.insert("warmth".to_string(), 0.25);
        map.insert("bogus".to_string(), 1.0);
        let adj = Adjustments::from_map(&map);
        assert_eq!(adj.warmth, 0.25);
        assert_eq!(adj.get(Adjustment::Sharpen), 0.0);
    }

    // ===== Identity Tests =====

    #[test]
    fn test_identity_no_adjustments() {
        let source = varied(16, 12);
        assert_eq!(run(&source, &Adjustments::default()), source.pixels);
    }

    #[test]
    fn test_zero_stages_are_exact_when_others_active() {
        // contrast only touches the pixels through contrast
        let source = gray(4, 4, 128);
        let out = run(&source, &single(Adjustment::Contrast, 0.0001));
        for px in out.chunks_exact(4) {
            assert!((px[0] as i32 - 128).abs() <= 1);
        }
    }

    #[test]
    fn test_alpha_is_preserved() {
        let source = varied(8, 8);
        let out = run(&source, &single(Adjustment::Brightness, 0.7));
        assert!(out.chunks_exact(4).all(|p| p[3] == 200));
    }

    // ===== Stage Tests =====

    #[test]
    fn test_brightness_direction() {
        let source = gray(2, 2, 100);
        assert!(run(&source, &single(Adjustment::Brightness, 0.5))[0] > 100);
        assert!(run(&source, &single(Adjustment::Brightness, -0.5))[0] < 100);
    }

    #[test]
    fn test_contrast_spreads_from_midpoint() {
        let mut source = gray(2, 1, 64);
        source.pixels[4..7].copy_from_slice(&[192, 192, 192]);
        let out = run(&source, &single(Adjustment::Contrast, 1.0));
        assert!(out[0] < 64);
        assert!(out[4] > 192);
    }

    #[test]
    fn test_saturation_negative_makes_gray() {
        let source = Bitmap::filled(2, 2, [200, 50, 50, 255]);
        let out = run(&source, &single(Adjustment::Saturation, -1.0));
        assert_eq!(out[0], out[1]);
        assert_eq!(out[1], out[2]);
    }

    #[test]
    fn test_saturation_positive_spreads_channels() {
        let source = Bitmap::filled(2, 2, [150, 100, 100, 255]);
        let out = run(&source, &single(Adjustment::Saturation, 0.5));
        assert!(out[0] as i32 - out[1] as i32 > 50);
    }

    #[test]
    fn test_warmth_direction() {
        let source = gray(2, 2, 128);
        let warm = run(&source, &single(Adjustment::Warmth, 1.0));
        let cool = run(&source, &single(Adjustment::Warmth, -1.0));
        assert!(warm[0] > warm[2], "warm should push red over blue");
        assert!(cool[2] > cool[0], "cool should push blue over red");
    }

    #[test]
    fn test_warmth_no_effect_at_black() {
        let source = gray(2, 2, 0);
        assert_eq!(run(&source, &single(Adjustment::Warmth, 1.0)), source.pixels);
    }

    #[test]
    fn test_fade_lifts_blacks() {
        let source = gray(2, 2, 0);
        assert!(run(&source, &single(Adjustment::Fade, 1.0))[0] > 40);
    }

    #[test]
    fn test_shadows_lift_dark_pixels() {
        let source = gray(2, 2, 50);
        assert!(run(&source, &single(Adjustment::Shadows, 1.0))[0] > 50);
        assert!(run(&source, &single(Adjustment::Shadows, -1.0))[0] < 50);
    }

    #[test]
    fn test_highlights_push_bright_pixels() {
        let source = gray(2, 2, 210);
        assert!(run(&source, &single(Adjustment::Highlights, 1.0))[0] > 210);
    }

    #[test]
    fn test_vignette_darkens_corners_more_than_center() {
        let source = gray(21, 21, 180);
        let out = run(&source, &single(Adjustment::Vignette, 1.0));
        let center = out[(10 * 21 + 10) * 4];
        let corner = out[0];
        assert!(corner < center);
        assert!(center >= 170);
    }

    #[test]
    fn test_grain_varies_midtones() {
        let source = gray(16, 16, 128);
        let out = run(&source, &single(Adjustment::Grain, 1.0));
        let first = out[0];
        assert!(out.chunks_exact(4).any(|p| p[0] != first));
        assert!(out.chunks_exact(4).all(|p| (p[0] as i32 - 128).abs() <= 25));
    }

    #[test]
    fn test_grain_is_deterministic() {
        let source = gray(8, 8, 128);
        let adj = single(Adjustment::Grain, 0.6);
        assert_eq!(run(&source, &adj), run(&source, &adj));
    }

    #[test]
    fn test_sharpen_flat_image_unchanged() {
        let source = gray(6, 6, 90);
        assert_eq!(run(&source, &single(Adjustment::Sharpen, 1.0)), source.pixels);
    }

    #[test]
    fn test_sharpen_increases_edge_contrast() {
        let mut pixels = Vec::new();
        for _y in 0..3 {
            for x in 0..4 {
                let v = if x < 2 { 80 } else { 160 };
                pixels.extend_from_slice(&[v, v, v, 255]);
            }
        }
        let source = Bitmap::new(4, 3, pixels);
        let out = run(&source, &single(Adjustment::Sharpen, 1.0));
        assert!(out[4] < 80);
        assert!(out[8] > 160);
    }

    #[test]
    fn test_enhance_stays_in_range_and_changes_image() {
        let source = varied(32, 32);
        let out = run(&source, &single(Adjustment::Enhance, 1.0));
        assert_ne!(out, source.pixels);
    }

    #[test]
    fn test_extreme_values_dont_crash() {
        let source = varied(10, 10);
        let mut adj = Adjustments::default();
        for adjustment in Adjustment::ALL {
            adj.set(adjustment, 1.0);
        }
        run(&source, &adj);
        for adjustment in Adjustment::ALL {
            adj.set(adjustment, -1.0);
        }
        run(&source, &adj);
    }

    // ===== Helper Tests =====

    #[test]
    fn test_value_noise_range() {
        for i in 0..200 {
            let n = value_noise(i as f32 * 0.37, i as f32 * 0.91);
            assert!((-1.0..=1.0).contains(&n));
        }
    }

    #[test]
    fn test_ease_in_out_sigmoid_endpoints() {
        assert_eq!(ease_in_out_sigmoid(0.0, 0.62), 0.0);
        assert!((ease_in_out_sigmoid(0.5, 0.62) - 0.5).abs() < 1e-6);
        assert!((ease_in_out_sigmoid(1.0, 0.62) - 1.0).abs() < 1e-6);
    }
}
