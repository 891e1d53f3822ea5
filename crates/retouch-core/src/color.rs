//! Color values and color-space math shared by the pipeline and the overlays.
//!
//! Overlay colors are plain sRGB triples that travel through the saved session
//! as `"#RRGGBB"` strings. Manual color input coming from the host is accepted
//! only in two textual forms, both checked by pattern before anything is
//! applied:
//!
//! - hex: `#FE4438`
//! - comma separated components: `254, 68, 56`

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// BT.601 weight of the red channel.
pub const LUMA_R: f32 = 0.299;

/// BT.601 weight of the green channel.
pub const LUMA_G: f32 = 0.587;

/// BT.601 weight of the blue channel.
pub const LUMA_B: f32 = 0.114;

static HEX_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap());

static RGB_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*$").unwrap());

/// Swatches offered for overlays.
pub const PALETTE: [Color; 8] = [
    Color::rgb(0xFF, 0xFF, 0xFF),
    Color::rgb(0xFE, 0x44, 0x38),
    Color::rgb(0xFF, 0x89, 0x01),
    Color::rgb(0xFF, 0xD6, 0x0A),
    Color::rgb(0x33, 0xC7, 0x59),
    Color::rgb(0x62, 0xE5, 0xE0),
    Color::rgb(0x0A, 0x84, 0xFF),
    Color::rgb(0xBD, 0x5C, 0xF3),
];

/// Rejected color input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("Malformed color: {0:?}")]
    Malformed(String),
}

/// Luma of normalized RGB.
#[inline]
pub fn luma(r: f32, g: f32, b: f32) -> f32 {
    LUMA_R * r + LUMA_G * g + LUMA_B * b
}

/// Luma of u8 RGB, on the 0..=255 scale.
#[inline]
pub fn luma_u8(r: u8, g: u8, b: u8) -> f32 {
    luma(r as f32, g as f32, b as f32)
}

/// An opaque sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB`. Anything else is rejected.
    pub fn parse_hex(input: &str) -> Result<Self, ColorError> {
        if !HEX_PATTERN.is_match(input) {
            return Err(ColorError::Malformed(input.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&input[range], 16).map_err(|_| ColorError::Malformed(input.to_string()))
        };
        Ok(Self::rgb(channel(1..3)?, channel(3..5)?, channel(5..7)?))
    }

    /// Parse `r, g, b` decimal text. Components above 255 saturate.
    pub fn parse_rgb_text(input: &str) -> Result<Self, ColorError> {
        let caps = RGB_PATTERN
            .captures(input)
            .ok_or_else(|| ColorError::Malformed(input.to_string()))?;
        // digits only, so the parse can fail only on overflow
        let component = |i: usize| {
            caps[i]
                .parse::<u32>()
                .map_or(u8::MAX, |v| v.min(u8::MAX as u32) as u8)
        };
        Ok(Self::rgb(component(1), component(2), component(3)))
    }

    /// Parse either accepted textual form.
    pub fn parse(input: &str) -> Result<Self, ColorError> {
        Self::parse_hex(input).or_else(|_| Self::parse_rgb_text(input))
    }

    /// `#RRGGBB`, uppercase.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn luma(&self) -> f32 {
        luma_u8(self.r, self.g, self.b)
    }

    /// Color used for text drawn over, or outlines drawn around, this color.
    pub fn contrast(&self) -> Color {
        if self.luma() < 128.0 {
            Color::WHITE
        } else if *self == Color::WHITE {
            Color::BLACK
        } else {
            let dim = |c: u8| (c as f32 * 0.2).round() as u8;
            Color::rgb(dim(self.r), dim(self.g), dim(self.b))
        }
    }

    /// Add `amount` to every channel, saturating at 255.
    pub fn lightened(&self, amount: u8) -> Color {
        Color::rgb(
            self.r.saturating_add(amount),
            self.g.saturating_add(amount),
            self.b.saturating_add(amount),
        )
    }

    /// Normalized channels with the given alpha.
    pub fn to_rgba_f32(&self, alpha: f32) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            alpha,
        ]
    }

    /// Hue in degrees, saturation and value in [0, 1].
    pub fn to_hsv(&self) -> [f32; 3] {
        let [r, g, b, _] = self.to_rgba_f32(1.0);
        rgb_to_hsv([r, g, b])
    }

    pub fn from_hsv(hsv: [f32; 3]) -> Color {
        let [r, g, b] = hsv_to_rgb(hsv);
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Color::rgb(q(r), q(g), q(b))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl TryFrom<String> for Color {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse_hex(&value)
    }
}

/// RGB in [0, 1] to HSV with hue in degrees.
pub fn rgb_to_hsv([r, g, b]: [f32; 3]) -> [f32; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta <= 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max > 0.0 { delta / max } else { 0.0 };
    [hue, saturation, max]
}

/// HSV with hue in degrees to RGB in [0, 1].
pub fn hsv_to_rgb([h, s, v]: [f32; 3]) -> [f32; 3] {
    let c = v * s;
    let hp = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - ((hp % 2.0) - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    [r + m, g + m, b + m]
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== Parsing Tests =====

    #[test]
    fn test_parse_hex_accepts_both_cases() {
        assert_eq!(Color::parse_hex("#FE4438").unwrap(), Color::rgb(254, 68, 56));
        assert_eq!(Color::parse_hex("#fe4438").unwrap(), Color::rgb(254, 68, 56));
    }

    #[test]
    fn test_parse_hex_rejects_malformed() {
        for bad in ["FE4438", "#FE443", "#FE44388", "#GG0000", " #FE4438", ""] {
            assert!(Color::parse_hex(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_parse_rgb_text() {
        assert_eq!(Color::parse_rgb_text("10, 20,30").unwrap(), Color::rgb(10, 20, 30));
        assert_eq!(Color::parse_rgb_text(" 300 ,0,0 ").unwrap(), Color::rgb(255, 0, 0));
        assert_eq!(
            Color::parse_rgb_text("99999999999999999999,1,2").unwrap(),
            Color::rgb(255, 1, 2)
        );
    }

    #[test]
    fn test_parse_rgb_text_rejects_malformed() {
        for bad in ["10,20", "a,b,c", "1,2,3,4", "-1,2,3", "1.5,2,3"] {
            assert!(Color::parse_rgb_text(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_hex_round_trip_is_uppercase() {
        let color = Color::parse("#bd5cf3").unwrap();
        assert_eq!(color.to_hex(), "#BD5CF3");
        assert_eq!(color.to_string(), "#BD5CF3");
    }

    #[test]
    fn test_serde_uses_hex_string() {
        let json = serde_json::to_string(&Color::rgb(255, 137, 1)).unwrap();
        assert_eq!(json, "\"#FF8901\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::rgb(255, 137, 1));
        assert!(serde_json::from_str::<Color>("\"red\"").is_err());
    }

    // ===== Contrast Tests =====

    #[test]
    fn test_contrast_dark_gets_white() {
        assert_eq!(Color::rgb(10, 10, 80).contrast(), Color::WHITE);
    }

    #[test]
    fn test_contrast_white_gets_black() {
        assert_eq!(Color::WHITE.contrast(), Color::BLACK);
    }

    #[test]
    fn test_contrast_light_gets_dimmed_tone() {
        assert_eq!(Color::rgb(255, 214, 10).contrast(), Color::rgb(51, 43, 2));
    }

    #[test]
    fn test_lightened_saturates() {
        assert_eq!(Color::rgb(98, 229, 224).lightened(100), Color::rgb(198, 255, 255));
    }

    // ===== HSV Tests =====

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(rgb_to_hsv([1.0, 0.0, 0.0]), [0.0, 1.0, 1.0]);
        assert_eq!(rgb_to_hsv([0.0, 1.0, 0.0]), [120.0, 1.0, 1.0]);
        assert_eq!(rgb_to_hsv([0.0, 0.0, 1.0]), [240.0, 1.0, 1.0]);
    }

    #[test]
    fn test_hsv_round_trip_palette() {
        for color in PALETTE {
            assert_eq!(Color::from_hsv(color.to_hsv()), color);
        }
    }

    #[test]
    fn test_gray_has_no_saturation() {
        let [_, s, v] = rgb_to_hsv([0.5, 0.5, 0.5]);
        assert_eq!(s, 0.0);
        assert_eq!(v, 0.5);
    }
}
