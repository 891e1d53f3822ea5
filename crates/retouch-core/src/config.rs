//! Editor tuning: layout padding, interaction radii, timers and stroke fitting.
//!
//! All fields have defaults, so a host can pass a partial JSON object:
//!
//! ```json
//! {"debounce_ms": 500, "source_premirrored": true}
//! ```

use serde::{Deserialize, Serialize};

use crate::overlay::StrokeFit;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Horizontal and vertical room left around the image in crop mode.
    pub crop_padding: [f64; 2],
    /// Upward shift of the view center in crop mode.
    pub crop_offset_y: f64,
    /// Handle capture radius in image pixels.
    pub handle_radius: f64,
    pub snap_distance: f64,
    pub debounce_ms: f64,
    /// Crop animation progress per tick.
    pub animation_step: f64,
    pub animation_interval_ms: f64,
    pub max_stroke_points: usize,
    pub simplify_epsilon: f64,
    pub stroke_fit_error: f64,
    pub brush_fit_error: f64,
    pub arrow_fit_error: f64,
    /// Straight arrow terminal, in stroke widths.
    pub arrow_head_factor: f64,
    /// Largest initial sticker side.
    pub sticker_max_size: f64,
    /// Initial sticker side relative to the smaller crop side.
    pub sticker_crop_fraction: f64,
    /// The source bitmap is already mirrored; `flip` then undoes the mirror.
    pub source_premirrored: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            crop_padding: [120.0, 180.0],
            crop_offset_y: 30.0,
            handle_radius: 5.0,
            snap_distance: 10.0,
            debounce_ms: 1000.0,
            animation_step: 0.1,
            animation_interval_ms: 16.0,
            max_stroke_points: 500,
            simplify_epsilon: 0.07,
            stroke_fit_error: 5.0,
            brush_fit_error: 3.0,
            arrow_fit_error: 15.0,
            arrow_head_factor: 3.5,
            sticker_max_size: 256.0,
            sticker_crop_fraction: 0.3,
            source_premirrored: false,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Tolerances for finishing strokes.
    pub fn stroke_fit(&self) -> StrokeFit {
        StrokeFit {
            epsilon: self.simplify_epsilon,
            max_points: self.max_stroke_points,
            fit_error: self.stroke_fit_error,
            brush_fit_error: self.brush_fit_error,
            arrow_fit_error: self.arrow_fit_error,
            arrow_head_factor: self.arrow_head_factor,
        }
    }

    /// Whether the background is drawn mirrored for the given flip flag.
    pub fn mirrored(&self, flip: bool) -> bool {
        flip ^ self.source_premirrored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EditorConfig::from_json(r#"{"debounce_ms": 250}"#).unwrap();
        assert_eq!(config.debounce_ms, 250.0);
        assert_eq!(config.crop_padding, [120.0, 180.0]);
        assert_eq!(config.max_stroke_points, 500);
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(EditorConfig::from_json("{}").unwrap(), EditorConfig::default());
        assert!(EditorConfig::from_json("[").is_err());
    }

    #[test]
    fn test_stroke_fit_matches_defaults() {
        assert_eq!(EditorConfig::default().stroke_fit(), StrokeFit::default());
    }

    #[test]
    fn test_mirror_is_flip_xor_premirrored() {
        let mut config = EditorConfig::default();
        assert!(!config.mirrored(false));
        assert!(config.mirrored(true));
        config.source_premirrored = true;
        assert!(config.mirrored(false));
        assert!(!config.mirrored(true));
    }
}
