//! Mapping between client (pointer) coordinates and image space.
//!
//! Outside crop mode the view fits the cropped area to the viewport. In crop
//! mode it shows the whole image with room around it for the crop chrome.
//! A 0..1 animation value blends between the two fits, so entering and
//! leaving crop mode zooms smoothly.

use serde::Serialize;

use crate::config::EditorConfig;
use crate::geometry::Point;
use crate::raster::Affine;
use crate::transform::CropRect;

/// Smallest scale a view can have; keeps the mapping invertible.
pub const MIN_SCALE: f64 = 1e-6;

/// Size of the drawing area in client pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        [self.width / 2.0, self.height / 2.0]
    }

    pub fn is_empty(&self) -> bool {
        !(self.width >= 1.0 && self.height >= 1.0)
    }
}

/// A uniform scale that puts the image point `focus` at client point `center`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewTransform {
    pub scale: f64,
    /// Client position of `focus`.
    pub center: Point,
    /// Image-space point shown at `center`.
    pub focus: Point,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            center: [0.0, 0.0],
            focus: [0.0, 0.0],
        }
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

impl ViewTransform {
    /// Blend of the cropped fit (`anim = 0`) and the padded full-image fit (`anim = 1`).
    pub fn compute(
        viewport: Viewport,
        image_width: f64,
        image_height: f64,
        crop: &CropRect,
        anim: f64,
        config: &EditorConfig,
    ) -> Self {
        let t = if anim.is_finite() { anim.clamp(0.0, 1.0) } else { 0.0 };
        let [pad_x, pad_y] = config.crop_padding;

        let cropped_scale = (viewport.width / crop.width(image_width))
            .min(viewport.height / crop.height(image_height));
        let full_scale =
            ((viewport.width - pad_x) / image_width).min((viewport.height - pad_y) / image_height);

        let [vx, vy] = viewport.center();
        let crop_center = crop.center(image_width, image_height);

        let scale = lerp(cropped_scale, full_scale, t);
        Self {
            scale: if scale.is_finite() && scale > MIN_SCALE {
                scale
            } else {
                MIN_SCALE
            },
            center: [vx, lerp(vy, vy - config.crop_offset_y, t)],
            focus: [
                lerp(crop_center[0], image_width / 2.0, t),
                lerp(crop_center[1], image_height / 2.0, t),
            ],
        }
    }

    pub fn client_to_image(&self, p: Point) -> Point {
        [
            (p[0] - self.center[0]) / self.scale + self.focus[0],
            (p[1] - self.center[1]) / self.scale + self.focus[1],
        ]
    }

    pub fn image_to_client(&self, p: Point) -> Point {
        [
            (p[0] - self.focus[0]) * self.scale + self.center[0],
            (p[1] - self.focus[1]) * self.scale + self.center[1],
        ]
    }

    pub fn client_size_to_image(&self, size: f64) -> f64 {
        size / self.scale
    }

    pub fn image_size_to_client(&self, size: f64) -> f64 {
        size * self.scale
    }

    /// `image_to_client` as an affine transform.
    pub fn to_affine(&self) -> Affine {
        Affine::translation(-self.focus[0], -self.focus[1])
            .then(&Affine::scaling(self.scale))
            .then(&Affine::translation(self.center[0], self.center[1]))
    }
}

/// Fixed-step progress toward 0 (cropped view) or 1 (crop mode).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropAnimation {
    value: f64,
    target: f64,
    step: f64,
    interval_ms: f64,
    /// Time of the last applied step while running.
    last_ms: Option<f64>,
}

impl CropAnimation {
    pub fn new(step: f64, interval_ms: f64) -> Self {
        Self {
            value: 0.0,
            target: 0.0,
            step,
            interval_ms,
            last_ms: None,
        }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.animation_step, config.animation_interval_ms)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_running(&self) -> bool {
        self.last_ms.is_some()
    }

    /// Head toward `target` from the current value. Replaces any running animation.
    pub fn start(&mut self, target: f64, now_ms: f64) {
        self.target = target.clamp(0.0, 1.0);
        self.last_ms = (self.value != self.target).then_some(now_ms);
    }

    /// Set the value immediately.
    pub fn jump(&mut self, target: f64) {
        self.target = target.clamp(0.0, 1.0);
        self.value = self.target;
        self.last_ms = None;
    }

    pub fn cancel(&mut self) {
        self.last_ms = None;
    }

    /// Apply the steps due by `now_ms`. Returns whether the value changed.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        let Some(last) = self.last_ms else {
            return false;
        };
        if !(self.step > 0.0 && self.interval_ms > 0.0) {
            self.value = self.target;
            self.last_ms = None;
            return true;
        }
        let due = ((now_ms - last) / self.interval_ms).floor();
        if !(due >= 1.0) {
            return false;
        }
        let delta = self.step * due;
        self.value = if self.target > self.value {
            (self.value + delta).min(self.target)
        } else {
            (self.value - delta).max(self.target)
        };
        if (self.value - self.target).abs() < 1e-9 {
            self.value = self.target;
            self.last_ms = None;
        } else {
            self.last_ms = Some(last + due * self.interval_ms);
        }
        true
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn client_image_round_trip(
            vw in 200.0f64..2000.0,
            vh in 200.0f64..2000.0,
            w in 10.0f64..4000.0,
            h in 10.0f64..4000.0,
            insets in prop::array::uniform4(0.0f64..0.45),
            anim in 0.0f64..=1.0,
            x in -500.0f64..5000.0,
            y in -500.0f64..5000.0,
        ) {
            let crop = CropRect::new(insets[0] * w, insets[1] * h, insets[2] * w, insets[3] * h);
            let view = ViewTransform::compute(
                Viewport::new(vw, vh), w, h, &crop, anim, &EditorConfig::default(),
            );
            let back = view.client_to_image(view.image_to_client([x, y]));
            let tolerance = 1e-6 * (1.0 + x.abs().max(y.abs()));
            prop_assert!((back[0] - x).abs() < tolerance);
            prop_assert!((back[1] - y).abs() < tolerance);
        }
    }
}
