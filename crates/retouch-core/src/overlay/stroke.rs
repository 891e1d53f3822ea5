//! Turning a raw pointer trail into a stored stroke.
//!
//! While the pointer is down a stroke only collects points. On release the
//! trail is reduced, fitted with curves and, for brushes, given a cached
//! direction seed so the ribbon keeps its orientation when re-rendered.

use super::{BrushSeed, Overlay, OverlayType};
use crate::geometry::{fit_arrow, fit_cubic_bezier, normalize, simplify_capped, Point};

/// Raw points considered for the brush direction seed.
const SEED_POINTS: usize = 20;

/// Tolerances used when finishing a stroke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeFit {
    /// Starting Ramer–Douglas–Peucker epsilon.
    pub epsilon: f64,
    /// Upper bound on stored points.
    pub max_points: usize,
    pub fit_error: f64,
    pub brush_fit_error: f64,
    /// Fit error for the curved body of an arrow.
    pub arrow_fit_error: f64,
    /// Straight arrow terminal length, in stroke sizes.
    pub arrow_head_factor: f64,
}

impl Default for StrokeFit {
    fn default() -> Self {
        Self {
            epsilon: 0.07,
            max_points: 500,
            fit_error: 5.0,
            brush_fit_error: 3.0,
            arrow_fit_error: 15.0,
            arrow_head_factor: 3.5,
        }
    }
}

/// Mean unit direction over the first twenty points, as `[angle, dx, dy]`.
///
/// Returns `None` for fewer than two points.
pub fn brush_seed(points: &[Point]) -> Option<BrushSeed> {
    if points.len() < 2 {
        return None;
    }
    let count = points.len().min(SEED_POINTS);
    let (mut fx, mut fy) = (0.0, 0.0);
    for pair in points[..count].windows(2) {
        if let Some([dx, dy]) = normalize([pair[1][0] - pair[0][0], pair[1][1] - pair[0][1]]) {
            fx += dx;
            fy += dy;
        }
    }
    fx /= count as f64;
    fy /= count as f64;
    Some([fy.atan2(fx), fx, fy])
}

/// Simplify and fit a stroke overlay in place. Text and stickers are untouched.
pub fn finish_stroke(overlay: &mut Overlay, fit: &StrokeFit) {
    let kind = overlay.overlay_type();
    let Some(stroke) = overlay.as_stroke_mut() else {
        return;
    };

    if kind == OverlayType::Brush {
        stroke.first = brush_seed(&stroke.points);
    }

    let raw = stroke.points.len();
    let (points, epsilon) = simplify_capped(&stroke.points, fit.epsilon, fit.max_points);

    let (points, curve) = match kind {
        OverlayType::Arrow => fit_arrow(&points, stroke.size, fit.arrow_head_factor, fit.arrow_fit_error),
        OverlayType::Brush => {
            let curve = fit_cubic_bezier(&points, fit.brush_fit_error);
            (points, curve)
        }
        _ => {
            let curve = fit_cubic_bezier(&points, fit.fit_error);
            (points, curve)
        }
    };

    tracing::debug!(
        kind = ?kind,
        raw,
        kept = points.len(),
        segments = curve.len(),
        epsilon,
        "stroke finished"
    );
    stroke.points = points;
    stroke.curve = curve;
}
