//! Polyline simplification and cubic Bezier fitting for freehand strokes.
//!
//! Strokes are captured as dense point lists while the pointer moves. When a
//! stroke is finished it is reduced with Ramer–Douglas–Peucker and then fitted
//! with a sequence of line and cubic segments that the renderer flattens.
//!
//! # Example
//!
//! ```ignore
//! use retouch_core::geometry::{fit_cubic_bezier, simplify};
//!
//! let points: Vec<[f64; 2]> = (0..50).map(|i| [i as f64, 10.0]).collect();
//! let reduced = simplify(&points, 0.5);
//! assert_eq!(reduced.len(), 2);
//! let curve = fit_cubic_bezier(&reduced, 5.0);
//! assert_eq!(curve.len(), 1);
//! ```

use serde::{Deserialize, Serialize};

/// A point in image space.
pub type Point = [f64; 2];

/// Smallest epsilon used when the caller passes zero to [`simplify_capped`].
const MIN_CAPPED_EPSILON: f64 = 1e-3;

/// Lengths below this are treated as zero when normalizing directions.
const NORMALIZE_EPSILON: f64 = 1e-9;

/// One piece of a fitted stroke.
///
/// Serialized as a bare array: `[start, end]` for a line and
/// `[start, end, control1, control2]` for a cubic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    Line([Point; 2]),
    Cubic([Point; 4]),
}

impl Segment {
    /// First point of the segment.
    pub fn start(&self) -> Point {
        match self {
            Segment::Line(p) => p[0],
            Segment::Cubic(p) => p[0],
        }
    }

    /// Last point of the segment.
    pub fn end(&self) -> Point {
        match self {
            Segment::Line(p) => p[1],
            Segment::Cubic(p) => p[1],
        }
    }

    /// Evaluate the segment at parameter `t` in [0, 1].
    pub fn evaluate(&self, t: f64) -> Point {
        match self {
            Segment::Line([a, b]) => interpolate(*a, *b, t),
            Segment::Cubic([p0, p3, c1, c2]) => {
                let mt = 1.0 - t;
                let a = mt * mt * mt;
                let b = 3.0 * mt * mt * t;
                let c = 3.0 * mt * t * t;
                let d = t * t * t;
                [
                    a * p0[0] + b * c1[0] + c * c2[0] + d * p3[0],
                    a * p0[1] + b * c1[1] + c * c2[1] + d * p3[1],
                ]
            }
        }
    }

    /// Append points approximating this segment to `out`, excluding the start.
    fn flatten_into(&self, tolerance: f64, out: &mut Vec<Point>) {
        match self {
            Segment::Line([_, b]) => out.push(*b),
            Segment::Cubic([p0, p3, c1, c2]) => {
                let hull = distance(*p0, *c1) + distance(*c1, *c2) + distance(*c2, *p3);
                let steps = ((hull / tolerance.max(0.1)).sqrt().ceil() as usize).clamp(2, 64);
                for i in 1..=steps {
                    out.push(self.evaluate(i as f64 / steps as f64));
                }
            }
        }
    }
}

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: Point, b: Point) -> f64 {
    (b[0] - a[0]).hypot(b[1] - a[1])
}

/// Linear interpolation from `a` toward `b`.
#[inline]
pub fn interpolate(a: Point, b: Point, t: f64) -> Point {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
}

/// Total length of a polyline.
pub fn polyline_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| distance(w[0], w[1])).sum()
}

/// Unit vector from `a` to `b`, or `None` when the points coincide.
pub fn direction(a: Point, b: Point) -> Option<Point> {
    normalize([b[0] - a[0], b[1] - a[1]])
}

/// Normalize a vector, returning `None` for zero-length input.
pub fn normalize(v: Point) -> Option<Point> {
    let len = v[0].hypot(v[1]);
    if len > NORMALIZE_EPSILON && len.is_finite() {
        Some([v[0] / len, v[1] / len])
    } else {
        None
    }
}

/// Rotate `p` about `center` by `angle` radians.
pub fn rotate_about(p: Point, center: Point, angle: f64) -> Point {
    let (sin, cos) = angle.sin_cos();
    let dx = p[0] - center[0];
    let dy = p[1] - center[1];
    [
        center[0] + dx * cos - dy * sin,
        center[1] + dx * sin + dy * cos,
    ]
}

/// Distance from `p` to the segment `a`..`b`.
pub fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len_sq = dx * dx + dy * dy;
    let (x, y) = if len_sq > 0.0 {
        let t = (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / len_sq).clamp(0.0, 1.0);
        (a[0] + t * dx, a[1] + t * dy)
    } else {
        (a[0], a[1])
    };
    (p[0] - x).hypot(p[1] - y)
}

/// Ramer–Douglas–Peucker simplification.
///
/// Returns a subsequence of `points` that keeps the first and last point.
/// Polylines with two or fewer points are returned unchanged.
pub fn simplify(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let mut out = Vec::with_capacity(points.len().min(64));
    out.push(points[0]);
    simplify_span(points, epsilon, &mut out);
    out
}

/// Push every kept point of `points` except the first.
fn simplify_span(points: &[Point], epsilon: f64, out: &mut Vec<Point>) {
    let last = points.len() - 1;
    if last < 2 {
        out.extend_from_slice(&points[1..]);
        return;
    }

    let (start, end) = (points[0], points[last]);
    let mut max_dist = 0.0;
    let mut index = 0;
    for (i, p) in points.iter().enumerate().take(last).skip(1) {
        let d = segment_distance(*p, start, end);
        if d > max_dist {
            max_dist = d;
            index = i;
        }
    }

    if max_dist > epsilon {
        simplify_span(&points[..=index], epsilon, out);
        simplify_span(&points[index..], epsilon, out);
    } else {
        out.push(end);
    }
}

/// Simplify with an increasing tolerance until at most `cap` points remain.
///
/// Epsilon doubles on every pass. Returns the simplified points and the
/// epsilon that produced them.
pub fn simplify_capped(points: &[Point], epsilon: f64, cap: usize) -> (Vec<Point>, f64) {
    let cap = cap.max(2);
    let mut eps = epsilon;
    let mut out = simplify(points, eps);
    while out.len() > cap {
        eps = if eps > 0.0 { eps * 2.0 } else { MIN_CAPPED_EPSILON };
        out = simplify(&out, eps);
    }
    (out, eps)
}

/// Greedy cubic Bezier fit.
///
/// From each start index the longest span whose estimated cubic stays within
/// `max_error` of every source point is accepted. Spans with no acceptable
/// cubic fall back to a single line to the next point.
pub fn fit_cubic_bezier(points: &[Point], max_error: f64) -> Vec<Segment> {
    let mut segments = Vec::new();
    if points.len() < 2 {
        return segments;
    }

    let last = points.len() - 1;
    let mut start = 0;
    while start < last {
        let mut end = last;
        let mut accepted = None;
        while end > start + 1 {
            let candidate = estimate_bezier(points, start, end);
            if max_error_of(&candidate, points, start, end) <= max_error {
                accepted = Some(candidate);
                break;
            }
            end -= 1;
        }

        let segment = match accepted {
            Some(segment) => segment,
            None => {
                end = start + 1;
                Segment::Line([points[start], points[end]])
            }
        };
        segments.push(segment);
        start = end;
    }
    segments
}

/// Estimate a cubic spanning `points[start..=end]` from chord length and end tangents.
fn estimate_bezier(points: &[Point], start: usize, end: usize) -> Segment {
    let p0 = points[start];
    let p3 = points[end];
    let chord = distance(p0, p3);

    let tangent_start = direction(p0, points[(start + 2).min(end)]);
    let tangent_end = direction(points[end.saturating_sub(2).max(start)], p3);

    match (tangent_start, tangent_end) {
        (Some(ts), Some(te)) => {
            let reach = chord / 3.0;
            let c1 = [p0[0] + ts[0] * reach, p0[1] + ts[1] * reach];
            let c2 = [p3[0] - te[0] * reach, p3[1] - te[1] * reach];
            Segment::Cubic([p0, p3, c1, c2])
        }
        _ => Segment::Line([p0, p3]),
    }
}

/// Largest distance between the interior source points and the curve sampled at matching parameters.
fn max_error_of(segment: &Segment, points: &[Point], start: usize, end: usize) -> f64 {
    let span = (end - start) as f64;
    (start + 1..end)
        .map(|i| {
            let t = (i - start) as f64 / span;
            distance(segment.evaluate(t), points[i])
        })
        .fold(0.0, f64::max)
}

/// Flatten a fitted curve into a polyline.
pub fn flatten(curve: &[Segment], tolerance: f64) -> Vec<Point> {
    let mut out = Vec::with_capacity(curve.len() * 4 + 1);
    if let Some(first) = curve.first() {
        out.push(first.start());
    }
    for segment in curve {
        segment.flatten_into(tolerance, &mut out);
    }
    out
}

/// Result of shaping a stroke's tail into a straight arrow shaft.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrowShape {
    /// Body points, ending at `mid`.
    pub body: Vec<Point>,
    /// Start of the straight terminal segment.
    pub mid: Point,
    /// Arrow tip.
    pub tip: Point,
}

/// Split a stroke so its final `min(size * head_factor, 40% of length)` is straight.
///
/// Returns `None` when the stroke has fewer than two points.
pub fn arrow_shape(points: &[Point], size: f64, head_factor: f64) -> Option<ArrowShape> {
    if points.len() < 2 {
        return None;
    }
    let tip = points[points.len() - 1];
    let total = polyline_length(points);
    let mut remaining = (size * head_factor).min(total * 0.4);

    for i in (1..points.len()).rev() {
        let seg = distance(points[i - 1], points[i]);
        if remaining < seg || i == 1 {
            let t = if seg > 0.0 { (remaining / seg).min(1.0) } else { 0.0 };
            let mid = interpolate(points[i], points[i - 1], t);
            let mut body = points[..i].to_vec();
            body.push(mid);
            return Some(ArrowShape { body, mid, tip });
        }
        remaining -= seg;
    }
    None
}

/// Fit an arrow stroke: the body is fitted, the terminal is a straight line.
///
/// Returns the points to keep (body then tip) with the curve. Strokes too
/// short to split are fitted whole with the same tolerance.
pub fn fit_arrow(points: &[Point], size: f64, head_factor: f64, max_error: f64) -> (Vec<Point>, Vec<Segment>) {
    match arrow_shape(points, size, head_factor) {
        Some(shape) => {
            let mut curve = fit_cubic_bezier(&shape.body, max_error);
            curve.push(Segment::Line([shape.mid, shape.tip]));
            let mut kept = shape.body;
            kept.push(shape.tip);
            (kept, curve)
        }
        None => (points.to_vec(), fit_cubic_bezier(points, max_error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<Point> {
        (0..n).map(|i| [i as f64 * 2.0, 40.0]).collect()
    }

    // ===== Simplify Tests =====

    #[test]
    fn test_simplify_straight_line_to_endpoints() {
        let points = line(50);
        let reduced = simplify(&points, 0.01);
        assert_eq!(reduced, vec![[0.0, 40.0], [98.0, 40.0]]);
    }

    #[test]
    fn test_simplify_short_input_unchanged() {
        assert!(simplify(&[], 1.0).is_empty());
        assert_eq!(simplify(&[[1.0, 2.0]], 1.0), vec![[1.0, 2.0]]);
        let two = [[0.0, 0.0], [5.0, 5.0]];
        assert_eq!(simplify(&two, 1.0), two.to_vec());
    }

    #[test]
    fn test_simplify_keeps_corner() {
        let points = vec![[0.0, 0.0], [5.0, 0.0], [10.0, 0.0], [10.0, 5.0], [10.0, 10.0]];
        let reduced = simplify(&points, 0.5);
        assert_eq!(reduced, vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]]);
    }

    #[test]
    fn test_simplify_zero_epsilon_drops_only_collinear() {
        let points = vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 0.0]];
        let reduced = simplify(&points, 0.0);
        assert_eq!(reduced, vec![[0.0, 0.0], [2.0, 2.0], [3.0, 0.0]]);
    }

    #[test]
    fn test_simplify_capped_respects_cap() {
        let points: Vec<Point> = (0..2000)
            .map(|i| {
                let t = i as f64 * 0.05;
                [t * 10.0, (t * 3.0).sin() * 30.0]
            })
            .collect();
        let (reduced, eps) = simplify_capped(&points, 0.0, 100);
        assert!(reduced.len() <= 100);
        assert!(eps > 0.0);
        assert_eq!(reduced[0], points[0]);
        assert_eq!(reduced[reduced.len() - 1], points[points.len() - 1]);
    }

    // ===== Bezier Fit Tests =====

    #[test]
    fn test_fit_two_points_is_one_line() {
        let curve = fit_cubic_bezier(&[[0.0, 0.0], [10.0, 0.0]], 5.0);
        assert_eq!(curve, vec![Segment::Line([[0.0, 0.0], [10.0, 0.0]])]);
    }

    #[test]
    fn test_fit_fewer_than_two_points_is_empty() {
        assert!(fit_cubic_bezier(&[], 5.0).is_empty());
        assert!(fit_cubic_bezier(&[[3.0, 3.0]], 5.0).is_empty());
    }

    #[test]
    fn test_fit_is_continuous_and_covers_stroke() {
        let points: Vec<Point> = (0..40)
            .map(|i| {
                let a = i as f64 * 0.15;
                [50.0 + a.cos() * 40.0, 50.0 + a.sin() * 40.0]
            })
            .collect();
        let curve = fit_cubic_bezier(&points, 1.0);
        assert!(!curve.is_empty());
        assert_eq!(curve[0].start(), points[0]);
        assert_eq!(curve[curve.len() - 1].end(), points[39]);
        for pair in curve.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
        }
    }

    #[test]
    fn test_fit_gentle_arc_uses_cubic() {
        let points: Vec<Point> = (0..=10)
            .map(|i| {
                let x = i as f64 * 10.0;
                [x, 0.002 * (x - 50.0) * (x - 50.0)]
            })
            .collect();
        let curve = fit_cubic_bezier(&points, 5.0);
        assert_eq!(curve.len(), 1);
        assert!(matches!(curve[0], Segment::Cubic(_)));
    }

    #[test]
    fn test_fit_duplicate_points_do_not_produce_nan() {
        let points = vec![[5.0, 5.0]; 6];
        let curve = fit_cubic_bezier(&points, 5.0);
        for segment in &curve {
            let p = segment.evaluate(0.5);
            assert!(p[0].is_finite() && p[1].is_finite());
        }
    }

    #[test]
    fn test_segment_serializes_as_arrays() {
        let json = serde_json::to_string(&Segment::Line([[0.0, 1.0], [2.0, 3.0]])).unwrap();
        assert_eq!(json, "[[0.0,1.0],[2.0,3.0]]");
        let back: Segment = serde_json::from_str("[[0,0],[9,0],[3,1],[6,1]]").unwrap();
        assert!(matches!(back, Segment::Cubic(_)));
    }

    // ===== Arrow Tests =====

    #[test]
    fn test_arrow_shape_straight_tail_length() {
        let points = line(50);
        let shape = arrow_shape(&points, 10.0, 3.5).unwrap();
        assert_eq!(shape.tip, [98.0, 40.0]);
        assert!((distance(shape.mid, shape.tip) - 35.0).abs() < 1e-9);
        assert_eq!(*shape.body.last().unwrap(), shape.mid);
    }

    #[test]
    fn test_arrow_tail_capped_by_stroke_length() {
        let points = vec![[0.0, 0.0], [10.0, 0.0]];
        let shape = arrow_shape(&points, 20.0, 3.5).unwrap();
        assert!((shape.mid[0] - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_arrow_ends_with_line() {
        let points = line(30);
        let (kept, curve) = fit_arrow(&points, 5.0, 3.5, 15.0);
        assert!(matches!(curve.last(), Some(Segment::Line(_))));
        assert_eq!(curve.last().unwrap().end(), [58.0, 40.0]);
        assert_eq!(kept.last(), Some(&[58.0, 40.0]));
        assert_eq!(kept[kept.len() - 2], [40.5, 40.0]);
    }

    #[test]
    fn test_fit_arrow_single_point_keeps_point() {
        let (kept, curve) = fit_arrow(&[[3.0, 4.0]], 5.0, 3.5, 15.0);
        assert_eq!(kept, vec![[3.0, 4.0]]);
        assert!(curve.is_empty());
    }

    #[test]
    fn test_arrow_single_point_is_none() {
        assert!(arrow_shape(&[[1.0, 1.0]], 5.0, 3.5).is_none());
    }

    // ===== Flatten Tests =====

    #[test]
    fn test_flatten_lines_and_cubics() {
        let curve = vec![
            Segment::Line([[0.0, 0.0], [10.0, 0.0]]),
            Segment::Cubic([[10.0, 0.0], [20.0, 0.0], [13.0, 5.0], [17.0, 5.0]]),
        ];
        let flat = flatten(&curve, 0.5);
        assert_eq!(flat[0], [0.0, 0.0]);
        assert_eq!(flat[1], [10.0, 0.0]);
        let end = flat[flat.len() - 1];
        assert!((end[0] - 20.0).abs() < 1e-9 && end[1].abs() < 1e-9);
    }

    #[test]
    fn test_normalize_zero_is_none() {
        assert!(normalize([0.0, 0.0]).is_none());
        assert!(direction([1.0, 1.0], [1.0, 1.0]).is_none());
    }

    #[test]
    fn test_rotate_about_quarter_turn() {
        let p = rotate_about([2.0, 1.0], [1.0, 1.0], std::f64::consts::FRAC_PI_2);
        assert!((p[0] - 1.0).abs() < 1e-12);
        assert!((p[1] - 2.0).abs() < 1e-12);
    }
}
