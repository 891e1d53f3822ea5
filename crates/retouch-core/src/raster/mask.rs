//! Anti-aliased coverage masks for strokes and filled shapes.
//!
//! Coverage is stored per pixel in `[0, 1]`. Shapes are accumulated with a
//! max-union, so overlapping pieces of the same stroke never double up.
//!
//! ## Algorithm
//!
//! - **Strokes** are unions of capsules. A pixel center at distance `d` from a
//!   segment with half width `hw` is covered by `clamp(hw + 0.5 - d, 0, 1)`.
//! - **Polygons** are filled with the nonzero winding rule on four sub-rows
//!   per pixel row, with exact horizontal span coverage.

use crate::geometry::{segment_distance, Point};

/// Sub-rows sampled per pixel row when filling polygons.
const SUBROWS: usize = 4;

/// Per-pixel coverage in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    coverage: Vec<f32>,
}

impl Mask {
    /// An empty mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            coverage: vec![0.0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.coverage[y as usize * self.width as usize + x as usize]
    }

    /// Raise the coverage at `(x, y)` to at least `value`.
    #[inline]
    pub fn raise(&mut self, x: u32, y: u32, value: f32) {
        if x < self.width && y < self.height {
            let cell = &mut self.coverage[y as usize * self.width as usize + x as usize];
            *cell = cell.max(value.clamp(0.0, 1.0));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.coverage.iter().all(|&c| c <= 0.0)
    }

    /// Pixel bounds `(x0, y0, x1, y1)` of the covered area, exclusive at the end.
    pub fn bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let w = self.width as usize;
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (i, &c) in self.coverage.iter().enumerate() {
            if c <= 0.0 {
                continue;
            }
            let (x, y) = ((i % w) as u32, (i / w) as u32);
            bounds = Some(match bounds {
                None => (x, y, x + 1, y + 1),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x + 1), y1.max(y + 1)),
            });
        }
        bounds
    }

    /// Max-union with another mask of the same size.
    pub fn union(&mut self, other: &Mask) {
        debug_assert_eq!((self.width, self.height), (other.width, other.height));
        for (a, b) in self.coverage.iter_mut().zip(&other.coverage) {
            *a = a.max(*b);
        }
    }

    /// Stroke a polyline with round caps and joins.
    ///
    /// A single point renders a dot of diameter `width`.
    pub fn stroke_polyline(&mut self, points: &[Point], width: f64) {
        let half = (width / 2.0).max(0.0);
        match points {
            [] => {}
            [p] => self.stroke_segment(*p, *p, half),
            _ => {
                for pair in points.windows(2) {
                    self.stroke_segment(pair[0], pair[1], half);
                }
            }
        }
    }

    /// Stroke a closed outline.
    pub fn stroke_closed(&mut self, points: &[Point], width: f64) {
        self.stroke_polyline(points, width);
        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            if points.len() > 2 {
                self.stroke_segment(*last, *first, (width / 2.0).max(0.0));
            }
        }
    }

    /// One capsule from `a` to `b` with half width `half`.
    fn stroke_segment(&mut self, a: Point, b: Point, half: f64) {
        if !(a.iter().chain(b.iter()).all(|v| v.is_finite()) && half.is_finite()) {
            return;
        }
        let reach = half + 1.0;
        let Some((x0, y0, x1, y1)) = self.clip_box(
            a[0].min(b[0]) - reach,
            a[1].min(b[1]) - reach,
            a[0].max(b[0]) + reach,
            a[1].max(b[1]) + reach,
        ) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let center = [x as f64 + 0.5, y as f64 + 0.5];
                let d = segment_distance(center, a, b);
                let cov = (half + 0.5 - d).clamp(0.0, 1.0) as f32;
                if cov > 0.0 {
                    self.raise(x, y, cov);
                }
            }
        }
    }

    /// Fill a closed polygon with the nonzero winding rule.
    pub fn fill_polygon(&mut self, polygon: &[Point]) {
        self.fill_polygons(std::slice::from_ref(&polygon.to_vec()));
    }

    /// Fill several contours as one shape, nonzero winding across all of them.
    pub fn fill_polygons(&mut self, contours: &[Vec<Point>]) {
        let edges: Vec<(Point, Point)> = contours
            .iter()
            .filter(|c| c.len() >= 3)
            .flat_map(|c| {
                c.iter()
                    .zip(c.iter().cycle().skip(1))
                    .map(|(a, b)| (*a, *b))
                    .collect::<Vec<_>>()
            })
            .filter(|(a, b)| a.iter().chain(b.iter()).all(|v| v.is_finite()))
            .collect();
        if edges.is_empty() {
            return;
        }

        let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
        let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
        for (a, _) in &edges {
            min_x = min_x.min(a[0]);
            min_y = min_y.min(a[1]);
            max_x = max_x.max(a[0]);
            max_y = max_y.max(a[1]);
        }
        let Some((x0, y0, x1, y1)) = self.clip_box(min_x, min_y, max_x + 1.0, max_y + 1.0) else {
            return;
        };

        let mut row = vec![0.0f32; self.width as usize];
        let mut crossings: Vec<(f64, i32)> = Vec::new();
        for y in y0..y1 {
            row[x0 as usize..x1 as usize].iter_mut().for_each(|v| *v = 0.0);
            for sub in 0..SUBROWS {
                let sy = y as f64 + (sub as f64 + 0.5) / SUBROWS as f64;
                crossings.clear();
                for (a, b) in &edges {
                    let (lo, hi, dir) = if a[1] < b[1] { (a, b, 1) } else { (b, a, -1) };
                    if sy >= lo[1] && sy < hi[1] {
                        let t = (sy - lo[1]) / (hi[1] - lo[1]);
                        crossings.push((lo[0] + (hi[0] - lo[0]) * t, dir));
                    }
                }
                crossings.sort_by(|p, q| p.0.total_cmp(&q.0));

                let mut winding = 0;
                let mut span_start = 0.0;
                for &(x, dir) in &crossings {
                    let before = winding;
                    winding += dir;
                    if before == 0 && winding != 0 {
                        span_start = x;
                    } else if before != 0 && winding == 0 {
                        add_span(&mut row, span_start, x, 1.0 / SUBROWS as f32);
                    }
                }
            }
            for x in x0..x1 {
                let cov = row[x as usize];
                if cov > 0.0 {
                    self.raise(x, y, cov.min(1.0));
                }
            }
        }
    }

    /// Grow the covered area by `radius` pixels.
    pub fn dilate(&self, radius: f64) -> Mask {
        if radius <= 0.0 {
            return self.clone();
        }
        let mut out = Mask::new(self.width, self.height);
        let reach = radius.ceil() as i64 + 1;
        let (w, h) = (self.width as i64, self.height as i64);
        for y in 0..h {
            for x in 0..w {
                let c = self.get(x as u32, y as u32);
                if c <= 0.0 {
                    continue;
                }
                for dy in -reach..=reach {
                    for dx in -reach..=reach {
                        let (nx, ny) = (x + dx, y + dy);
                        if nx < 0 || ny < 0 || nx >= w || ny >= h {
                            continue;
                        }
                        let d = ((dx * dx + dy * dy) as f64).sqrt();
                        let falloff = (radius + 0.5 - d).clamp(0.0, 1.0) as f32;
                        if falloff > 0.0 {
                            out.raise(nx as u32, ny as u32, c * falloff);
                        }
                    }
                }
            }
        }
        out
    }

    /// Intersect a float box with the mask, as integer pixel bounds.
    fn clip_box(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> Option<(u32, u32, u32, u32)> {
        let clamp_x = |v: f64| v.floor().clamp(0.0, self.width as f64) as u32;
        let clamp_y = |v: f64| v.floor().clamp(0.0, self.height as f64) as u32;
        let (bx0, by0) = (clamp_x(x0), clamp_y(y0));
        let (bx1, by1) = (clamp_x(x1.ceil()), clamp_y(y1.ceil()));
        (bx0 < bx1 && by0 < by1).then_some((bx0, by0, bx1, by1))
    }
}

/// Add `weight` times the horizontal overlap of `[xa, xb)` with each pixel.
fn add_span(row: &mut [f32], xa: f64, xb: f64, weight: f32) {
    let width = row.len() as f64;
    let (xa, xb) = (xa.clamp(0.0, width), xb.clamp(0.0, width));
    if xb <= xa {
        return;
    }
    let first = xa.floor() as usize;
    let last = (xb.ceil() as usize).min(row.len());
    for (px, cell) in row.iter_mut().enumerate().take(last).skip(first) {
        let overlap = xb.min(px as f64 + 1.0) - xa.max(px as f64);
        if overlap > 0.0 {
            *cell += overlap as f32 * weight;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(mask: &Mask) -> f32 {
        mask.coverage.iter().sum()
    }

    // ===== Stroke Tests =====

    #[test]
    fn test_single_point_is_a_dot() {
        let mut mask = Mask::new(20, 20);
        mask.stroke_polyline(&[[10.0, 10.0]], 6.0);
        assert_eq!(mask.get(9, 9), 1.0);
        assert_eq!(mask.get(0, 0), 0.0);
        assert!(total(&mask).is_finite());
        assert!(total(&mask) > 20.0);
    }

    #[test]
    fn test_horizontal_stroke_coverage() {
        let mut mask = Mask::new(40, 20);
        mask.stroke_polyline(&[[5.0, 10.0], [35.0, 10.0]], 4.0);
        for row in 8..=11 {
            assert_eq!(mask.get(20, row), 1.0, "row {row}");
        }
        assert_eq!(mask.get(20, 7), 0.0);
        assert_eq!(mask.get(20, 12), 0.0);
    }

    #[test]
    fn test_overlapping_segments_do_not_exceed_one() {
        let mut mask = Mask::new(30, 30);
        mask.stroke_polyline(&[[5.0, 5.0], [25.0, 25.0], [5.0, 25.0], [25.0, 5.0]], 8.0);
        assert!(mask.coverage.iter().all(|&c| (0.0..=1.0).contains(&c)));
    }

    #[test]
    fn test_non_finite_points_are_ignored() {
        let mut mask = Mask::new(10, 10);
        mask.stroke_polyline(&[[f64::NAN, 1.0], [5.0, 5.0]], 3.0);
        assert!(mask.is_empty());
    }

    // ===== Fill Tests =====

    #[test]
    fn test_fill_axis_aligned_square() {
        let mut mask = Mask::new(10, 10);
        mask.fill_polygon(&[[2.0, 2.0], [6.0, 2.0], [6.0, 6.0], [2.0, 6.0]]);
        assert!((total(&mask) - 16.0).abs() < 1e-4);
        assert_eq!(mask.get(3, 3), 1.0);
        assert_eq!(mask.get(6, 3), 0.0);
        assert_eq!(mask.bounds(), Some((2, 2, 6, 6)));
    }

    #[test]
    fn test_fill_half_pixel_edge() {
        let mut mask = Mask::new(4, 4);
        mask.fill_polygon(&[[0.0, 0.0], [1.5, 0.0], [1.5, 4.0], [0.0, 4.0]]);
        assert_eq!(mask.get(0, 2), 1.0);
        assert!((mask.get(1, 2) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_fill_triangle_area() {
        let mut mask = Mask::new(20, 20);
        mask.fill_polygon(&[[0.0, 0.0], [16.0, 0.0], [0.0, 16.0]]);
        assert!((total(&mask) - 128.0).abs() < 4.0);
    }

    #[test]
    fn test_fill_reversed_winding_is_same() {
        let mut a = Mask::new(10, 10);
        let mut b = Mask::new(10, 10);
        let square = [[1.0, 1.0], [7.0, 1.0], [7.0, 7.0], [1.0, 7.0]];
        let mut reversed = square.to_vec();
        reversed.reverse();
        a.fill_polygon(&square);
        b.fill_polygon(&reversed);
        assert_eq!(a, b);
    }

    #[test]
    fn test_degenerate_polygon_fills_nothing() {
        let mut mask = Mask::new(10, 10);
        mask.fill_polygon(&[[1.0, 1.0], [5.0, 5.0]]);
        assert!(mask.is_empty());
        assert_eq!(mask.bounds(), None);
    }

    // ===== Dilate Tests =====

    #[test]
    fn test_dilate_grows_coverage() {
        let mut mask = Mask::new(20, 20);
        mask.raise(10, 10, 1.0);
        let grown = mask.dilate(2.0);
        assert_eq!(grown.get(11, 10), 1.0);
        assert_eq!(grown.get(10, 9), 1.0);
        assert!((grown.get(12, 10) - 0.5).abs() < 1e-6);
        assert_eq!(grown.get(15, 10), 0.0);
        assert_eq!(mask.dilate(0.0), mask);
    }
}
