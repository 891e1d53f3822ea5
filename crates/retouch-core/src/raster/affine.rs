//! 2D affine transforms in canvas convention.

use crate::geometry::Point;

/// Maps `(x, y)` to `(a·x + c·y + e, b·x + d·y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translation(x: f64, y: f64) -> Self {
        Self {
            e: x,
            f: y,
            ..Self::IDENTITY
        }
    }

    pub fn scaling(s: f64) -> Self {
        Self {
            a: s,
            d: s,
            ..Self::IDENTITY
        }
    }

    pub fn scaling_xy(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    /// Clockwise on screen for positive angles (y points down).
    pub fn rotation(radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    /// `self` followed by `next`.
    pub fn then(&self, next: &Affine) -> Affine {
        Affine {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            e: next.a * self.e + next.c * self.f + next.e,
            f: next.b * self.e + next.d * self.f + next.f,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        [
            self.a * p[0] + self.c * p[1] + self.e,
            self.b * p[0] + self.d * p[1] + self.f,
        ]
    }

    /// `None` for singular transforms.
    pub fn inverse(&self) -> Option<Affine> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < 1e-12 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Affine {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }

    /// Average linear scale, used to size stroke widths.
    pub fn scale_factor(&self) -> f64 {
        (self.a * self.d - self.b * self.c).abs().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a[0] - b[0]).abs() < 1e-9 && (a[1] - b[1]).abs() < 1e-9
    }

    #[test]
    fn test_rotation_quarter_turn() {
        let p = Affine::rotation(std::f64::consts::FRAC_PI_2).apply([1.0, 0.0]);
        assert!(close(p, [0.0, 1.0]));
    }

    #[test]
    fn test_then_applies_in_order() {
        let t = Affine::scaling(2.0).then(&Affine::translation(5.0, 0.0));
        assert!(close(t.apply([1.0, 1.0]), [7.0, 2.0]));
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = Affine::translation(-3.0, 4.0)
            .then(&Affine::rotation(0.7))
            .then(&Affine::scaling(1.5));
        let inv = t.inverse().unwrap();
        let p = [12.5, -8.0];
        assert!(close(inv.apply(t.apply(p)), p));
        assert!((t.scale_factor() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_singular_has_no_inverse() {
        assert!(Affine::scaling(0.0).inverse().is_none());
    }
}
