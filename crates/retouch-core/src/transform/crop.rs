//! Crop rectangles expressed as insets from the image edges.
//!
//! A crop is four non-negative distances `[left, top, right, bottom]` in
//! image-space pixels. Every mutation path keeps at least one pixel of image
//! on each axis, so `left + right < width` and `top + bottom < height`.
//!
//! # Example
//!
//! ```ignore
//! let crop = CropRect::new(10.0, 10.0, 10.0, 10.0);
//! assert_eq!(crop.width(100.0), 80.0);
//! assert_eq!(crop.center(100.0, 100.0), [50.0, 50.0]);
//! ```

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Smallest crop extent, in pixels, along either axis.
pub const MIN_CROP_EXTENT: f64 = 1.0;

/// Named aspect ratios offered by the crop tool, as sentinel values.
pub const ASPECT_PRESETS: [(&str, f64); 7] = [
    ("Free", 0.0),
    ("Original", -1.0),
    ("1:1", 1.0),
    ("4:3", 4.0 / 3.0),
    ("3:4", 3.0 / 4.0),
    ("16:9", 16.0 / 9.0),
    ("9:16", 9.0 / 16.0),
];

/// Corner handle of the crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CropAnchor {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl CropAnchor {
    /// Hit-test order.
    pub const ALL: [CropAnchor; 4] = [
        CropAnchor::TopLeft,
        CropAnchor::TopRight,
        CropAnchor::BottomLeft,
        CropAnchor::BottomRight,
    ];

    pub fn is_top(self) -> bool {
        matches!(self, CropAnchor::TopLeft | CropAnchor::TopRight)
    }

    pub fn is_left(self) -> bool {
        matches!(self, CropAnchor::TopLeft | CropAnchor::BottomLeft)
    }
}

/// Aspect-ratio constraint for the crop tool.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AspectRatio {
    #[default]
    Free,
    /// Match the source image.
    Original,
    /// Width divided by height.
    Ratio(f64),
}

impl AspectRatio {
    /// `0` is free, `-1` (any negative) matches the source, positive is width/height.
    pub fn from_sentinel(value: f64) -> Self {
        if !value.is_finite() || value == 0.0 {
            AspectRatio::Free
        } else if value < 0.0 {
            AspectRatio::Original
        } else {
            AspectRatio::Ratio(value)
        }
    }

    pub fn sentinel(self) -> f64 {
        match self {
            AspectRatio::Free => 0.0,
            AspectRatio::Original => -1.0,
            AspectRatio::Ratio(r) => r,
        }
    }

    /// Concrete width/height ratio for an image, `None` when unconstrained.
    pub fn resolve(self, image_width: f64, image_height: f64) -> Option<f64> {
        match self {
            AspectRatio::Free => None,
            AspectRatio::Original => Some(image_width / image_height),
            AspectRatio::Ratio(r) => Some(r),
        }
    }
}

/// Inset crop rectangle. Serializes as `[left, top, right, bottom]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct CropRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl From<[f64; 4]> for CropRect {
    fn from([left, top, right, bottom]: [f64; 4]) -> Self {
        Self::new(left, top, right, bottom)
    }
}

impl From<CropRect> for [f64; 4] {
    fn from(c: CropRect) -> Self {
        [c.left, c.top, c.right, c.bottom]
    }
}

/// A pixel-aligned area of image space that a render covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    /// Image-space position of the region's top-left corner.
    pub origin: Point,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// The whole image.
    pub fn full(image_width: u32, image_height: u32) -> Self {
        Self {
            origin: [0.0, 0.0],
            width: image_width,
            height: image_height,
        }
    }
}

impl CropRect {
    /// No crop.
    pub const NONE: CropRect = CropRect {
        left: 0.0,
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
    };

    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Remaining width inside an image of `image_width`.
    pub fn width(&self, image_width: f64) -> f64 {
        image_width - self.left - self.right
    }

    /// Remaining height inside an image of `image_height`.
    pub fn height(&self, image_height: f64) -> f64 {
        image_height - self.top - self.bottom
    }

    pub fn origin(&self) -> Point {
        [self.left, self.top]
    }

    /// Center of the cropped area in image space.
    pub fn center(&self, image_width: f64, image_height: f64) -> Point {
        [
            image_width / 2.0 + (self.left - self.right) / 2.0,
            image_height / 2.0 + (self.top - self.bottom) / 2.0,
        ]
    }

    /// Image-space position of a corner handle.
    pub fn corner(&self, anchor: CropAnchor, image_width: f64, image_height: f64) -> Point {
        let x = if anchor.is_left() {
            self.left
        } else {
            image_width - self.right
        };
        let y = if anchor.is_top() {
            self.top
        } else {
            image_height - self.bottom
        };
        [x, y]
    }

    /// Whether the insets are non-negative and leave some image on both axes.
    pub fn is_valid(&self, image_width: f64, image_height: f64) -> bool {
        [self.left, self.top, self.right, self.bottom]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
            && self.left + self.right < image_width
            && self.top + self.bottom < image_height
    }

    /// Clamp every inset so the crop is valid for the image.
    pub fn clamped(self, image_width: f64, image_height: f64) -> Self {
        let (left, right) = clamp_pair(self.left, self.right, image_width);
        let (top, bottom) = clamp_pair(self.top, self.bottom, image_height);
        Self::new(left, top, right, bottom)
    }

    /// Move the whole crop by `(dx, dy)` without changing its size.
    pub fn translated(self, dx: f64, dy: f64) -> Self {
        let dx = dx.clamp(-self.left, self.right);
        let dy = dy.clamp(-self.top, self.bottom);
        Self::new(
            self.left + dx,
            self.top + dy,
            self.right - dx,
            self.bottom - dy,
        )
    }

    /// Drag one corner by `(dx, dy)`.
    ///
    /// With an aspect ratio, the vertical inset on the dragged side follows
    /// the width. When that would leave the image, the width shrinks instead.
    pub fn drag_corner(
        self,
        anchor: CropAnchor,
        dx: f64,
        dy: f64,
        aspect: Option<f64>,
        image_width: f64,
        image_height: f64,
    ) -> Self {
        let mut c = self;
        if anchor.is_left() {
            c.left += dx;
        } else {
            c.right -= dx;
        }
        if anchor.is_top() {
            c.top += dy;
        } else {
            c.bottom -= dy;
        }
        c = c.clamped(image_width, image_height);

        if let Some(aspect) = aspect.filter(|a| a.is_finite() && *a > 0.0) {
            let available = if anchor.is_top() {
                image_height - c.bottom
            } else {
                image_height - c.top
            };
            let mut width = c.width(image_width);
            let mut height = width / aspect;
            if height > available {
                height = available;
                width = height * aspect;
                if anchor.is_left() {
                    c.left = image_width - c.right - width;
                } else {
                    c.right = image_width - c.left - width;
                }
            }
            if anchor.is_top() {
                c.top = image_height - c.bottom - height;
            } else {
                c.bottom = image_height - c.top - height;
            }
            c = c.clamped(image_width, image_height);
        }
        c
    }

    /// Reshape to `aspect`, keeping the horizontal center and centering vertically.
    pub fn with_aspect(self, aspect: f64, image_width: f64, image_height: f64) -> Self {
        if !(aspect.is_finite() && aspect > 0.0) {
            return self;
        }
        let mut width = self.width(image_width);
        let mut height = width / aspect;
        if height > image_height {
            height = image_height;
            width = height * aspect;
        }
        let cx = self.center(image_width, image_height)[0];
        let left = (cx - width / 2.0).clamp(0.0, (image_width - width).max(0.0));
        let top = (image_height - height) / 2.0;
        Self::new(
            left,
            top,
            image_width - left - width,
            image_height - top - height,
        )
        .clamped(image_width, image_height)
    }

    /// Pixel region covered by this crop.
    pub fn region(&self, image_width: u32, image_height: u32) -> Region {
        let (w, h) = (image_width as f64, image_height as f64);
        Region {
            origin: self.origin(),
            width: self.width(w).round().max(1.0) as u32,
            height: self.height(h).round().max(1.0) as u32,
        }
    }
}

/// Clamp a pair of opposing insets so at least `MIN_CROP_EXTENT` remains.
fn clamp_pair(a: f64, b: f64, extent: f64) -> (f64, f64) {
    let room = (extent - MIN_CROP_EXTENT).max(0.0);
    let a = if a.is_finite() { a.clamp(0.0, room) } else { 0.0 };
    let b = if b.is_finite() { b.clamp(0.0, room - a) } else { 0.0 };
    (a, b)
}
