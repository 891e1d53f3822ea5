//! Drawing overlays onto a surface.
//!
//! Overlays are painted back to front onto a transparent layer. The caller
//! supplies the already-placed background at the layer's size; it is used by
//! blur strokes (which blur the layer over the background) and is finally
//! composited under everything with destination-atop.

use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;

use super::{Overlay, OverlayKind, StickerOverlay, Stroke, TextAlign, TextOverlay, TextStyle};
use crate::geometry::{flatten, normalize, Point, Segment};
use crate::raster::{Affine, Composite, FontBook, Mask, Surface};

/// Smoothing of the brush ribbon direction between segments.
const BRUSH_SMOOTHING: f64 = 0.995;

/// Arrowhead line length relative to the terminal segment.
const ARROWHEAD_LENGTH: f64 = 1.2;

/// Arrowhead half angle, in radians.
const ARROWHEAD_SPREAD: f64 = 0.4;

/// Arc steps per rounded corner.
const CORNER_STEPS: usize = 8;

const OPAQUE_BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Decoded sticker assets by reference.
pub trait StickerLookup {
    fn sticker(&self, asset_ref: &str) -> Option<&Surface>;
}

impl StickerLookup for HashMap<String, Surface> {
    fn sticker(&self, asset_ref: &str) -> Option<&Surface> {
        self.get(asset_ref)
    }
}

/// Everything overlay drawing needs besides the overlays themselves.
pub struct OverlayContext<'a> {
    /// Image space to layer pixels.
    pub to_target: Affine,
    pub fonts: &'a FontBook,
    pub stickers: &'a dyn StickerLookup,
    /// Stroke still being drawn; it gets no arrowhead yet.
    pub active: Option<usize>,
}

/// Paint `overlays` onto `layer`, then put `background` under them.
pub fn render_overlays(layer: &mut Surface, overlays: &[Overlay], background: &Surface, ctx: &OverlayContext) {
    for (index, overlay) in overlays.iter().enumerate() {
        match &overlay.kind {
            OverlayKind::Text(text) => draw_text(layer, overlay, text, ctx),
            OverlayKind::Sticker(sticker) => draw_sticker(layer, overlay, sticker, ctx),
            OverlayKind::Pen(stroke) => {
                let mask = stroke_mask(layer, stroke, ctx, stroke.size);
                layer.fill(&mask, color_of(stroke), Composite::SourceOver);
            }
            OverlayKind::Arrow(stroke) => {
                let mut mask = stroke_mask(layer, stroke, ctx, stroke.size);
                if ctx.active != Some(index) {
                    for line in arrowhead(&stroke.points) {
                        let mapped = line.map(|p| ctx.to_target.apply(p));
                        mask.stroke_polyline(&mapped, stroke.size * ctx.to_target.scale_factor());
                    }
                }
                layer.fill(&mask, color_of(stroke), Composite::SourceOver);
            }
            OverlayKind::Neon(stroke) => draw_neon(layer, stroke, ctx),
            OverlayKind::Brush(stroke) => draw_brush(layer, stroke, ctx),
            OverlayKind::Blur(stroke) => draw_blur(layer, stroke, background, ctx),
            OverlayKind::Eraser(stroke) => {
                let mask = stroke_mask(layer, stroke, ctx, stroke.size);
                layer.fill(&mask, OPAQUE_BLACK, Composite::DestinationOut);
            }
        }
    }
    layer.draw(background, Composite::DestinationAtop);
}

fn color_of(stroke: &Stroke) -> [f32; 4] {
    stroke.color.unwrap_or_default().to_rgba_f32(1.0)
}

/// Polyline of a stroke in image space: the flattened curve, else the raw points.
fn stroke_path(stroke: &Stroke, tolerance: f64) -> Vec<Point> {
    if stroke.curve.is_empty() {
        stroke.points.clone()
    } else {
        flatten(&stroke.curve, tolerance)
    }
}

fn stroke_mask(layer: &Surface, stroke: &Stroke, ctx: &OverlayContext, width: f64) -> Mask {
    let k = ctx.to_target.scale_factor();
    let path: Vec<Point> = stroke_path(stroke, 0.5 / k.max(1e-6))
        .into_iter()
        .map(|p| ctx.to_target.apply(p))
        .collect();
    let mut mask = layer.mask();
    mask.stroke_polyline(&path, width * k);
    mask
}

/// The two arrowhead lines at the end of a stroke.
fn arrowhead(points: &[Point]) -> Vec<[Point; 2]> {
    let [.., prev, last] = points else {
        return Vec::new();
    };
    let (dx, dy) = (last[0] - prev[0], last[1] - prev[1]);
    let length = dx.hypot(dy) * ARROWHEAD_LENGTH;
    let angle = dy.atan2(dx);
    [angle + ARROWHEAD_SPREAD, angle - ARROWHEAD_SPREAD]
        .into_iter()
        .map(|a| [*last, [last[0] - length * a.cos(), last[1] - length * a.sin()]])
        .collect()
}

fn draw_neon(layer: &mut Surface, stroke: &Stroke, ctx: &OverlayContext) {
    let color = stroke.color.unwrap_or_default();
    let mask = stroke_mask(layer, stroke, ctx, stroke.size);
    let Some(bounds) = mask.bounds() else {
        return;
    };
    let mut glow = Surface::new(layer.width(), layer.height());
    glow.fill(&mask, color.to_rgba_f32(1.0), Composite::SourceOver);
    let sigma = (stroke.size / 2.0 * ctx.to_target.scale_factor()) as f32;
    layer.draw(&glow.blurred(sigma, bounds), Composite::SourceOver);
    layer.fill(&mask, color.lightened(100).to_rgba_f32(1.0), Composite::SourceOver);
}

/// Ribbon segments of a brush stroke: each is the segment shifted by
/// `±size/2` along the normal of a smoothed direction.
fn brush_polygons(stroke: &Stroke, tolerance: f64) -> Vec<Vec<Point>> {
    let segments: Vec<Segment> = if stroke.curve.is_empty() {
        stroke
            .points
            .windows(2)
            .map(|w| Segment::Line([w[0], w[1]]))
            .collect()
    } else {
        stroke.curve.clone()
    };
    let Some(first) = stroke.first.or_else(|| super::brush_seed(&stroke.points)) else {
        return Vec::new();
    };

    let mut directions = vec![first];
    for segment in segments.iter().skip(1) {
        let [_, px, py] = directions[directions.len() - 1];
        let (start, end) = (segment.start(), segment.end());
        let next = match normalize([end[0] - start[0], end[1] - start[1]]) {
            Some([ux, uy]) => {
                let dx = ux * (1.0 - BRUSH_SMOOTHING) + px * BRUSH_SMOOTHING;
                let dy = uy * (1.0 - BRUSH_SMOOTHING) + py * BRUSH_SMOOTHING;
                [dy.atan2(dx), dx, dy]
            }
            None => [py.atan2(px), px, py],
        };
        directions.push(next);
    }

    let half = stroke.size * 0.5;
    segments
        .iter()
        .zip(&directions)
        .map(|(segment, [angle, _, _])| {
            let normal = angle + FRAC_PI_2;
            let offset = [half * normal.cos(), half * normal.sin()];
            let path = flatten(std::slice::from_ref(segment), tolerance);
            let left = path.iter().map(|p| [p[0] + offset[0], p[1] + offset[1]]);
            let right = path.iter().rev().map(|p| [p[0] - offset[0], p[1] - offset[1]]);
            left.chain(right).collect()
        })
        .collect()
}

fn draw_brush(layer: &mut Surface, stroke: &Stroke, ctx: &OverlayContext) {
    let k = ctx.to_target.scale_factor();
    let mut mask = layer.mask();
    if stroke.points.len() < 2 {
        let dot: Vec<Point> = stroke.points.iter().map(|p| ctx.to_target.apply(*p)).collect();
        mask.stroke_polyline(&dot, stroke.size * k);
    }
    for polygon in brush_polygons(stroke, 0.5 / k.max(1e-6)) {
        let mapped: Vec<Point> = polygon.iter().map(|p| ctx.to_target.apply(*p)).collect();
        let mut piece = layer.mask();
        piece.fill_polygon(&mapped);
        piece.stroke_closed(&mapped, stroke.size / 4.0 * k);
        mask.union(&piece);
    }
    layer.fill(&mask, color_of(stroke), Composite::SourceOver);
}

fn draw_blur(layer: &mut Surface, stroke: &Stroke, background: &Surface, ctx: &OverlayContext) {
    let mask = stroke_mask(layer, stroke, ctx, stroke.size);
    let Some(bounds) = mask.bounds() else {
        return;
    };
    let mut composed = layer.clone();
    composed.draw(background, Composite::DestinationAtop);
    let sigma = (stroke.size * ctx.to_target.scale_factor()) as f32;
    let mut blurred = composed.blurred(sigma, bounds);
    blurred.retain(&mask);
    layer.draw(&blurred, Composite::SourceOver);
}

fn draw_sticker(layer: &mut Surface, overlay: &Overlay, sticker: &StickerOverlay, ctx: &OverlayContext) {
    let Some(asset) = ctx.stickers.sticker(&sticker.asset_ref) else {
        return;
    };
    if asset.width() == 0 || asset.height() == 0 {
        return;
    }
    let transform = Affine::scaling_xy(
        sticker.width / asset.width() as f64,
        sticker.height / asset.height() as f64,
    )
    .then(&Affine::translation(-sticker.width / 2.0, -sticker.height / 2.0))
    .then(&placement(overlay))
    .then(&ctx.to_target);
    layer.draw_transformed(asset, &transform, Composite::SourceOver);
}

/// Overlay-local units to image space: scale, rotate, move to the center.
fn placement(overlay: &Overlay) -> Affine {
    Affine::scaling(overlay.scale)
        .then(&Affine::rotation(overlay.angle))
        .then(&Affine::translation(overlay.center[0], overlay.center[1]))
}

/// A rounded rectangle outline, clockwise.
pub(crate) fn rounded_rect(x: f64, y: f64, width: f64, height: f64, radius: f64) -> Vec<Point> {
    let r = radius.clamp(0.0, width.min(height) / 2.0);
    let corners = [
        ([x + width - r, y + r], -FRAC_PI_2),
        ([x + width - r, y + height - r], 0.0),
        ([x + r, y + height - r], FRAC_PI_2),
        ([x + r, y + r], std::f64::consts::PI),
    ];
    let mut out = Vec::with_capacity(4 * (CORNER_STEPS + 1));
    for (center, start) in corners {
        for step in 0..=CORNER_STEPS {
            let a = start + FRAC_PI_2 * step as f64 / CORNER_STEPS as f64;
            out.push([center[0] + r * a.cos(), center[1] + r * a.sin()]);
        }
    }
    out
}

/// Left edge of a line of `measured` width inside a box of `width`, relative to the box center.
fn line_start(align: TextAlign, width: f64, measured: f64) -> f64 {
    match align {
        TextAlign::Left => -width / 2.0,
        TextAlign::Center => -measured / 2.0,
        TextAlign::Right => width / 2.0 - measured,
    }
}

fn draw_text(layer: &mut Surface, overlay: &Overlay, text: &TextOverlay, ctx: &OverlayContext) {
    let density = ctx.to_target.scale_factor() * overlay.scale;
    if !(density.is_finite() && density > 0.0) {
        return;
    }
    let margin = text.size;
    let (box_w, box_h) = (text.width + margin * 2.0, text.height + margin * 2.0);
    let local_w = (box_w * density).ceil().clamp(1.0, 8192.0) as u32;
    let local_h = (box_h * density).ceil().clamp(1.0, 8192.0) as u32;
    let to_local = |p: Point| [(p[0] + box_w / 2.0) * density, (p[1] + box_h / 2.0) * density];

    let mut local = Surface::new(local_w, local_h);
    let mut glyphs = local.mask();
    let mut pills = local.mask();
    let lines: Vec<&str> = text.text.split('\n').collect();
    let line_height = text.height / lines.len() as f64;

    for (i, line) in lines.iter().enumerate() {
        let baseline = -text.height / 2.0 + line_height * (i as f64 + 0.5);
        let measured = ctx.fonts.measure(&text.font, text.size, line);
        let start = line_start(text.align, text.width, measured);
        if text.style == TextStyle::Fill {
            let pill_x = start - text.size * 0.35;
            let pill: Vec<Point> = rounded_rect(
                pill_x,
                baseline - line_height * 0.76,
                measured + text.size * 0.75,
                line_height,
                text.size * 0.5,
            )
            .into_iter()
            .map(to_local)
            .collect();
            pills.fill_polygon(&pill);
        }
        ctx.fonts.draw_line(
            &text.font,
            text.size * density,
            line,
            to_local([start, baseline]),
            &mut glyphs,
        );
    }

    let contrast = text.color.contrast();
    match text.style {
        TextStyle::None => local.fill(&glyphs, text.color.to_rgba_f32(1.0), Composite::SourceOver),
        TextStyle::Stroke => {
            let outline = glyphs.dilate(text.size * 0.1 * density);
            local.fill(&outline, contrast.to_rgba_f32(1.0), Composite::SourceOver);
            local.fill(&glyphs, text.color.to_rgba_f32(1.0), Composite::SourceOver);
        }
        TextStyle::Fill => {
            local.fill(&pills, text.color.to_rgba_f32(1.0), Composite::SourceOver);
            local.fill(&glyphs, contrast.to_rgba_f32(1.0), Composite::SourceOver);
        }
    }

    let transform = Affine::scaling(1.0 / density)
        .then(&Affine::translation(-box_w / 2.0, -box_h / 2.0))
        .then(&placement(overlay))
        .then(&ctx.to_target);
    layer.draw_transformed(&local, &transform, Composite::SourceOver);
}
