//! The interactive editing session.
//!
//! [`Editor`] owns the document, its history and everything needed to draw
//! it: the adjustment pipeline for the loaded image, decoded stickers and
//! registered fonts. Hosts feed it pointer events in client coordinates,
//! property setters from their widgets and a clock through [`Editor::tick`],
//! and read back rendered bitmaps and [`EditorEvent`]s.
//!
//! Pointer handling is a small state machine: `pointer_down` starts a
//! [`Drag`] chosen by the mode and the hit test, `pointer_move` updates the
//! live document, and `pointer_up` records the result in the history.

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adjustments::Adjustment;
use crate::color::{Color, ColorError};
use crate::config::EditorConfig;
use crate::decode::Bitmap;
use crate::geometry::Point;
use crate::history::{Applied, Debouncer, History, HistoryEntry, PendingCommit, SavedSession, SessionError};
use crate::overlay::{
    finish_stroke, hit_crop, hit_overlays, render_overlays, snap_center, Frame, Hit, Overlay, OverlayContext,
    OverlayKind, OverlayType, SnapGuides, StickerOverlay, Stroke, TextAlign, TextOverlay, TextStyle,
};
use crate::pipeline::{AdjustmentPipeline, PipelineError};
use crate::raster::{Affine, Composite, FontBook, FontError, Rgba32, Surface};
use crate::state::{Document, EditState};
use crate::transform::{AspectRatio, CropAnchor, CropRect, Placement};
use crate::view::{CropAnimation, ViewTransform, Viewport};

pub const MIN_DRAW_SIZE: f64 = 5.0;
pub const MAX_DRAW_SIZE: f64 = 50.0;

/// Radius of crop and selection handle dots, in image pixels.
const HANDLE_DOT_RADIUS: f64 = 4.0;

const GUIDE_COLOR: Color = Color::rgb(0x4f, 0xc1, 0xff);

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("no image loaded")]
    NoImage,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Font(#[from] FontError),
}

/// The active tool tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Adjust,
    Crop,
    Text,
    Draw,
    Sticker,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Adjust => "adjust",
            Mode::Crop => "crop",
            Mode::Text => "text",
            Mode::Draw => "draw",
            Mode::Sticker => "sticker",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Mode::Adjust, Mode::Crop, Mode::Text, Mode::Draw, Mode::Sticker]
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| format!("unknown mode: {s}"))
    }
}

/// Notifications for the widget layer, drained with [`Editor::drain_events`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditorEvent {
    /// Something visible changed; redraw.
    Changed,
    UndoStateChanged { undo: bool, redo: bool },
    TextSelected { index: usize },
    /// The host should decode this asset and call `provide_sticker`.
    StickerRequested {
        #[serde(rename = "assetRef")]
        asset_ref: String,
    },
}

/// Defaults for new freehand strokes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawSettings {
    pub tool: OverlayType,
    pub size: f64,
    /// Last color per tool; blur and eraser have none.
    pub colors: HashMap<OverlayType, Color>,
}

impl Default for DrawSettings {
    fn default() -> Self {
        Self {
            tool: OverlayType::Pen,
            size: 15.0,
            colors: HashMap::from([
                (OverlayType::Pen, Color::rgb(0xFE, 0x44, 0x38)),
                (OverlayType::Arrow, Color::rgb(0xFF, 0xD6, 0x0A)),
                (OverlayType::Brush, Color::rgb(0xFF, 0x89, 0x01)),
                (OverlayType::Neon, Color::rgb(0x62, 0xE5, 0xE0)),
            ]),
        }
    }
}

impl DrawSettings {
    /// Color for the current tool.
    pub fn color(&self) -> Option<Color> {
        if self.tool.has_color() {
            Some(self.colors.get(&self.tool).copied().unwrap_or_default())
        } else {
            None
        }
    }
}

/// Defaults for new text overlays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextSettings {
    pub color: Color,
    pub size: f64,
    pub font: String,
    pub align: TextAlign,
    pub style: TextStyle,
}

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            size: 24.0,
            font: "Roboto".to_string(),
            align: TextAlign::Center,
            style: TextStyle::None,
        }
    }
}

/// A pointer gesture in progress, with what it needs to finish or revert.
#[derive(Debug, Clone, PartialEq)]
pub enum Drag {
    /// Moving the whole crop rectangle.
    CropMove { start: Point, rect: CropRect },
    CropCorner {
        anchor: CropAnchor,
        start: Point,
        rect: CropRect,
    },
    OverlayMove {
        index: usize,
        start: Point,
        center: Point,
        before: Overlay,
    },
    OverlayRotate {
        index: usize,
        /// Pointer angle about the overlay center at drag start.
        pointer_angle: f64,
        angle: f64,
        before: Overlay,
    },
    /// Collecting points for the stroke at `index`.
    Stroke { index: usize },
    /// A tap on empty space in text mode.
    Place { at: Point },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Interaction {
    #[default]
    Idle,
    Dragging(Drag),
}

fn premultiplied(color: Color, alpha: f32) -> Rgba32 {
    let [r, g, b, _] = color.to_rgba_f32(1.0);
    [r * alpha, g * alpha, b * alpha, alpha]
}

pub struct Editor {
    config: EditorConfig,
    pipeline: Option<AdjustmentPipeline>,
    /// Pipeline output as a premultiplied surface.
    background: Option<Surface>,
    doc: Document,
    history: History,
    debouncer: Debouncer,
    animation: CropAnimation,
    mode: Mode,
    viewport: Viewport,
    crop_aspect: AspectRatio,
    draw: DrawSettings,
    text: TextSettings,
    selected: Option<usize>,
    interaction: Interaction,
    guides: SnapGuides,
    stickers: HashMap<String, Surface>,
    pending_stickers: Vec<String>,
    fonts: FontBook,
    events: Vec<EditorEvent>,
    now_ms: f64,
    destroyed: bool,
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("mode", &self.mode)
            .field("loaded", &self.pipeline.is_some())
            .field("state", &self.doc.state)
            .field("overlays", &self.doc.overlays.len())
            .field("history", &self.history.len())
            .field("undo_step", &self.history.undo_step())
            .finish()
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        let doc = Document::default();
        let history = History::new(doc.state);
        Self::with_parts(config, doc, history)
    }

    /// Reopen a saved session. Stickers it references are requested again.
    pub fn restore(session: SavedSession, config: EditorConfig) -> Result<Self, EditorError> {
        let (doc, history) = session.into_parts()?;
        let mut editor = Self::with_parts(config, doc, history);
        let refs: Vec<String> = editor
            .doc
            .overlays
            .iter()
            .filter_map(|o| o.as_sticker().map(|s| s.asset_ref.clone()))
            .collect();
        for asset_ref in refs {
            editor.request_sticker(&asset_ref);
        }
        tracing::debug!(
            overlays = editor.doc.overlays.len(),
            history = editor.history.len(),
            "session restored"
        );
        Ok(editor)
    }

    fn with_parts(config: EditorConfig, doc: Document, history: History) -> Self {
        Self {
            debouncer: Debouncer::new(config.debounce_ms),
            animation: CropAnimation::from_config(&config),
            config,
            pipeline: None,
            background: None,
            doc,
            history,
            mode: Mode::default(),
            viewport: Viewport::default(),
            crop_aspect: AspectRatio::Free,
            draw: DrawSettings::default(),
            text: TextSettings::default(),
            selected: None,
            interaction: Interaction::Idle,
            guides: SnapGuides::default(),
            stickers: HashMap::new(),
            pending_stickers: Vec::new(),
            fonts: FontBook::new(),
            events: Vec::new(),
            now_ms: 0.0,
            destroyed: false,
        }
    }

    /// Build the pipeline for a decoded source image.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::Pipeline` when the bitmap is empty or malformed;
    /// the previous image, if any, stays loaded.
    pub fn load_image(&mut self, source: Bitmap) -> Result<(), EditorError> {
        let pipeline = AdjustmentPipeline::new(source)?;
        let (w, h) = (pipeline.width() as f64, pipeline.height() as f64);
        self.pipeline = Some(pipeline);
        self.background = None;
        self.destroyed = false;
        if !self.doc.state.crop.is_valid(w, h) {
            self.doc.state.crop = self.doc.state.crop.clamped(w, h);
        }
        self.refresh_background();
        tracing::debug!(width = w, height = h, "image loaded");
        self.changed();
        Ok(())
    }

    /// Cancel timers and release the pipeline.
    pub fn destroy(&mut self) {
        self.cancel_interaction();
        self.debouncer.cancel();
        self.animation.cancel();
        self.pipeline = None;
        self.background = None;
        self.destroyed = true;
        tracing::debug!("editor destroyed");
    }

    pub fn register_font(&mut self, name: &str, bytes: Vec<u8>) -> Result<(), EditorError> {
        self.fonts.register(name, bytes)?;
        Ok(())
    }

    // ---- accessors ----

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn state(&self) -> &EditState {
        &self.doc.state
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.doc.overlays
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn draw_settings(&self) -> &DrawSettings {
        &self.draw
    }

    pub fn text_settings(&self) -> &TextSettings {
        &self.text
    }

    pub fn crop_aspect(&self) -> AspectRatio {
        self.crop_aspect
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn is_loaded(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Source size in pixels.
    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.pipeline.as_ref().map(|p| (p.width(), p.height()))
    }

    fn image_extent(&self) -> Option<(f64, f64)> {
        self.image_size().map(|(w, h)| (w as f64, h as f64))
    }

    /// Progress of the crop-mode transition, 0 to 1.
    pub fn crop_animation(&self) -> f64 {
        self.animation.value()
    }

    pub fn snap_guides(&self) -> SnapGuides {
        self.guides
    }

    pub fn pending_stickers(&self) -> &[String] {
        &self.pending_stickers
    }

    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        mem::take(&mut self.events)
    }

    fn changed(&mut self) {
        if self.events.last() != Some(&EditorEvent::Changed) {
            self.events.push(EditorEvent::Changed);
        }
    }

    fn emit_undo_state(&mut self) {
        self.events.push(EditorEvent::UndoStateChanged {
            undo: self.history.is_undo_available(),
            redo: self.history.is_redo_available(),
        });
    }

    // ---- clock ----

    /// Advance the clock: land a due debounced commit and step the crop animation.
    ///
    /// Returns whether a redraw is needed.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        if self.destroyed || !now_ms.is_finite() {
            return false;
        }
        self.now_ms = now_ms;
        if let Some(commit) = self.debouncer.due(now_ms) {
            self.land(commit);
        }
        let animated = self.animation.tick(now_ms);
        if animated {
            self.changed();
        }
        animated
    }

    // ---- coordinates ----

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = Viewport::new(width, height);
        self.changed();
    }

    /// The current client/image mapping.
    pub fn view(&self) -> ViewTransform {
        match self.image_extent() {
            Some((w, h)) => ViewTransform::compute(
                self.viewport,
                w,
                h,
                &self.doc.state.crop,
                self.animation.value(),
                &self.config,
            ),
            None => ViewTransform::default(),
        }
    }

    pub fn client_to_image(&self, p: Point) -> Point {
        self.view().client_to_image(p)
    }

    pub fn image_to_client(&self, p: Point) -> Point {
        self.view().image_to_client(p)
    }

    pub fn client_size_to_image(&self, size: f64) -> f64 {
        self.view().client_size_to_image(size)
    }

    pub fn image_size_to_client(&self, size: f64) -> f64 {
        self.view().image_size_to_client(size)
    }

    // ---- history ----

    fn land(&mut self, commit: PendingCommit) {
        let entry = match commit {
            PendingCommit::Snapshot => HistoryEntry::Snapshot(self.doc.state),
            PendingCommit::Entry(entry) => entry,
        };
        self.history.commit(entry);
        self.emit_undo_state();
    }

    fn flush_pending(&mut self) {
        if let Some(commit) = self.debouncer.take() {
            self.land(commit);
        }
    }

    fn commit_entry(&mut self, entry: HistoryEntry) {
        self.flush_pending();
        self.history.commit(entry);
        self.emit_undo_state();
    }

    fn schedule(&mut self, commit: PendingCommit) {
        if let Some(displaced) = self.debouncer.schedule(commit, self.now_ms) {
            self.land(displaced);
        }
    }

    /// Record a snapshot of the current state.
    pub fn commit(&mut self) {
        self.commit_entry(HistoryEntry::Snapshot(self.doc.state));
    }

    /// Record a snapshot once edits pause for the debounce period.
    pub fn commit_debounced(&mut self) {
        self.schedule(PendingCommit::Snapshot);
    }

    pub fn is_undo_available(&self) -> bool {
        self.history.is_undo_available() || self.debouncer.is_pending()
    }

    pub fn is_redo_available(&self) -> bool {
        !self.debouncer.is_pending() && self.history.is_redo_available()
    }

    pub fn undo(&mut self) {
        self.cancel_interaction();
        self.flush_pending();
        let applied = self.history.undo(&mut self.doc);
        self.after_history(applied);
    }

    pub fn redo(&mut self) {
        self.cancel_interaction();
        self.flush_pending();
        let applied = self.history.redo(&mut self.doc);
        if let Some(Applied::OverlayAdded(index)) = applied {
            let asset = self.doc.overlays[index].as_sticker().map(|s| s.asset_ref.clone());
            if let Some(asset_ref) = asset {
                self.request_sticker(&asset_ref);
            }
        }
        self.after_history(applied);
    }

    fn after_history(&mut self, applied: Option<Applied>) {
        if applied.is_none() {
            return;
        }
        self.selected = None;
        self.refresh_background();
        self.changed();
        self.emit_undo_state();
    }

    /// Everything needed to reopen this edit later.
    pub fn save_state(&mut self) -> SavedSession {
        self.flush_pending();
        SavedSession::new(&self.doc, &self.history)
    }

    // ---- adjustments ----

    fn refresh_background(&mut self) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        if self.background.is_some() && *pipeline.applied() == self.doc.state.adjustments {
            return;
        }
        pipeline.apply(&self.doc.state.adjustments);
        self.background = Some(Surface::from_bitmap(pipeline.output()));
    }

    /// Live, uncommitted adjustment change.
    pub fn change(&mut self, partial: &[(Adjustment, f32)]) {
        self.doc.state.adjustments.merge(partial);
        self.refresh_background();
        self.changed();
    }

    /// [`Editor::change`] keyed by adjustment name; unknown names are skipped.
    pub fn change_named(&mut self, partial: &HashMap<String, f32>) {
        let parsed: Vec<(Adjustment, f32)> = partial
            .iter()
            .filter_map(|(name, &value)| match name.parse::<Adjustment>() {
                Ok(adjustment) => Some((adjustment, value)),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping adjustment");
                    None
                }
            })
            .collect();
        self.change(&parsed);
    }

    // ---- crop ----

    /// Lock the crop to a sentinel aspect (0 free, -1 source, positive w/h) and recenter.
    pub fn set_crop_aspect(&mut self, sentinel: f64) {
        self.crop_aspect = AspectRatio::from_sentinel(sentinel);
        if let Some((w, h)) = self.image_extent() {
            if let Some(aspect) = self.crop_aspect.resolve(w, h) {
                self.doc.state.crop = self.doc.state.crop.with_aspect(aspect, w, h);
            }
        }
        self.commit();
        self.changed();
    }

    /// Rotate by the nearest multiple of 90 degrees.
    pub fn set_crop_rotation(&mut self, degrees: f64) {
        self.doc.state.rotate_by(degrees);
        self.commit();
        self.changed();
    }

    pub fn set_crop_angle(&mut self, degrees: f64) {
        self.doc.state.set_angle(degrees);
        self.commit();
        self.changed();
    }

    pub fn set_crop_flip(&mut self, flip: bool) {
        self.doc.state.flip = flip;
        self.commit();
        self.changed();
    }

    pub fn set_crop(&mut self, rect: CropRect) {
        self.doc.state.crop = match self.image_extent() {
            Some((w, h)) => rect.clamped(w, h),
            None => rect,
        };
        self.commit();
        self.changed();
    }

    // ---- mode ----

    pub fn set_mode(&mut self, mode: Mode) {
        self.cancel_interaction();
        self.selected = None;
        if mode != self.mode {
            tracing::debug!(from = %self.mode, to = %mode, "mode change");
        }
        self.mode = mode;
        let target = if mode == Mode::Crop { 1.0 } else { 0.0 };
        if self.animation.target() != target || self.animation.value() != target {
            self.animation.start(target, self.now_ms);
        }
        self.changed();
    }

    // ---- text ----

    fn selected_text(&self) -> Option<usize> {
        self.selected
            .filter(|&i| self.doc.overlays.get(i).is_some_and(|o| o.as_text().is_some()))
    }

    fn select(&mut self, index: usize) {
        self.selected = Some(index);
        if self.doc.overlays.get(index).is_some_and(|o| o.as_text().is_some()) {
            self.events.push(EditorEvent::TextSelected { index });
        }
    }

    /// Record the difference between `before` and the live overlay.
    fn record_change(&mut self, index: usize, before: &Overlay, debounced: bool) {
        let Some(after) = self.doc.overlays.get(index) else {
            return;
        };
        match Overlay::diff(before, after) {
            Ok((new, old)) => {
                if new.is_empty() {
                    return;
                }
                let entry = HistoryEntry::OverlayChanged { index, new, old };
                if debounced {
                    self.schedule(PendingCommit::Entry(entry));
                } else {
                    self.commit_entry(entry);
                }
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "overlay change not recorded, reverting");
                self.doc.overlays[index] = before.clone();
            }
        }
    }

    fn edit_selected_text<F>(&mut self, debounced: bool, edit: F)
    where
        F: FnOnce(&mut TextOverlay),
    {
        let Some(index) = self.selected_text() else {
            return;
        };
        let before = self.doc.overlays[index].clone();
        if let Some(text) = self.doc.overlays[index].as_text_mut() {
            edit(text);
            let (width, height) = self.fonts.measure_block(&text.font, text.size, &text.text);
            text.width = width;
            text.height = height;
        }
        self.record_change(index, &before, debounced);
        self.changed();
    }

    /// Add a text overlay with the current defaults, select it and record it.
    pub fn add_text(&mut self, center: Point, content: &str) -> usize {
        self.cancel_interaction();
        let settings = &self.text;
        let (width, height) = self.fonts.measure_block(&settings.font, settings.size, content);
        let overlay = Overlay::new(
            center,
            OverlayKind::Text(TextOverlay {
                text: content.to_string(),
                font: settings.font.clone(),
                size: settings.size,
                align: settings.align,
                style: settings.style,
                color: settings.color,
                width,
                height,
            }),
        );
        self.doc.overlays.push(overlay.clone());
        let index = self.doc.overlays.len() - 1;
        self.commit_entry(HistoryEntry::OverlayAdded(overlay));
        self.select(index);
        self.changed();
        index
    }

    /// Replace the selected text's content. Recorded after the debounce period.
    pub fn set_text(&mut self, content: &str) {
        self.edit_selected_text(true, |text| text.text = content.to_string());
    }

    /// # Errors
    ///
    /// Malformed input is rejected and nothing changes.
    pub fn set_text_color(&mut self, input: &str) -> Result<(), ColorError> {
        let color = Color::parse(input)?;
        self.text.color = color;
        self.edit_selected_text(false, |text| text.color = color);
        Ok(())
    }

    pub fn set_text_size(&mut self, size: f64) {
        if !(size.is_finite() && size > 0.0) {
            tracing::warn!(size, "ignoring text size");
            return;
        }
        self.text.size = size;
        self.edit_selected_text(true, |text| text.size = size);
    }

    pub fn set_text_font(&mut self, font: &str) {
        self.text.font = font.to_string();
        self.edit_selected_text(false, |text| text.font = font.to_string());
    }

    pub fn set_text_align(&mut self, align: TextAlign) {
        self.text.align = align;
        self.edit_selected_text(false, |text| text.align = align);
    }

    pub fn set_text_style(&mut self, style: TextStyle) {
        self.text.style = style;
        self.edit_selected_text(false, |text| text.style = style);
    }

    // ---- draw ----

    pub fn set_draw_tool(&mut self, tool: OverlayType) {
        if !tool.is_stroke() {
            tracing::warn!(?tool, "not a drawing tool");
            return;
        }
        self.draw.tool = tool;
    }

    /// Set the color of the current tool.
    pub fn set_draw_color(&mut self, input: &str) -> Result<(), ColorError> {
        let color = Color::parse(input)?;
        if self.draw.tool.has_color() {
            self.draw.colors.insert(self.draw.tool, color);
        }
        Ok(())
    }

    pub fn set_draw_size(&mut self, size: f64) {
        if size.is_finite() {
            self.draw.size = size.clamp(MIN_DRAW_SIZE, MAX_DRAW_SIZE);
        }
    }

    // ---- stickers ----

    fn request_sticker(&mut self, asset_ref: &str) {
        if self.stickers.contains_key(asset_ref) || self.pending_stickers.iter().any(|r| r == asset_ref) {
            return;
        }
        tracing::debug!(asset_ref, "sticker requested");
        self.pending_stickers.push(asset_ref.to_string());
        self.events.push(EditorEvent::StickerRequested {
            asset_ref: asset_ref.to_string(),
        });
    }

    /// Place a sticker of the given source size at the crop center.
    ///
    /// Returns `None` when no image is loaded.
    pub fn add_sticker(&mut self, asset_ref: &str, width: f64, height: f64) -> Option<usize> {
        self.cancel_interaction();
        let (w, h) = self.image_extent()?;
        let crop = self.doc.state.crop;
        let side = self
            .config
            .sticker_max_size
            .min(crop.width(w).min(crop.height(h)) * self.config.sticker_crop_fraction);
        let longest = width.max(height);
        let scale = if longest > 0.0 { side / longest } else { 1.0 };

        let mut overlay = Overlay::new(
            crop.center(w, h),
            OverlayKind::Sticker(StickerOverlay {
                asset_ref: asset_ref.to_string(),
                width,
                height,
            }),
        );
        overlay.scale = scale;
        self.doc.overlays.push(overlay.clone());
        let index = self.doc.overlays.len() - 1;
        self.commit_entry(HistoryEntry::OverlayAdded(overlay));
        self.select(index);
        self.request_sticker(asset_ref);
        self.changed();
        Some(index)
    }

    /// Hand over a decoded sticker asset.
    pub fn provide_sticker(&mut self, asset_ref: &str, bitmap: &Bitmap) {
        if !bitmap.is_valid() {
            self.sticker_failed(asset_ref);
            return;
        }
        self.pending_stickers.retain(|r| r != asset_ref);
        self.stickers.insert(asset_ref.to_string(), Surface::from_bitmap(bitmap));
        self.changed();
    }

    /// The asset could not be resolved; its overlays stay invisible.
    pub fn sticker_failed(&mut self, asset_ref: &str) {
        tracing::warn!(asset_ref, "sticker could not be resolved");
        self.pending_stickers.retain(|r| r != asset_ref);
    }

    // ---- pointer ----

    pub fn pointer_down(&mut self, client: Point) {
        if matches!(self.interaction, Interaction::Dragging(_)) {
            self.pointer_up(client);
        }
        let Some((w, h)) = self.image_extent() else {
            return;
        };
        let p = self.client_to_image(client);
        tracing::trace!(x = p[0], y = p[1], mode = %self.mode, "pointer down");
        let radius = self.config.handle_radius;

        let drag = match self.mode {
            Mode::Adjust => None,
            Mode::Crop => {
                let rect = self.doc.state.crop;
                Some(match hit_crop(p, &rect, w, h, radius) {
                    Some(anchor) => Drag::CropCorner { anchor, start: p, rect },
                    None => Drag::CropMove { start: p, rect },
                })
            }
            Mode::Draw => self.begin_stroke(p),
            Mode::Text | Mode::Sticker => {
                let target = if self.mode == Mode::Text {
                    OverlayType::Text
                } else {
                    OverlayType::Sticker
                };
                match hit_overlays(p, &self.doc.overlays, self.selected, target, radius) {
                    Some(Hit::Corner(index)) => {
                        let overlay = &self.doc.overlays[index];
                        let c = overlay.center;
                        Some(Drag::OverlayRotate {
                            index,
                            pointer_angle: (p[1] - c[1]).atan2(p[0] - c[0]),
                            angle: overlay.angle,
                            before: overlay.clone(),
                        })
                    }
                    Some(Hit::Select(index)) => {
                        self.select(index);
                        let overlay = &self.doc.overlays[index];
                        Some(Drag::OverlayMove {
                            index,
                            start: p,
                            center: overlay.center,
                            before: overlay.clone(),
                        })
                    }
                    Some(Hit::Crop(_)) | None => {
                        self.selected = None;
                        (self.mode == Mode::Text).then_some(Drag::Place { at: p })
                    }
                }
            }
        };
        self.interaction = drag.map_or(Interaction::Idle, Interaction::Dragging);
        self.changed();
    }

    fn begin_stroke(&mut self, p: Point) -> Option<Drag> {
        let stroke = Stroke::new(p, self.draw.size, self.draw.color());
        let overlay = Overlay::from_stroke(self.draw.tool, stroke)?;
        self.doc.overlays.push(overlay);
        Some(Drag::Stroke {
            index: self.doc.overlays.len() - 1,
        })
    }

    pub fn pointer_move(&mut self, client: Point) {
        let Interaction::Dragging(drag) = mem::take(&mut self.interaction) else {
            return;
        };
        let Some((w, h)) = self.image_extent() else {
            return;
        };
        let p = self.client_to_image(client);
        tracing::trace!(x = p[0], y = p[1], "pointer move");
        self.guides = SnapGuides::default();

        match &drag {
            Drag::CropMove { start, rect } => {
                self.doc.state.crop = rect.translated(p[0] - start[0], p[1] - start[1]);
            }
            Drag::CropCorner { anchor, start, rect } => {
                let aspect = self.crop_aspect.resolve(w, h);
                self.doc.state.crop =
                    rect.drag_corner(*anchor, p[0] - start[0], p[1] - start[1], aspect, w, h);
            }
            Drag::OverlayMove {
                index, start, center, ..
            } => {
                let crop_center = self.doc.state.crop.center(w, h);
                if let Some(overlay) = self.doc.overlays.get_mut(*index) {
                    let moved = [center[0] + p[0] - start[0], center[1] + p[1] - start[1]];
                    let offset = overlay.as_text().map_or(0.0, |t| t.size * 0.3);
                    let (snapped, guides) = snap_center(moved, crop_center, offset, self.config.snap_distance);
                    overlay.center = snapped;
                    self.guides = guides;
                }
            }
            Drag::OverlayRotate {
                index,
                pointer_angle,
                angle,
                ..
            } => {
                if let Some(overlay) = self.doc.overlays.get_mut(*index) {
                    let c = overlay.center;
                    overlay.angle = angle + ((p[1] - c[1]).atan2(p[0] - c[0]) - pointer_angle);
                }
            }
            Drag::Stroke { index } => {
                if let Some(stroke) = self.doc.overlays.get_mut(*index).and_then(Overlay::as_stroke_mut) {
                    if stroke.points.last() != Some(&p) {
                        stroke.points.push(p);
                    }
                }
            }
            Drag::Place { .. } => {}
        }
        self.interaction = Interaction::Dragging(drag);
        self.changed();
    }

    pub fn pointer_up(&mut self, client: Point) {
        let Interaction::Dragging(drag) = mem::take(&mut self.interaction) else {
            return;
        };
        tracing::trace!(x = client[0], y = client[1], "pointer up");
        self.guides = SnapGuides::default();
        match drag {
            Drag::CropMove { rect, .. } | Drag::CropCorner { rect, .. } => {
                if self.doc.state.crop != rect {
                    self.commit();
                }
            }
            Drag::OverlayMove { index, before, .. } | Drag::OverlayRotate { index, before, .. } => {
                self.record_change(index, &before, false);
            }
            Drag::Stroke { index } => self.complete_stroke(index),
            Drag::Place { at } => {
                self.add_text(at, "");
            }
        }
        self.changed();
    }

    /// Abandon the current gesture and undo its live effects.
    pub fn pointer_cancel(&mut self) {
        self.cancel_interaction();
        self.changed();
    }

    fn cancel_interaction(&mut self) {
        self.guides = SnapGuides::default();
        let Interaction::Dragging(drag) = mem::take(&mut self.interaction) else {
            return;
        };
        match drag {
            Drag::Stroke { index } => {
                if index + 1 == self.doc.overlays.len() {
                    self.doc.overlays.pop();
                }
            }
            Drag::OverlayMove { index, before, .. } | Drag::OverlayRotate { index, before, .. } => {
                if let Some(slot) = self.doc.overlays.get_mut(index) {
                    *slot = before;
                }
            }
            Drag::CropMove { rect, .. } | Drag::CropCorner { rect, .. } => self.doc.state.crop = rect,
            Drag::Place { .. } => {}
        }
    }

    fn complete_stroke(&mut self, index: usize) {
        let fit = self.config.stroke_fit();
        let Some(overlay) = self.doc.overlays.get_mut(index) else {
            return;
        };
        finish_stroke(overlay, &fit);
        let entry = HistoryEntry::OverlayAdded(overlay.clone());
        self.commit_entry(entry);
    }

    // ---- rendering ----

    fn placement(&self, width: u32, height: u32) -> Placement {
        let state = &self.doc.state;
        Placement::new(
            state.total_rotation(),
            state.crop.center(width as f64, height as f64),
            self.config.mirrored(state.flip),
            width,
        )
    }

    /// The cropped result at source resolution.
    pub fn render_final_image(&self) -> Result<Bitmap, EditorError> {
        let (Some(pipeline), Some(source)) = (self.pipeline.as_ref(), self.background.as_ref()) else {
            return Err(EditorError::NoImage);
        };
        let (w, h) = (pipeline.width(), pipeline.height());
        let region = self.doc.state.crop.region(w, h);
        let [ox, oy] = region.origin;

        let mut background = Surface::new(region.width, region.height);
        self.placement(w, h)
            .draw(source, &mut background, Composite::SourceOver, |p| [p[0] + ox, p[1] + oy]);

        let mut layer = Surface::new(region.width, region.height);
        let ctx = OverlayContext {
            to_target: Affine::translation(-ox, -oy),
            fonts: &self.fonts,
            stickers: &self.stickers,
            active: None,
        };
        render_overlays(&mut layer, &self.doc.overlays, &background, &ctx);
        tracing::debug!(width = region.width, height = region.height, "final image rendered");
        Ok(layer.to_bitmap())
    }

    /// The editing view at viewport size, with crop chrome, handles and guides.
    ///
    /// `None` until an image is loaded and the viewport has a size.
    pub fn render_view(&self) -> Option<Bitmap> {
        let (pipeline, source) = (self.pipeline.as_ref()?, self.background.as_ref()?);
        if self.viewport.is_empty() {
            return None;
        }
        let (w, h) = (pipeline.width(), pipeline.height());
        let (iw, ih) = (w as f64, h as f64);
        let (vw, vh) = (
            self.viewport.width.round() as u32,
            self.viewport.height.round() as u32,
        );
        let view = self.view();
        let to_client = view.to_affine();

        let mut background = Surface::new(vw, vh);
        self.placement(w, h)
            .draw(source, &mut background, Composite::SourceOver, |p| view.client_to_image(p));

        let mut layer = Surface::new(vw, vh);
        self.paint_guides(&mut layer, &to_client, iw, ih);
        let active = match self.interaction {
            Interaction::Dragging(Drag::Stroke { index }) => Some(index),
            _ => None,
        };
        let ctx = OverlayContext {
            to_target: to_client,
            fonts: &self.fonts,
            stickers: &self.stickers,
            active,
        };
        render_overlays(&mut layer, &self.doc.overlays, &background, &ctx);

        let crop = &self.doc.state.crop;
        let outline = crop_outline(crop, iw, ih).map(|p| to_client.apply(p));
        if self.mode != Mode::Crop {
            let mut clip = layer.mask();
            clip.fill_polygon(&outline);
            layer.retain(&clip);
        }
        self.paint_selection(&mut layer, &to_client);
        if self.mode == Mode::Crop {
            self.paint_crop_chrome(&mut layer, &to_client, iw, ih);
        }
        Some(layer.to_bitmap())
    }

    fn paint_guides(&self, layer: &mut Surface, to_client: &Affine, width: f64, height: f64) {
        let SnapGuides { x, y } = self.guides;
        if x.is_none() && y.is_none() {
            return;
        }
        let k = to_client.scale_factor();
        let mut mask = layer.mask();
        if let Some(x) = x {
            mask.stroke_polyline(&[to_client.apply([x, 0.0]), to_client.apply([x, height])], k);
        }
        if let Some(y) = y {
            mask.stroke_polyline(&[to_client.apply([0.0, y]), to_client.apply([width, y])], k);
        }
        layer.fill(&mask, premultiplied(GUIDE_COLOR, 1.0), Composite::SourceOver);
    }

    fn paint_selection(&self, layer: &mut Surface, to_client: &Affine) {
        let Some(frame) = self.selected.and_then(|i| self.doc.overlays.get(i)).and_then(Frame::of) else {
            return;
        };
        let k = to_client.scale_factor();
        let [tl, tr, bl, br] = frame.corners().map(|p| to_client.apply(p));
        let mut outline = layer.mask();
        outline.stroke_closed(&[tl, tr, br, bl], k);
        layer.fill(&outline, premultiplied(Color::WHITE, 0.3), Composite::SourceOver);
        paint_dots(layer, &[tl, tr, bl, br], HANDLE_DOT_RADIUS * k);
    }

    fn paint_crop_chrome(&self, layer: &mut Surface, to_client: &Affine, width: f64, height: f64) {
        let crop = &self.doc.state.crop;
        let [x0, y0] = crop.origin();
        let (cw, ch) = (crop.width(width), crop.height(height));
        let k = to_client.scale_factor();

        let corners = crop_outline(crop, width, height).map(|p| to_client.apply(p));
        let mut lines = layer.mask();
        lines.stroke_closed(&corners, k);
        for t in [1.0 / 3.0, 2.0 / 3.0] {
            let vertical = [[x0 + cw * t, y0], [x0 + cw * t, y0 + ch]];
            let horizontal = [[x0, y0 + ch * t], [x0 + cw, y0 + ch * t]];
            lines.stroke_polyline(&vertical.map(|p| to_client.apply(p)), k);
            lines.stroke_polyline(&horizontal.map(|p| to_client.apply(p)), k);
        }
        layer.fill(&lines, premultiplied(Color::WHITE, 0.33), Composite::SourceOver);
        paint_dots(layer, &corners, HANDLE_DOT_RADIUS * k);
    }
}

/// Crop rectangle corners, clockwise from the top left.
fn crop_outline(crop: &CropRect, width: f64, height: f64) -> [Point; 4] {
    [
        crop.corner(CropAnchor::TopLeft, width, height),
        crop.corner(CropAnchor::TopRight, width, height),
        crop.corner(CropAnchor::BottomRight, width, height),
        crop.corner(CropAnchor::BottomLeft, width, height),
    ]
}

fn paint_dots(layer: &mut Surface, centers: &[Point], radius: f64) {
    let mut dots = layer.mask();
    for &c in centers {
        dots.stroke_polyline(&[c], radius * 2.0);
    }
    layer.fill(&dots, premultiplied(Color::WHITE, 1.0), Composite::SourceOver);
}

impl Drop for Editor {
    fn drop(&mut self) {
        if !self.destroyed {
            self.destroy();
        }
    }
}
