//! Editing session bindings.
//!
//! `JsEditor` wraps the core `Editor`. Structured values cross the boundary
//! either as plain JS objects (via `serde-wasm-bindgen`) or, for saved
//! sessions and configuration, as JSON strings the host can store verbatim.
//!
//! # Example
//!
//! ```typescript
//! import { JsEditor, decode_image } from '@retouch/wasm';
//!
//! const editor = new JsEditor(undefined);
//! editor.load_image(decode_image(bytes));
//! editor.set_viewport(canvas.width, canvas.height);
//!
//! editor.change({ brightness: 0.2 });
//! editor.commit_debounced();
//!
//! function frame(now: number) {
//!   editor.tick(now);
//!   for (const event of editor.drain_events()) handle(event);
//!   requestAnimationFrame(frame);
//! }
//! ```

use std::collections::HashMap;

use crate::types::JsBitmap;
use retouch_core::editor::{Editor, Mode};
use retouch_core::history::SavedSession;
use retouch_core::overlay::{OverlayType, TextAlign, TextStyle};
use retouch_core::transform::CropRect;
use retouch_core::EditorConfig;
use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Parse a lowercase variant name such as `"center"` or `"neon"`.
fn parse_name<T: DeserializeOwned>(value: &str) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
}

fn parse_config(json: Option<String>) -> Result<EditorConfig, serde_json::Error> {
    match json {
        Some(json) if !json.trim().is_empty() => EditorConfig::from_json(&json),
        _ => Ok(EditorConfig::default()),
    }
}

/// An editing session for one image.
#[wasm_bindgen]
pub struct JsEditor {
    inner: Editor,
}

#[wasm_bindgen]
impl JsEditor {
    /// Create an empty session. `config_json` may be omitted for defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<JsEditor, JsValue> {
        let config = parse_config(config_json).map_err(js_error)?;
        Ok(JsEditor {
            inner: Editor::new(config),
        })
    }

    /// Reopen a session saved with `save_state`.
    ///
    /// Sticker assets referenced by the session are requested again through
    /// `sticker_requested` events.
    pub fn restore(session_json: &str, config_json: Option<String>) -> Result<JsEditor, JsValue> {
        let config = parse_config(config_json).map_err(js_error)?;
        let session = SavedSession::from_json(session_json).map_err(js_error)?;
        let inner = Editor::restore(session, config).map_err(js_error)?;
        Ok(JsEditor { inner })
    }

    pub fn load_image(&mut self, image: &JsBitmap) -> Result<(), JsValue> {
        self.inner.load_image(image.to_bitmap()).map_err(js_error)
    }

    /// Stop timers and release the pipeline.
    pub fn destroy(&mut self) {
        self.inner.destroy();
    }

    pub fn register_font(&mut self, name: &str, bytes: Vec<u8>) -> Result<(), JsValue> {
        self.inner.register_font(name, bytes).map_err(js_error)
    }

    // ---- adjustments ----

    /// Apply a partial `{ name: value }` map without recording it.
    pub fn change(&mut self, adjustments: JsValue) -> Result<(), JsValue> {
        let partial: HashMap<String, f32> = serde_wasm_bindgen::from_value(adjustments)
            .map_err(|e| JsValue::from_str(&format!("Invalid adjustments: {}", e)))?;
        self.inner.change_named(&partial);
        Ok(())
    }

    pub fn commit(&mut self) {
        self.inner.commit();
    }

    pub fn commit_debounced(&mut self) {
        self.inner.commit_debounced();
    }

    // ---- crop ----

    /// 0 for free, -1 for the source aspect, otherwise width / height.
    pub fn set_crop_aspect(&mut self, aspect: f64) {
        self.inner.set_crop_aspect(aspect);
    }

    pub fn set_crop_rotation(&mut self, degrees: f64) {
        self.inner.set_crop_rotation(degrees);
    }

    pub fn set_crop_angle(&mut self, degrees: f64) {
        self.inner.set_crop_angle(degrees);
    }

    pub fn set_crop_flip(&mut self, flip: bool) {
        self.inner.set_crop_flip(flip);
    }

    /// Set the crop insets in image pixels.
    pub fn set_crop(&mut self, left: f64, top: f64, right: f64, bottom: f64) {
        self.inner.set_crop(CropRect::new(left, top, right, bottom));
    }

    // ---- mode ----

    /// One of `adjust`, `crop`, `text`, `draw`, `sticker`.
    pub fn set_mode(&mut self, mode: &str) -> Result<(), JsValue> {
        let mode: Mode = mode.parse().map_err(|e: String| JsValue::from_str(&e))?;
        self.inner.set_mode(mode);
        Ok(())
    }

    #[wasm_bindgen(getter)]
    pub fn mode(&self) -> String {
        self.inner.mode().to_string()
    }

    // ---- text ----

    /// Add a text overlay at an image-space point; returns its index.
    pub fn add_text(&mut self, x: f64, y: f64, content: &str) -> usize {
        self.inner.add_text([x, y], content)
    }

    pub fn set_text(&mut self, content: &str) {
        self.inner.set_text(content);
    }

    pub fn set_text_color(&mut self, color: &str) -> Result<(), JsValue> {
        self.inner.set_text_color(color).map_err(js_error)
    }

    pub fn set_text_size(&mut self, size: f64) {
        self.inner.set_text_size(size);
    }

    pub fn set_text_font(&mut self, font: &str) {
        self.inner.set_text_font(font);
    }

    /// One of `left`, `center`, `right`.
    pub fn set_text_align(&mut self, align: &str) -> Result<(), JsValue> {
        let align: TextAlign = parse_name(align).map_err(js_error)?;
        self.inner.set_text_align(align);
        Ok(())
    }

    /// One of `none`, `stroke`, `fill`.
    pub fn set_text_style(&mut self, style: &str) -> Result<(), JsValue> {
        let style: TextStyle = parse_name(style).map_err(js_error)?;
        self.inner.set_text_style(style);
        Ok(())
    }

    // ---- draw ----

    /// One of `pen`, `arrow`, `brush`, `neon`, `blur`, `eraser`.
    pub fn set_draw_tool(&mut self, tool: &str) -> Result<(), JsValue> {
        let tool: OverlayType = parse_name(tool).map_err(js_error)?;
        self.inner.set_draw_tool(tool);
        Ok(())
    }

    pub fn set_draw_color(&mut self, color: &str) -> Result<(), JsValue> {
        self.inner.set_draw_color(color).map_err(js_error)
    }

    pub fn set_draw_size(&mut self, size: f64) {
        self.inner.set_draw_size(size);
    }

    // ---- stickers ----

    /// Place a sticker whose source is `width` x `height`; returns its index.
    pub fn add_sticker(&mut self, asset_ref: &str, width: f64, height: f64) -> Option<usize> {
        self.inner.add_sticker(asset_ref, width, height)
    }

    pub fn provide_sticker(&mut self, asset_ref: &str, image: &JsBitmap) {
        self.inner.provide_sticker(asset_ref, &image.to_bitmap());
    }

    pub fn sticker_failed(&mut self, asset_ref: &str) {
        self.inner.sticker_failed(asset_ref);
    }

    // ---- pointer ----

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.inner.pointer_down([x, y]);
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        self.inner.pointer_move([x, y]);
    }

    pub fn pointer_up(&mut self, x: f64, y: f64) {
        self.inner.pointer_up([x, y]);
    }

    pub fn pointer_cancel(&mut self) {
        self.inner.pointer_cancel();
    }

    // ---- history ----

    pub fn undo(&mut self) {
        self.inner.undo();
    }

    pub fn redo(&mut self) {
        self.inner.redo();
    }

    pub fn is_undo_available(&self) -> bool {
        self.inner.is_undo_available()
    }

    pub fn is_redo_available(&self) -> bool {
        self.inner.is_redo_available()
    }

    /// The session as JSON, for `restore`.
    pub fn save_state(&mut self) -> Result<String, JsValue> {
        self.inner.save_state().to_json().map_err(js_error)
    }

    // ---- output ----

    /// The edited image, cropped, at source resolution.
    pub fn render_final_image(&self) -> Result<JsBitmap, JsValue> {
        self.inner
            .render_final_image()
            .map(JsBitmap::from_bitmap)
            .map_err(js_error)
    }

    /// The editing view at viewport size.
    pub fn render_view(&self) -> Option<JsBitmap> {
        self.inner.render_view().map(JsBitmap::from_bitmap)
    }

    /// Events since the last call, as `{ type, ... }` objects.
    pub fn drain_events(&mut self) -> Result<JsValue, JsValue> {
        let events = self.inner.drain_events();
        serde_wasm_bindgen::to_value(&events).map_err(js_error)
    }

    /// Current edit state as JSON.
    pub fn state(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.inner.state()).map_err(js_error)
    }

    /// Overlays as JSON.
    pub fn overlays(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.inner.overlays()).map_err(js_error)
    }

    #[wasm_bindgen(getter)]
    pub fn selected(&self) -> Option<usize> {
        self.inner.selected()
    }

    pub fn snap_guides(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.inner.snap_guides()).map_err(js_error)
    }

    // ---- clock and view ----

    /// Advance to `now` milliseconds; returns whether a redraw is needed.
    pub fn tick(&mut self, now: f64) -> bool {
        self.inner.tick(now)
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.inner.set_viewport(width, height);
    }

    /// `[x, y]` in image pixels.
    pub fn client_to_image(&self, x: f64, y: f64) -> Vec<f64> {
        self.inner.client_to_image([x, y]).to_vec()
    }

    /// `[x, y]` in client pixels.
    pub fn image_to_client(&self, x: f64, y: f64) -> Vec<f64> {
        self.inner.image_to_client([x, y]).to_vec()
    }

    pub fn client_size_to_image(&self, size: f64) -> f64 {
        self.inner.client_size_to_image(size)
    }

    pub fn image_size_to_client(&self, size: f64) -> f64 {
        self.inner.image_size_to_client(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_editor() -> JsEditor {
        let mut editor = JsEditor::new(None).unwrap();
        editor
            .load_image(&JsBitmap::new(40, 30, vec![128u8; 40 * 30 * 4]))
            .unwrap();
        editor
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(parse_name::<TextAlign>("right").unwrap(), TextAlign::Right);
        assert_eq!(parse_name::<TextStyle>("fill").unwrap(), TextStyle::Fill);
        assert_eq!(parse_name::<OverlayType>("neon").unwrap(), OverlayType::Neon);
        assert!(parse_name::<OverlayType>("crayon").is_err());
    }

    #[test]
    fn test_parse_config() {
        assert_eq!(parse_config(None).unwrap(), EditorConfig::default());
        assert_eq!(parse_config(Some("  ".to_string())).unwrap(), EditorConfig::default());
        let config = parse_config(Some(r#"{"debounce_ms": 250}"#.to_string())).unwrap();
        assert_eq!(config.debounce_ms, 250.0);
    }

    #[test]
    fn test_crop_and_render() {
        let mut editor = gray_editor();
        editor.set_crop(5.0, 0.0, 5.0, 10.0);
        let out = editor.render_final_image().unwrap();
        assert_eq!((out.width(), out.height()), (30, 20));
        assert!(editor.is_undo_available());
        editor.undo();
        assert!(editor.is_redo_available());
    }

    #[test]
    fn test_save_and_restore() {
        let mut editor = gray_editor();
        editor.add_text(20.0, 15.0, "Hi");
        let saved = editor.save_state().unwrap();
        let restored = JsEditor::restore(&saved, None).unwrap();
        assert_eq!(restored.overlays().unwrap(), editor.overlays().unwrap());
        assert_eq!(restored.state().unwrap(), editor.state().unwrap());
    }

    #[test]
    fn test_view_mapping() {
        let mut editor = gray_editor();
        editor.set_viewport(80.0, 60.0);
        assert_eq!(editor.image_to_client(0.0, 0.0), vec![0.0, 0.0]);
        assert_eq!(editor.client_to_image(80.0, 60.0), vec![40.0, 30.0]);
        assert_eq!(editor.image_size_to_client(3.0), 6.0);
        assert!(editor.render_view().is_some());
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_bad_inputs_error() {
        let mut editor = JsEditor::new(None).unwrap();
        assert!(editor.set_mode("paint").is_err());
        assert!(editor.set_text_color("nope").is_err());
        assert!(editor.set_text_align("justify").is_err());
        assert!(editor.render_final_image().is_err());
        assert!(JsEditor::restore("{", None).is_err());
    }

    #[wasm_bindgen_test]
    fn test_change_from_object() {
        #[derive(serde::Serialize)]
        struct Partial {
            brightness: f32,
        }
        let mut editor = JsEditor::new(None).unwrap();
        let value = serde_wasm_bindgen::to_value(&Partial { brightness: 0.3 }).unwrap();
        editor.change(value).unwrap();
        assert!(editor.state().unwrap().contains("\"brightness\":0.3"));
    }

    #[wasm_bindgen_test]
    fn test_events_are_objects() {
        let mut editor = JsEditor::new(None).unwrap();
        editor.set_crop_flip(true);
        let events = editor.drain_events().unwrap();
        assert!(js_sys::Array::is_array(&events));
        assert!(js_sys::Array::from(&events).length() > 0);
    }
}
