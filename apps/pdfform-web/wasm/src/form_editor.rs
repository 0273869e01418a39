//! Stateful overlay editor for the browser
//!
//! Holds the page overlays and the answer map in Rust memory. JavaScript
//! forwards pointer and key events, renders the returned field views and
//! inspector state, and performs the network calls itself.

use pdfform_core::answers::{extract_inline_blobs, InlineBlob};
use pdfform_core::config_store::{canvas_field_ids, hydrate_for_fill, parse_configuration};
use pdfform_core::{
    AnswerMap, ContainerRect, FieldEdit, FieldView, FillEvent, FormError, HitTarget,
    InspectorCommand, InspectorState, OverlayEditor, OverlayMode, PageConfiguration, Point,
    PointerButton, Rect,
};
use serde::Serialize;
use tracing::warn;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    /// Teacher draws and configures fields
    Edit,
    /// Student fills the fields
    Fill,
    /// Submission review
    ReadOnly,
}

impl From<EditorMode> for OverlayMode {
    fn from(mode: EditorMode) -> Self {
        match mode {
            EditorMode::Edit => OverlayMode::Edit,
            EditorMode::Fill => OverlayMode::Fill,
            EditorMode::ReadOnly => OverlayMode::ReadOnly,
        }
    }
}

/// Answers with inline images split out, ready for upload.
#[derive(Debug, Serialize)]
pub struct PreparedAnswers {
    pub values: AnswerMap,
    pub blobs: Vec<InlineBlob>,
}

#[wasm_bindgen]
pub struct FormEditor {
    editor: OverlayEditor,
    answers: AnswerMap,
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn js_error(e: FormError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn parse_json<'a, T: serde::Deserialize<'a>>(json: &'a str, what: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", what, e)))
}

#[wasm_bindgen]
impl FormEditor {
    /// Create an editor from a stored configuration document.
    ///
    /// In fill and read-only modes a malformed configuration opens with no
    /// fields. Edit mode rejects it, since saving would overwrite the stored
    /// pages. `answers_json` restores a draft or a submission and may be
    /// empty.
    #[wasm_bindgen(constructor)]
    pub fn new(
        config_json: &str,
        answers_json: &str,
        page_count: u32,
        mode: EditorMode,
    ) -> Result<FormEditor, JsValue> {
        console_error_panic_hook::set_once();
        Self::from_json(config_json, answers_json, page_count, mode).map_err(js_error)
    }

    #[wasm_bindgen(getter)]
    pub fn mode(&self) -> EditorMode {
        match self.editor.mode() {
            OverlayMode::Edit => EditorMode::Edit,
            OverlayMode::Fill => EditorMode::Fill,
            OverlayMode::ReadOnly => EditorMode::ReadOnly,
        }
    }

    #[wasm_bindgen(getter, js_name = currentPage)]
    pub fn current_page(&self) -> u32 {
        self.editor.current_page()
    }

    #[wasm_bindgen(getter, js_name = pageCount)]
    pub fn page_count(&self) -> u32 {
        self.editor.page_count()
    }

    #[wasm_bindgen(js_name = setPageCount)]
    pub fn set_page_count(&mut self, page_count: u32) {
        self.editor.set_page_count(page_count);
    }

    #[wasm_bindgen(js_name = goToPage)]
    pub fn go_to_page(&mut self, page: u32) -> bool {
        self.editor.go_to_page(page)
    }

    /// Record the page container's bounding box; only the first call counts.
    #[wasm_bindgen(js_name = captureContainer)]
    pub fn capture_container(&mut self, left: f64, top: f64, width: f64, height: f64) {
        self.editor
            .overlay_mut()
            .capture_container(ContainerRect::new(left, top, width, height));
    }

    /// `button` follows `MouseEvent.button`: 0 primary, 2 secondary.
    /// `hit_json` describes the event target, e.g. `{"kind":"fieldMark","id":"text-1"}`.
    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self, x: f64, y: f64, button: u8, hit_json: &str) -> Result<bool, JsValue> {
        let hit: HitTarget = parse_json(hit_json, "hit target")?;
        Ok(self.pointer_down_internal(Point::new(x, y), pointer_button(button), &hit))
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        self.editor.overlay_mut().pointer_move(Point::new(x, y));
    }

    /// Live rectangle while a field is being drawn, or null.
    #[wasm_bindgen(js_name = drawingRect)]
    pub fn drawing_rect(&self) -> Result<JsValue, JsValue> {
        to_js(&self.editor.overlay().drawing_rect())
    }

    /// Finish a drag; returns the new field's id.
    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self, x: f64, y: f64) -> Option<String> {
        self.editor.overlay_mut().pointer_up(Point::new(x, y))
    }

    #[wasm_bindgen(js_name = keyDown)]
    pub fn key_down(&mut self, key: &str) -> bool {
        self.editor.handle_key(key)
    }

    #[wasm_bindgen(js_name = applyCommand)]
    pub fn apply_command(&mut self, command_json: &str) -> Result<(), JsValue> {
        let command: InspectorCommand = parse_json(command_json, "inspector command")?;
        self.editor
            .overlay_mut()
            .apply_command(&command)
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = editField)]
    pub fn edit_field(&mut self, field_id: &str, edit_json: &str) -> Result<(), JsValue> {
        let edit: FieldEdit = parse_json(edit_json, "field edit")?;
        self.editor
            .overlay_mut()
            .edit_field(field_id, &edit)
            .map_err(js_error)
    }

    /// Record a fill-mode change; `event_json` is a `FillEvent`.
    pub fn fill(&mut self, field_id: &str, event_json: &str) -> Result<(), JsValue> {
        let event: FillEvent = parse_json(event_json, "fill event")?;
        self.fill_internal(field_id, &event).map_err(js_error)
    }

    /// Field views of the current page.
    pub fn views(&self) -> Result<JsValue, JsValue> {
        to_js(&self.views_internal())
    }

    pub fn inspector(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inspector_internal())
    }

    pub fn answers(&self) -> Result<JsValue, JsValue> {
        to_js(&self.answers)
    }

    /// Configuration JSON to send to the server.
    #[wasm_bindgen(js_name = serializeForSave)]
    pub fn serialize_for_save(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.editor.serialize_for_save())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Adopt a configuration the server accepted.
    #[wasm_bindgen(js_name = markSaved)]
    pub fn mark_saved(&mut self, config_json: &str) -> Result<(), JsValue> {
        let config = parse_configuration(config_json).map_err(js_error)?;
        self.editor.mark_saved(config);
        Ok(())
    }

    /// `{values, blobs}` body for a draft or submission upload.
    #[wasm_bindgen(js_name = prepareAnswers)]
    pub fn prepare_answers(&self) -> Result<JsValue, JsValue> {
        to_js(&self.prepare_answers_internal().map_err(js_error)?)
    }

    /// Configuration JSON with the current answers merged in.
    pub fn hydrated(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.hydrated_internal())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

impl FormEditor {
    pub fn from_json(
        config_json: &str,
        answers_json: &str,
        page_count: u32,
        mode: EditorMode,
    ) -> Result<Self, FormError> {
        let config = match parse_configuration(config_json) {
            Ok(config) => config,
            Err(e) if mode == EditorMode::Edit => return Err(e),
            Err(e) => {
                warn!(error = %e, "Configuration is malformed, rendering without fields");
                PageConfiguration::new()
            }
        };
        let answers = parse_answers(answers_json);
        Ok(Self::from_parts(config, answers, page_count, mode))
    }

    pub fn from_parts(
        config: PageConfiguration,
        answers: AnswerMap,
        page_count: u32,
        mode: EditorMode,
    ) -> Self {
        Self {
            editor: OverlayEditor::new(config, page_count, mode.into()),
            answers,
        }
    }

    pub fn pointer_down_internal(&mut self, at: Point, button: PointerButton, hit: &HitTarget) -> bool {
        self.editor.overlay_mut().pointer_down(at, button, hit)
    }

    pub fn pointer_up_internal(&mut self, at: Point) -> Option<String> {
        self.editor.overlay_mut().pointer_up(at)
    }

    pub fn drawing_rect_internal(&self) -> Option<Rect> {
        self.editor.overlay().drawing_rect()
    }

    pub fn fill_internal(&mut self, field_id: &str, event: &FillEvent) -> Result<(), FormError> {
        let field = self
            .editor
            .find_field(field_id)
            .ok_or_else(|| FormError::NotFound(format!("Field {}", field_id)))?;
        let value = field.apply_fill(self.answers.get(field_id), event)?;
        self.answers.insert(field_id.to_string(), value);
        Ok(())
    }

    pub fn views_internal(&self) -> Vec<FieldView> {
        self.editor.overlay().views(&self.answers)
    }

    pub fn inspector_internal(&self) -> InspectorState {
        self.editor.overlay().inspector().clone()
    }

    pub fn prepare_answers_internal(&self) -> Result<PreparedAnswers, FormError> {
        let canvas = canvas_field_ids(self.editor.persisted());
        let (values, blobs) = extract_inline_blobs(&self.answers, &canvas)?;
        Ok(PreparedAnswers { values, blobs })
    }

    pub fn hydrated_internal(&self) -> PageConfiguration {
        hydrate_for_fill(self.editor.persisted(), &self.answers)
    }

    pub fn editor(&self) -> &OverlayEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut OverlayEditor {
        &mut self.editor
    }
}

fn parse_answers(json: &str) -> AnswerMap {
    let trimmed = json.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return AnswerMap::new();
    }
    match serde_json::from_str(trimmed) {
        Ok(answers) => answers,
        Err(e) => {
            warn!(error = %e, "Answers are malformed, starting empty");
            AnswerMap::new()
        }
    }
}

fn pointer_button(button: u8) -> PointerButton {
    match button {
        2 => PointerButton::Secondary,
        _ => PointerButton::Primary,
    }
}
