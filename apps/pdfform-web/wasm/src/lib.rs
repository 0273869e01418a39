//! WASM bindings for PDF form overlays
//!
//! All overlay state lives in Rust; JavaScript renders field views, forwards
//! DOM events and talks to the API server.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { FormEditor, EditorMode, exportPdfWithAnswers } from './pkg/pdfform_wasm.js';
//!
//! await init();
//!
//! const editor = new FormEditor(configJson, "", pageCount, EditorMode.Edit);
//! editor.captureContainer(rect.left, rect.top, rect.width, rect.height);
//! editor.pointerDown(e.clientX, e.clientY, e.button, JSON.stringify({ kind: "empty" }));
//! const id = editor.pointerUp(e.clientX, e.clientY);
//! render(editor.views(), editor.inspector());
//! await fetch(`/api/pdfs/${pdfId}/config`, { method: "PUT", body: editor.serializeForSave() });
//! ```

pub mod canvas_pad;
pub mod form_editor;

use pdfform_core::config_store::parse_configuration;
use pdfform_core::{flatten, validate_for_export, AnswerMap};
use wasm_bindgen::prelude::*;

pub use canvas_pad::CanvasPad;
pub use form_editor::{EditorMode, FormEditor};

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Get page count from PDF bytes
#[wasm_bindgen]
pub fn get_page_count(bytes: &[u8]) -> Result<u32, JsValue> {
    if !pdf_flatten::is_pdf(bytes) {
        return Err(JsValue::from_str("Not a PDF file"));
    }
    pdf_flatten::get_page_count(bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Burn answers into the PDF and return the flattened document
#[wasm_bindgen(js_name = exportPdfWithAnswers)]
pub fn export_pdf_with_answers(
    pdf_bytes: &[u8],
    config_json: &str,
    answers_json: &str,
) -> Result<js_sys::Uint8Array, JsValue> {
    console_error_panic_hook::set_once();
    let result = export_internal(pdf_bytes, config_json, answers_json)?;

    let array = js_sys::Uint8Array::new_with_length(result.len() as u32);
    array.copy_from(&result);
    Ok(array)
}

/// Non-blocking layout problems worth showing before export
#[wasm_bindgen(js_name = validateForExport)]
pub fn validate_for_export_js(pdf_bytes: &[u8], config_json: &str) -> Result<JsValue, JsValue> {
    let config =
        parse_configuration(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let warnings = validate_for_export(pdf_bytes, &config)
        .map_err(|e| JsValue::from_str(&format!("Export error: {}", e)))?;
    serde_wasm_bindgen::to_value(&warnings)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Export without JsValue so it can be tested natively.
fn export_internal(pdf_bytes: &[u8], config_json: &str, answers_json: &str) -> Result<Vec<u8>, String> {
    let config = parse_configuration(config_json).map_err(|e| e.to_string())?;
    let answers: AnswerMap = if answers_json.trim().is_empty() {
        AnswerMap::new()
    } else {
        serde_json::from_str(answers_json).map_err(|e| format!("Invalid answers: {}", e))?
    };
    flatten(pdf_bytes, &config, &answers).map_err(|e| format!("Export error: {}", e))
}
