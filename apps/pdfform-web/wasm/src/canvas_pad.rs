//! Free-hand drawing surface for canvas fields
//!
//! Strokes are rasterised in Rust; the page only blits the returned PNG
//! data URI onto its `<canvas>` element.

use pdfform_core::{CanvasSurface, Point};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct CanvasPad {
    surface: CanvasSurface,
}

#[wasm_bindgen]
impl CanvasPad {
    /// Blank pad covering a field of the given size.
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32) -> Self {
        console_error_panic_hook::set_once();
        Self {
            surface: CanvasSurface::new(width, height),
        }
    }

    /// Pad restored from a previously saved value.
    #[wasm_bindgen(js_name = fromDataUri)]
    pub fn from_data_uri(width: u32, height: u32, data_uri: &str) -> Result<CanvasPad, JsValue> {
        let surface = CanvasSurface::from_data_uri(width, height, data_uri)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(Self { surface })
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    #[wasm_bindgen(js_name = isBlank)]
    pub fn is_blank(&self) -> bool {
        self.surface.is_blank()
    }

    #[wasm_bindgen(js_name = beginStroke)]
    pub fn begin_stroke(&mut self, x: f64, y: f64) {
        self.surface.begin_stroke(Point::new(x, y));
    }

    #[wasm_bindgen(js_name = extendStroke)]
    pub fn extend_stroke(&mut self, x: f64, y: f64) {
        self.surface.extend_stroke(Point::new(x, y));
    }

    /// Finish the stroke; returns the data URI to send as a canvas fill event.
    #[wasm_bindgen(js_name = endStroke)]
    pub fn end_stroke(&mut self) -> Result<String, JsValue> {
        self.surface
            .end_stroke()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = toDataUri)]
    pub fn to_data_uri(&self) -> Result<String, JsValue> {
        self.surface
            .to_data_uri()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}
