//! Raster surface for free-hand fields
//!
//! Strokes are stamped into an RGBA buffer and the whole surface is
//! serialized as a PNG data URI whenever a stroke ends. Strokes accumulate;
//! there is no undo.

use crate::error::FormError;
use crate::geometry::{Point, Rect};
use base64::{engine::general_purpose::STANDARD, Engine as _};

pub const STROKE_WIDTH: f64 = 2.0;
pub const PNG_MIME: &str = "image/png";

const INK: [u8; 4] = [0, 0, 0, 255];
/// Distance between stamps along a stroke segment, in pixels.
const STAMP_SPACING: f64 = 0.5;
const MAX_DIMENSION: u32 = 4096;

/// Build a base64 `data:` URI.
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split a base64 `data:` URI into its MIME type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), FormError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| FormError::Validation("Not a data URI".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| FormError::Validation("Data URI has no payload".to_string()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| FormError::Validation("Only base64 data URIs are supported".to_string()))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| FormError::Validation(format!("Invalid base64 payload: {}", e)))?;
    let mime = if mime.is_empty() {
        "text/plain".to_string()
    } else {
        mime.to_string()
    };
    Ok((mime, bytes))
}

#[derive(Debug, Clone)]
pub struct CanvasSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    last: Option<Point>,
}

impl CanvasSurface {
    /// A transparent surface. Dimensions are clamped to `1..=4096`.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.clamp(1, MAX_DIMENSION);
        let height = height.clamp(1, MAX_DIMENSION);
        Self {
            width,
            height,
            pixels: vec![0; (width * height * 4) as usize],
            last: None,
        }
    }

    /// Surface covering a field rectangle.
    pub fn for_rect(rect: &Rect) -> Self {
        Self::new(rect.width.ceil() as u32, rect.height.ceil() as u32)
    }

    /// Surface with a previously saved value painted on it.
    pub fn from_data_uri(width: u32, height: u32, uri: &str) -> Result<Self, FormError> {
        let mut surface = Self::new(width, height);
        surface.paint_data_uri(uri)?;
        Ok(surface)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.chunks_exact(4).all(|px| px[3] == 0)
    }

    /// Paint a PNG data URI onto the surface at the origin.
    ///
    /// Pixels outside the surface are dropped.
    pub fn paint_data_uri(&mut self, uri: &str) -> Result<(), FormError> {
        let (mime, bytes) = decode_data_uri(uri)?;
        if mime != PNG_MIME {
            return Err(FormError::Validation(format!(
                "Unsupported canvas image type: {}",
                mime
            )));
        }

        let mut decoder = png::Decoder::new(bytes.as_slice());
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder
            .read_info()
            .map_err(|e| FormError::Validation(format!("Invalid PNG: {}", e)))?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| FormError::Validation(format!("Invalid PNG: {}", e)))?;

        let channels = match info.color_type {
            png::ColorType::Grayscale => 1,
            png::ColorType::GrayscaleAlpha => 2,
            png::ColorType::Rgb => 3,
            png::ColorType::Rgba => 4,
            png::ColorType::Indexed => {
                return Err(FormError::Validation(
                    "Indexed PNG was not expanded".to_string(),
                ))
            }
        };

        let src_width = info.width.min(self.width);
        let src_height = info.height.min(self.height);
        for y in 0..src_height {
            for x in 0..src_width {
                let src = ((y * info.width + x) as usize) * channels;
                let rgba = match channels {
                    1 => [buf[src], buf[src], buf[src], 255],
                    2 => [buf[src], buf[src], buf[src], buf[src + 1]],
                    3 => [buf[src], buf[src + 1], buf[src + 2], 255],
                    _ => [buf[src], buf[src + 1], buf[src + 2], buf[src + 3]],
                };
                if rgba[3] > 0 {
                    self.set_pixel(x, y, rgba);
                }
            }
        }
        Ok(())
    }

    /// Pointer down inside the field.
    pub fn begin_stroke(&mut self, at: Point) {
        if !at.x.is_finite() || !at.y.is_finite() {
            return;
        }
        self.stamp(at);
        self.last = Some(at);
    }

    /// Pointer moved while a stroke is active. Ignored otherwise, and for
    /// non-finite coordinates.
    pub fn extend_stroke(&mut self, to: Point) {
        let Some(from) = self.last else {
            return;
        };
        if !to.x.is_finite() || !to.y.is_finite() {
            return;
        }
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        // Stamps past the surface diagonal would only land off-canvas
        let diagonal = f64::from(self.width).hypot(f64::from(self.height));
        let max_steps = (diagonal / STAMP_SPACING).ceil() as usize + 1;
        let steps = ((dx.hypot(dy) / STAMP_SPACING).ceil() as usize).clamp(1, max_steps);
        for step in 1..=steps {
            let t = step as f64 / steps as f64;
            self.stamp(Point::new(from.x + dx * t, from.y + dy * t));
        }
        self.last = Some(to);
    }

    /// Pointer up: finish the stroke and return the whole surface as the
    /// field's new value.
    pub fn end_stroke(&mut self) -> Result<String, FormError> {
        self.last = None;
        self.to_data_uri()
    }

    pub fn is_stroking(&self) -> bool {
        self.last.is_some()
    }

    pub fn to_png(&self) -> Result<Vec<u8>, FormError> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder
                .write_header()
                .map_err(|e| FormError::Validation(format!("PNG encoding failed: {}", e)))?;
            writer
                .write_image_data(&self.pixels)
                .map_err(|e| FormError::Validation(format!("PNG encoding failed: {}", e)))?;
            writer
                .finish()
                .map_err(|e| FormError::Validation(format!("PNG encoding failed: {}", e)))?;
        }
        Ok(out)
    }

    pub fn to_data_uri(&self) -> Result<String, FormError> {
        Ok(encode_data_uri(PNG_MIME, &self.to_png()?))
    }

    /// Round stamp of `STROKE_WIDTH` diameter centred on `at`.
    fn stamp(&mut self, at: Point) {
        let radius = STROKE_WIDTH / 2.0;
        let min_x = (at.x - radius).floor().max(0.0) as i64;
        let min_y = (at.y - radius).floor().max(0.0) as i64;
        let max_x = ((at.x + radius).ceil() as i64).min(self.width as i64 - 1);
        let max_y = ((at.y + radius).ceil() as i64).min(self.height as i64 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let cx = x as f64 + 0.5;
                let cy = y as f64 + 0.5;
                if (cx - at.x).hypot(cy - at.y) <= radius {
                    self.set_pixel(x as u32, y as u32, INK);
                }
            }
        }
    }

    fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let idx = ((y * self.width + x) * 4) as usize;
        self.pixels[idx..idx + 4].copy_from_slice(&rgba);
    }

    #[cfg(test)]
    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }
}
