//! Apply overlay operations to PDF documents
//!
//! Overlay drawings are appended to each page as a new content stream.
//! Existing streams are never rewritten: when a page already has content,
//! it is bracketed by a `q` stream and a `Q` stream so that any graphics
//! state it leaves behind does not leak into the overlay.

use crate::error::FlattenError;
use crate::operations::{DrawOperation, OperationLog};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeMap;
use tracing::debug;

/// Bezier control distance for a quarter circle of radius 1.
const KAPPA: f64 = 0.552_284_749_8;
const LINE_WIDTH: f64 = 1.0;
const FONT_RESOURCE_PREFIX: &str = "FlatF";
/// Standard font used for every text run.
pub const TEXT_FONT: &str = "Helvetica";
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Visible page area taken from the page's MediaBox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageBox {
    /// Convert a page-relative screen x (left origin) to PDF user space.
    pub fn to_pdf_x(&self, screen_x: f64) -> f64 {
        self.x + screen_x
    }

    /// Convert a page-relative screen y (top origin) to PDF user space
    /// (bottom origin): `pageHeight - screenY`.
    pub fn to_pdf_y(&self, screen_y: f64) -> f64 {
        self.y + self.height - screen_y
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(v) => Some(*v as f64),
        Object::Real(v) => Some(*v as f64),
        _ => None,
    }
}

/// Encode text for a simple font with WinAnsiEncoding.
///
/// Characters outside the encoding are replaced with `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '\u{20ac}' => 0x80,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            _ => b'?',
        })
        .collect()
}

/// A loaded document that overlay operations can be written into.
pub struct OverlayWriter {
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl OverlayWriter {
    pub fn load(pdf_bytes: &[u8]) -> Result<Self, FlattenError> {
        let doc =
            Document::load_mem(pdf_bytes).map_err(|e| FlattenError::ParseError(e.to_string()))?;
        let pages = doc.get_pages();
        Ok(Self { doc, pages })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_id(&self, page: u32) -> Result<ObjectId, FlattenError> {
        self.pages
            .get(&page)
            .copied()
            .ok_or(FlattenError::PageNotFound(page))
    }

    /// MediaBox of a 1-based page, honouring inheritance from the page tree.
    pub fn page_box(&self, page: u32) -> Result<PageBox, FlattenError> {
        let page_id = self.page_id(page)?;
        let media_box = inherited_attribute(&self.doc, page_id, b"MediaBox")?
            .ok_or_else(|| FlattenError::OperationError(format!("Page {} has no MediaBox", page)))?;

        let values: Vec<f64> = match resolve(&self.doc, media_box)? {
            Object::Array(items) => items.iter().filter_map(number).collect(),
            _ => Vec::new(),
        };
        if values.len() != 4 {
            return Err(FlattenError::OperationError(format!(
                "Page {} has a malformed MediaBox",
                page
            )));
        }

        Ok(PageBox {
            x: values[0].min(values[2]),
            y: values[1].min(values[3]),
            width: (values[2] - values[0]).abs(),
            height: (values[3] - values[1]).abs(),
        })
    }

    /// Append every operation in the log to its page.
    pub fn apply(&mut self, log: &OperationLog) -> Result<(), FlattenError> {
        for page in log.pages() {
            let page_id = self.page_id(page)?;
            let ops = log.operations_for_page(page);
            let has_text = ops
                .iter()
                .any(|op| matches!(op, DrawOperation::DrawText { .. }));
            let font = if has_text {
                Some(self.register_font(page_id)?)
            } else {
                None
            };
            let content = build_content(&ops, font.as_deref())?;
            let bytes = content.encode()?;
            self.append_contents(page_id, bytes)?;
            debug!(page, operations = ops.len(), "Appended overlay content stream");
        }
        Ok(())
    }

    pub fn save(mut self) -> Result<Vec<u8>, FlattenError> {
        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| FlattenError::OperationError(e.to_string()))?;
        Ok(output)
    }

    /// Add a Type1 [`TEXT_FONT`] resource to the page and return its name.
    ///
    /// The page's effective Resources (inline, referenced or inherited) are
    /// copied onto the page itself with the new font added, so shared
    /// resource dictionaries are left untouched.
    fn register_font(&mut self, page_id: ObjectId) -> Result<String, FlattenError> {
        let mut resources = match inherited_attribute(&self.doc, page_id, b"Resources")? {
            Some(obj) => match resolve(&self.doc, obj)? {
                Object::Dictionary(dict) => dict.clone(),
                _ => Dictionary::new(),
            },
            None => Dictionary::new(),
        };

        let mut fonts = match resources.get(b"Font") {
            Ok(obj) => match resolve(&self.doc, obj)? {
                Object::Dictionary(dict) => dict.clone(),
                _ => Dictionary::new(),
            },
            Err(_) => Dictionary::new(),
        };

        let mut counter = 1;
        let mut name = format!("{}{}", FONT_RESOURCE_PREFIX, counter);
        while fonts.has(name.as_bytes()) {
            counter += 1;
            name = format!("{}{}", FONT_RESOURCE_PREFIX, counter);
        }

        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"Type1".to_vec()));
        font.set("BaseFont", Object::Name(TEXT_FONT.as_bytes().to_vec()));
        font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
        let font_id = self.doc.add_object(Object::Dictionary(font));

        fonts.set(name.clone(), Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));
        self.page_dict_mut(page_id)?
            .set("Resources", Object::Dictionary(resources));

        Ok(name)
    }

    fn append_contents(&mut self, page_id: ObjectId, overlay: Vec<u8>) -> Result<(), FlattenError> {
        let existing: Vec<Object> = match self.doc.get_dictionary(page_id)?.get(b"Contents") {
            Ok(Object::Reference(id)) => match self.doc.get_object(*id)? {
                Object::Array(items) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        };

        let mut contents = Vec::with_capacity(existing.len() + 3);
        if !existing.is_empty() {
            let save_id = self
                .doc
                .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let restore_id = self
                .doc
                .add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
            contents.push(Object::Reference(save_id));
            contents.extend(existing);
            contents.push(Object::Reference(restore_id));
        }
        let overlay_id = self.doc.add_object(Stream::new(Dictionary::new(), overlay));
        contents.push(Object::Reference(overlay_id));

        self.page_dict_mut(page_id)?
            .set("Contents", Object::Array(contents));
        Ok(())
    }

    fn page_dict_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary, FlattenError> {
        Ok(self.doc.get_object_mut(page_id)?.as_dict_mut()?)
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object, FlattenError> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

/// Look up a page attribute, walking `/Parent` links for inheritable keys.
fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>, FlattenError> {
    let mut current = page_id;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        let dict = doc.get_dictionary(current)?;
        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return Ok(None),
        }
    }
    Ok(None)
}

fn build_content(ops: &[&DrawOperation], font: Option<&str>) -> Result<Content, FlattenError> {
    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new("w", vec![real(LINE_WIDTH)]),
        Operation::new("G", vec![real(0.0)]),
    ];

    for op in ops {
        match op {
            DrawOperation::DrawText {
                x,
                y,
                text,
                font_size,
                ..
            } => {
                let font = font.ok_or_else(|| {
                    FlattenError::OperationError(format!("{} was not registered", TEXT_FONT))
                })?;
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("g", vec![real(0.0)]));
                operations.push(Operation::new(
                    "Tf",
                    vec![Object::Name(font.as_bytes().to_vec()), real(*font_size)],
                ));
                operations.push(Operation::new("Td", vec![real(*x), real(*y)]));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
                ));
                operations.push(Operation::new("ET", vec![]));
            }
            DrawOperation::DrawCircle {
                center_x,
                center_y,
                radius,
                filled,
                ..
            } => {
                operations.extend(circle_path(*center_x, *center_y, *radius));
                operations.extend(paint(*filled));
            }
            DrawOperation::DrawSquare { rect, filled, .. } => {
                operations.push(Operation::new(
                    "re",
                    vec![
                        real(rect.x),
                        real(rect.y),
                        real(rect.width),
                        real(rect.height),
                    ],
                ));
                operations.extend(paint(*filled));
            }
        }
    }

    operations.push(Operation::new("Q", vec![]));
    Ok(Content { operations })
}

fn paint(filled: bool) -> Vec<Operation> {
    if filled {
        vec![
            Operation::new("g", vec![real(0.0)]),
            Operation::new("f", vec![]),
        ]
    } else {
        vec![Operation::new("S", vec![])]
    }
}

/// Closed circle path built from four cubic Bezier segments.
fn circle_path(cx: f64, cy: f64, r: f64) -> Vec<Operation> {
    let k = r * KAPPA;
    let curve = |pts: [f64; 6]| Operation::new("c", pts.iter().map(|v| real(*v)).collect());
    vec![
        Operation::new("m", vec![real(cx + r), real(cy)]),
        curve([cx + r, cy + k, cx + k, cy + r, cx, cy + r]),
        curve([cx - k, cy + r, cx - r, cy + k, cx - r, cy]),
        curve([cx - r, cy - k, cx - k, cy - r, cx, cy - r]),
        curve([cx + k, cy - r, cx + r, cy - k, cx + r, cy]),
        Operation::new("h", vec![]),
    ]
}
