//! Fillable form overlays for existing PDFs
//!
//! Teachers draw rectangles over the pages of a PDF and turn each one into
//! a typed input (text, radio, checkbox, dropdown or a free-hand canvas).
//! The layout is stored as a per-page configuration document. Students fill
//! the same overlay, their answers are stored as drafts or submissions, and
//! a submission can be flattened back into the PDF.
//!
//! The crate is UI-agnostic: fields render to declarative [`FieldView`]s and
//! user input comes back as [`FillEvent`]s, [`FieldEdit`]s and pointer/key
//! events on a [`PageOverlay`]. Storage sits behind [`FormBackend`].

pub mod answers;
pub mod backend;
pub mod canvas;
pub mod config_store;
pub mod error;
pub mod export;
pub mod fields;
pub mod geometry;
pub mod inspector;
pub mod overlay;
pub mod session;

pub use answers::{AnswerMap, AnswerValue, InlineBlob};
pub use backend::{
    AccessMode, AnswerRecord, FileRef, FormBackend, MemoryBackend, PdfRecord, RecordKind,
    RecordScope,
};
pub use canvas::CanvasSurface;
pub use config_store::{PageConfig, PageConfiguration};
pub use error::FormError;
pub use export::{flatten, validate_for_export, ExportWarning};
pub use fields::{
    Field, FieldEdit, FieldId, FieldRecord, FieldType, FieldView, FillEvent, RenderMode, Widget,
};
pub use geometry::{ContainerRect, Layout, Point, Rect};
pub use inspector::InspectorState;
pub use overlay::{
    HitTarget, InspectorCommand, OverlayEditor, OverlayMode, PageOverlay, PointerButton,
};
pub use session::{export_submission, EditSession, FillSession, ReviewSession};
