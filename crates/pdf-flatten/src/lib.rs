//! Flatten vector overlays into PDF pages
//!
//! This crate burns simple drawings (text runs, circles, squares) into the
//! content streams of an existing document using lopdf. Callers load an
//! [`OverlayWriter`], read page geometry from it, build an [`OperationLog`]
//! in PDF user space and apply it.

pub mod apply_operations;
pub mod error;
pub mod metrics;
pub mod operations;

pub use apply_operations::{OverlayWriter, PageBox, TEXT_FONT};
pub use error::FlattenError;
pub use metrics::text_width;
pub use operations::{DrawOperation, OperationLog, PdfRect};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, FlattenError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| FlattenError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

/// Cheap magic-number check used before accepting an upload.
pub fn is_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(5).any(|w| w == b"%PDF-")
}
