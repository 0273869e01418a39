use pdf_flatten::FlattenError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Storage request failed: {0}")]
    TransientIo(String),

    #[error("Export failed: {0}")]
    Export(#[from] FlattenError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
