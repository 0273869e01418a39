use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlattenError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Page {0} not found in document")]
    PageNotFound(u32),

    #[error("PDF operation failed: {0}")]
    OperationError(String),
}

impl From<lopdf::Error> for FlattenError {
    fn from(e: lopdf::Error) -> Self {
        FlattenError::OperationError(e.to_string())
    }
}
