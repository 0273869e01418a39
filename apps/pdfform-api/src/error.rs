//! Error types for the PDF form API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdfform_core::FormError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error(transparent)]
    Form(#[from] FormError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Form(e) => match e {
                FormError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                FormError::Forbidden(_) => (StatusCode::FORBIDDEN, e.to_string()),
                FormError::Validation(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                FormError::TransientIo(_) => {
                    tracing::error!("Storage error: {}", e);
                    (StatusCode::BAD_GATEWAY, e.to_string())
                }
                FormError::Export(_) | FormError::Serialization(_) => {
                    tracing::error!("Form error: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                }
            },
            ApiError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
