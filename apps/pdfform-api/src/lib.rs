//! PDF form API - storage backend for form overlays
//!
//! Provides REST endpoints for:
//! - Accounts (signup / login)
//! - PDF upload, listing and deletion
//! - Page configuration storage
//! - Drafts and submissions
//! - Flattened export of a submission

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

use state::AppState;

/// Build the application router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Accounts
        .route("/api/signup", post(handlers::signup))
        .route("/api/login", post(handlers::login))
        // PDFs
        .route("/api/pdfs", post(handlers::upload_pdf))
        .route("/api/users/:uid/pdfs", get(handlers::list_user_pdfs))
        .route(
            "/api/pdfs/:id",
            get(handlers::get_pdf).delete(handlers::delete_pdf),
        )
        .route("/api/pdfs/:id/config", put(handlers::save_config))
        // Answers
        .route(
            "/api/pdfs/:id/drafts",
            post(handlers::save_draft).get(handlers::list_drafts),
        )
        .route("/api/pdfs/:id/drafts/:record_id", get(handlers::get_draft))
        .route(
            "/api/pdfs/:id/submissions",
            post(handlers::save_submission).get(handlers::list_submissions),
        )
        .route(
            "/api/pdfs/:id/submissions/:record_id",
            get(handlers::get_submission),
        )
        // Export and blob delivery
        .route("/api/pdfs/:id/export", post(handlers::export_pdf))
        .route("/api/blobs/*path", get(handlers::get_blob))
        // Add middleware
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
