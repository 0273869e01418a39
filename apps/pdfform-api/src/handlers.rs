//! HTTP handlers for the PDF form API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use pdfform_core::{
    export_submission, AccessMode, AnswerRecord, FileRef, FormBackend, FormError, PdfRecord,
    RecordKind, RecordScope,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Register a teacher or student
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::InvalidRequest("A valid email is required".into()));
    }
    if req.password.is_empty() {
        return Err(ApiError::InvalidRequest("Password must not be empty".into()));
    }

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::InvalidRequest("Email already registered".into()));
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO users (id, email, password, role, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&email)
    .bind(&req.password)
    .bind(req.role.as_str())
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    tracing::info!("Registered {} {}", req.role.as_str(), id);

    Ok(Json(UserResponse {
        id,
        email,
        role: req.role,
    }))
}

/// Match credentials against the users table
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user: Option<DbUser> = sqlx::query_as(
        r#"
        SELECT id, email, password, role, created_at
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(req.email.trim().to_lowercase())
    .fetch_optional(&state.db)
    .await?;

    let user = user
        .filter(|u| u.password == req.password)
        .ok_or(ApiError::InvalidCredentials)?;
    let role = Role::parse(&user.role)
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("Unknown role {}", user.role)))?;

    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
        role,
    }))
}

/// Upload a PDF and create its record
pub async fn upload_pdf(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UploadPdfRequest>,
) -> Result<Json<UploadPdfResponse>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::InvalidRequest("PDF name must not be empty".into()));
    }

    // Decode PDF
    let pdf_data = BASE64
        .decode(&req.pdf_base64)
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid PDF base64: {}", e)))?;
    if !pdf_flatten::is_pdf(&pdf_data) {
        return Err(FormError::Validation("Uploaded file is not a PDF".into()).into());
    }
    let page_count = pdf_flatten::get_page_count(&pdf_data)
        .map_err(|e| FormError::Validation(format!("Uploaded PDF could not be parsed: {}", e)))?;

    let id = Uuid::new_v4().to_string();
    let path = format!("pdfs/{}.pdf", id);
    state.write_blob(&path, &pdf_data).await?;

    let access_list_json =
        serde_json::to_string(&req.access_list).map_err(|e| ApiError::Internal(e.into()))?;
    sqlx::query(
        r#"
        INSERT INTO pdfs (id, name, description, file_path, created_by, access_list_json, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(&path)
    .bind(&req.created_by)
    .bind(&access_list_json)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    tracing::info!("Uploaded PDF {} ({} pages)", id, page_count);

    let pdf = state.load_pdf(&id).await?;
    Ok(Json(UploadPdfResponse { pdf, page_count }))
}

/// PDFs a user created or was given access to
pub async fn list_user_pdfs(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<Vec<PdfRecord>>, ApiError> {
    let rows: Vec<DbPdf> = sqlx::query_as(
        r#"
        SELECT id, name, description, file_path, config_path, created_by,
               access_list_json, created_at
        FROM pdfs
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    let mut pdfs = Vec::new();
    for row in rows {
        let pdf = state.pdf_record(row)?;
        if pdf.is_creator(&uid) || pdf.access_list.iter().any(|u| u == &uid) {
            pdfs.push(pdf);
        }
    }
    Ok(Json(pdfs))
}

/// Get a PDF record, checked against the requested access mode
pub async fn get_pdf(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<OpenPdfQuery>,
) -> Result<Json<PdfRecord>, ApiError> {
    let mode = query.mode.unwrap_or(AccessMode::View);
    let pdf = state.fetch_pdf_record(&id, mode, &query.requester).await?;
    Ok(Json(pdf))
}

/// Delete a PDF with its configuration, answers and blobs
pub async fn delete_pdf(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<RequesterQuery>,
) -> Result<StatusCode, ApiError> {
    let pdf = state
        .fetch_pdf_record(&id, AccessMode::Edit, &query.requester)
        .await?;

    sqlx::query("DELETE FROM answers WHERE pdf_id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    sqlx::query("DELETE FROM pdfs WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    // Each removal is attempted even when an earlier one fails
    state.discard_blobs(&format!("answers/{}", id)).await;
    if let Some(config) = &pdf.config {
        state.discard_blobs(&config.path).await;
    }
    state.discard_blobs(&pdf.file.path).await;

    tracing::info!("Deleted PDF {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Overwrite the PDF's page configuration
pub async fn save_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SaveConfigRequest>,
) -> Result<Json<FileRef>, ApiError> {
    let file = state
        .save_configuration(&id, &req.requester, &req.config)
        .await?;
    Ok(Json(file))
}

pub async fn save_draft(
    state: State<Arc<AppState>>,
    id: Path<String>,
    req: Json<SaveAnswersRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    save_answers(state, id, RecordKind::Draft, req).await
}

pub async fn save_submission(
    state: State<Arc<AppState>>,
    id: Path<String>,
    req: Json<SaveAnswersRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    save_answers(state, id, RecordKind::Submission, req).await
}

async fn save_answers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    kind: RecordKind,
    Json(req): Json<SaveAnswersRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let record_id = state
        .save_answer_record(&id, &req.requester, kind, req.values, req.blobs)
        .await?;
    Ok(Json(CreatedResponse { id: record_id }))
}

pub async fn list_drafts(
    state: State<Arc<AppState>>,
    id: Path<String>,
    query: Query<ListRecordsQuery>,
) -> Result<Json<Vec<AnswerRecord>>, ApiError> {
    list_answers(state, id, RecordKind::Draft, query).await
}

pub async fn list_submissions(
    state: State<Arc<AppState>>,
    id: Path<String>,
    query: Query<ListRecordsQuery>,
) -> Result<Json<Vec<AnswerRecord>>, ApiError> {
    list_answers(state, id, RecordKind::Submission, query).await
}

async fn list_answers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    kind: RecordKind,
    Query(query): Query<ListRecordsQuery>,
) -> Result<Json<Vec<AnswerRecord>>, ApiError> {
    let scope = query.scope.unwrap_or(RecordScope::Own);
    let records = state
        .list_answer_records(&id, &query.requester, kind, scope)
        .await?;
    Ok(Json(records))
}

pub async fn get_draft(
    state: State<Arc<AppState>>,
    ids: Path<(String, String)>,
    query: Query<RequesterQuery>,
) -> Result<Json<AnswerRecord>, ApiError> {
    get_answer(state, ids, RecordKind::Draft, query).await
}

pub async fn get_submission(
    state: State<Arc<AppState>>,
    ids: Path<(String, String)>,
    query: Query<RequesterQuery>,
) -> Result<Json<AnswerRecord>, ApiError> {
    get_answer(state, ids, RecordKind::Submission, query).await
}

async fn get_answer(
    State(state): State<Arc<AppState>>,
    Path((id, record_id)): Path<(String, String)>,
    kind: RecordKind,
    Query(query): Query<RequesterQuery>,
) -> Result<Json<AnswerRecord>, ApiError> {
    let record = state
        .fetch_answer_record(&id, &query.requester, kind, &record_id)
        .await?;
    Ok(Json(record))
}

/// Serve a stored blob
pub async fn get_blob(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<(StatusCode, [(String, String); 1], Vec<u8>), ApiError> {
    let bytes = state.read_blob(&path).await?;
    let content_type = match path.rsplit('.').next() {
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") => "image/jpeg",
        _ => "application/octet-stream",
    };

    Ok((
        StatusCode::OK,
        [("Content-Type".to_string(), content_type.to_string())],
        bytes,
    ))
}

/// Flatten a submission into its PDF
pub async fn export_pdf(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ExportRequest>,
) -> Result<(StatusCode, [(String, String); 2], Vec<u8>), ApiError> {
    let bytes = export_submission(state.as_ref(), &id, &req.requester, &req.submission_id).await?;

    tracing::info!(
        "Exported submission {} of PDF {} ({} bytes)",
        req.submission_id,
        id,
        bytes.len()
    );

    Ok((
        StatusCode::OK,
        [
            ("Content-Type".to_string(), "application/pdf".to_string()),
            (
                "Content-Disposition".to_string(),
                format!("attachment; filename=\"{}.pdf\"", req.submission_id),
            ),
        ],
        bytes,
    ))
}
