//! Application state for the PDF form API
//!
//! Records live in SQLite; file blobs (PDFs, configuration documents and
//! canvas images) live under a directory on disk and are served back by
//! the `/api/blobs` route.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use pdfform_core::answers::resolve_file_references;
use pdfform_core::backend::{check_access, check_answer_access, check_scope, sort_newest_first};
use pdfform_core::config_store::to_json;
use pdfform_core::{
    AccessMode, AnswerMap, AnswerRecord, FileRef, FormBackend, FormError, InlineBlob,
    PageConfiguration, PdfRecord, RecordKind, RecordScope,
};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

use crate::models::{DbAnswer, DbPdf};

pub const DEFAULT_PORT: u16 = 3002;
/// Uploads travel as base64 inside JSON, a third larger than the file.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
const BLOB_ROUTE: &str = "/api/blobs/";

pub struct AppState {
    pub db: SqlitePool,
    pub blob_dir: PathBuf,
    pub base_url: String,
    pub max_body_bytes: usize,
}

impl AppState {
    pub async fn new() -> Result<Self> {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pdfform-api");

        // Get database path from env or use default
        let db_path = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            std::fs::create_dir_all(&data_dir).ok();
            format!("sqlite:{}/pdfform.db?mode=rwc", data_dir.display())
        });
        let blob_dir = std::env::var("BLOB_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("blobs"));
        let base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port_from_env()));

        tracing::info!("Connecting to database: {}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_path)
            .await?;

        let mut state = Self::new_with(pool, blob_dir, base_url).await?;
        state.max_body_bytes = max_body_bytes_from_env();
        Ok(state)
    }

    /// Build state over an existing pool, creating tables and the blob directory.
    pub async fn new_with(
        pool: SqlitePool,
        blob_dir: PathBuf,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&blob_dir).await?;
        Self::run_migrations(&pool).await?;

        let base_url: String = base_url.into();
        Ok(Self {
            db: pool,
            blob_dir,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pdfs (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                file_path TEXT NOT NULL,
                config_path TEXT,
                created_by TEXT NOT NULL,
                access_list_json TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS answers (
                id TEXT PRIMARY KEY,
                pdf_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                values_json TEXT NOT NULL,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(pool)
        .await?;

        // Index for fast lookups
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_answers_pdf_kind ON answers(pdf_id, kind)
            "#,
        )
        .execute(pool)
        .await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    pub fn blob_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, BLOB_ROUTE, path)
    }

    fn file_ref(&self, path: &str) -> FileRef {
        FileRef {
            url: self.blob_url(path),
            path: path.to_string(),
        }
    }

    /// Resolve a blob URL or relative path to a file under the blob directory.
    pub fn blob_file(&self, url_or_path: &str) -> Result<PathBuf, FormError> {
        let relative = url_or_path
            .strip_prefix(&self.base_url)
            .and_then(|rest| rest.strip_prefix(BLOB_ROUTE))
            .unwrap_or(url_or_path);
        let clean = sanitize_blob_path(relative)
            .ok_or_else(|| FormError::Validation(format!("Invalid blob path: {}", url_or_path)))?;
        Ok(self.blob_dir.join(clean))
    }

    pub async fn write_blob(&self, path: &str, bytes: &[u8]) -> Result<FileRef, FormError> {
        let file = self.blob_file(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(&file, bytes).await.map_err(io_error)?;
        Ok(self.file_ref(path))
    }

    pub async fn read_blob(&self, url_or_path: &str) -> Result<Vec<u8>, FormError> {
        let file = self.blob_file(url_or_path)?;
        match tokio::fs::read(&file).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FormError::NotFound(format!("Blob {}", url_or_path)))
            }
            Err(e) => Err(io_error(e)),
        }
    }

    /// Remove a blob file or directory; missing entries are ignored.
    pub async fn remove_blob(&self, path: &str) -> Result<(), FormError> {
        let file = self.blob_file(path)?;
        let result = match tokio::fs::metadata(&file).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&file).await,
            Ok(_) => tokio::fs::remove_file(&file).await,
            Err(e) => Err(e),
        };
        match result {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(io_error(e)),
            _ => Ok(()),
        }
    }

    /// Best-effort cleanup after a failed write; errors are only logged.
    pub async fn discard_blobs(&self, path: &str) {
        if let Err(e) = self.remove_blob(path).await {
            tracing::warn!(path, error = %e, "Could not remove blobs");
        }
    }

    pub async fn load_pdf(&self, pdf_id: &str) -> Result<PdfRecord, FormError> {
        let row: Option<DbPdf> = sqlx::query_as(
            r#"
            SELECT id, name, description, file_path, config_path, created_by,
                   access_list_json, created_at
            FROM pdfs
            WHERE id = ?
            "#,
        )
        .bind(pdf_id)
        .fetch_optional(&self.db)
        .await
        .map_err(db_error)?;

        let row = row.ok_or_else(|| FormError::NotFound(format!("PDF {}", pdf_id)))?;
        self.pdf_record(row)
    }

    pub fn pdf_record(&self, row: DbPdf) -> Result<PdfRecord, FormError> {
        let access_list: Vec<String> = serde_json::from_str(&row.access_list_json)?;
        Ok(PdfRecord {
            file: self.file_ref(&row.file_path),
            config: row.config_path.as_deref().map(|p| self.file_ref(p)),
            id: row.id,
            name: row.name,
            description: row.description,
            created_by: row.created_by,
            access_list,
            created_at: row.created_at,
        })
    }
}

fn answer_record(row: DbAnswer) -> Result<AnswerRecord, FormError> {
    let kind = match row.kind.as_str() {
        "draft" => RecordKind::Draft,
        "submission" => RecordKind::Submission,
        other => {
            return Err(FormError::Validation(format!(
                "Unknown record kind {}",
                other
            )))
        }
    };
    Ok(AnswerRecord {
        values: serde_json::from_str(&row.values_json)?,
        id: row.id,
        pdf_id: row.pdf_id,
        kind,
        created_by: row.created_by,
        created_at: row.created_at,
    })
}

fn db_error(e: sqlx::Error) -> FormError {
    FormError::TransientIo(format!("Database error: {}", e))
}

fn io_error(e: std::io::Error) -> FormError {
    FormError::TransientIo(format!("Blob storage error: {}", e))
}

/// Normalise a relative blob path, rejecting anything that could escape
/// the blob directory.
pub fn sanitize_blob_path(path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').collect();
    let valid = segments.iter().all(|s| {
        !s.is_empty()
            && *s != "."
            && *s != ".."
            && !s.contains('\\')
            && !s.contains(':')
            && !s.contains('\0')
    });
    if valid {
        Some(segments.join("/"))
    } else {
        None
    }
}

fn blob_extension(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "application/json" => "json",
        _ => "bin",
    }
}

pub fn port_from_env() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

pub fn max_body_bytes_from_env() -> usize {
    std::env::var("MAX_BODY_BYTES")
        .ok()
        .and_then(|n| n.parse().ok())
        .unwrap_or(DEFAULT_MAX_BODY_BYTES)
}

#[async_trait]
impl FormBackend for AppState {
    async fn fetch_pdf_record(
        &self,
        pdf_id: &str,
        mode: AccessMode,
        requester: &str,
    ) -> Result<PdfRecord, FormError> {
        let record = self.load_pdf(pdf_id).await?;
        check_access(&record, mode, requester)?;
        Ok(record)
    }

    async fn fetch_pdf_bytes(&self, record: &PdfRecord) -> Result<Vec<u8>, FormError> {
        self.read_blob(&record.file.path).await
    }

    async fn fetch_configuration_json(&self, url: &str) -> Result<String, FormError> {
        let bytes = self.read_blob(url).await?;
        String::from_utf8(bytes)
            .map_err(|e| FormError::Validation(format!("Configuration is not UTF-8: {}", e)))
    }

    async fn save_configuration(
        &self,
        pdf_id: &str,
        requester: &str,
        config: &PageConfiguration,
    ) -> Result<FileRef, FormError> {
        let record = self.load_pdf(pdf_id).await?;
        check_access(&record, AccessMode::Edit, requester)?;

        let json = to_json(config)?;
        let path = format!("configs/{}.json", pdf_id);
        let file = self.write_blob(&path, json.as_bytes()).await?;

        sqlx::query("UPDATE pdfs SET config_path = ? WHERE id = ?")
            .bind(&path)
            .bind(pdf_id)
            .execute(&self.db)
            .await
            .map_err(db_error)?;

        tracing::info!(pdf_id, pages = config.len(), "Saved configuration");
        Ok(file)
    }

    async fn save_answer_record(
        &self,
        pdf_id: &str,
        requester: &str,
        kind: RecordKind,
        values: AnswerMap,
        blobs: Vec<InlineBlob>,
    ) -> Result<String, FormError> {
        let record = self.load_pdf(pdf_id).await?;
        check_access(&record, AccessMode::View, requester)?;

        let id = Uuid::new_v4().to_string();
        let record_dir = format!("answers/{}/{}", pdf_id, id);
        let paths = blobs
            .iter()
            .map(|blob| {
                let path = format!(
                    "{}/{}.{}",
                    record_dir,
                    blob.key,
                    blob_extension(&blob.content_type)
                );
                self.blob_file(&path).map(|_| path)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let resolved: BTreeMap<String, String> = blobs
            .iter()
            .zip(&paths)
            .map(|(blob, path)| (blob.key.clone(), self.blob_url(path)))
            .collect();
        let values = resolve_file_references(values, &resolved)?;
        let values_json = serde_json::to_string(&values)?;

        for (blob, path) in blobs.iter().zip(&paths) {
            if let Err(e) = self.write_blob(path, &blob.data).await {
                self.discard_blobs(&record_dir).await;
                return Err(e);
            }
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO answers (id, pdf_id, kind, values_json, created_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(pdf_id)
        .bind(kind.as_str())
        .bind(&values_json)
        .bind(requester)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await;
        if let Err(e) = inserted {
            self.discard_blobs(&record_dir).await;
            return Err(db_error(e));
        }

        tracing::info!(pdf_id, kind = kind.as_str(), id = %id, "Saved answer record");
        Ok(id)
    }

    async fn list_answer_records(
        &self,
        pdf_id: &str,
        requester: &str,
        kind: RecordKind,
        scope: RecordScope,
    ) -> Result<Vec<AnswerRecord>, FormError> {
        let record = self.load_pdf(pdf_id).await?;
        check_scope(&record, scope, requester)?;

        let rows: Vec<DbAnswer> = match scope {
            RecordScope::All => sqlx::query_as(
                r#"
                SELECT id, pdf_id, kind, values_json, created_by, created_at
                FROM answers
                WHERE pdf_id = ? AND kind = ?
                "#,
            )
            .bind(pdf_id)
            .bind(kind.as_str())
            .fetch_all(&self.db)
            .await
            .map_err(db_error)?,
            RecordScope::Own => sqlx::query_as(
                r#"
                SELECT id, pdf_id, kind, values_json, created_by, created_at
                FROM answers
                WHERE pdf_id = ? AND kind = ? AND created_by = ?
                "#,
            )
            .bind(pdf_id)
            .bind(kind.as_str())
            .bind(requester)
            .fetch_all(&self.db)
            .await
            .map_err(db_error)?,
        };

        let mut records = rows
            .into_iter()
            .map(answer_record)
            .collect::<Result<Vec<_>, _>>()?;
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn fetch_answer_record(
        &self,
        pdf_id: &str,
        requester: &str,
        kind: RecordKind,
        record_id: &str,
    ) -> Result<AnswerRecord, FormError> {
        let pdf = self.load_pdf(pdf_id).await?;
        let row: Option<DbAnswer> = sqlx::query_as(
            r#"
            SELECT id, pdf_id, kind, values_json, created_by, created_at
            FROM answers
            WHERE id = ? AND pdf_id = ? AND kind = ?
            "#,
        )
        .bind(record_id)
        .bind(pdf_id)
        .bind(kind.as_str())
        .fetch_optional(&self.db)
        .await
        .map_err(db_error)?;

        let row =
            row.ok_or_else(|| FormError::NotFound(format!("{} {}", kind.as_str(), record_id)))?;
        let record = answer_record(row)?;
        check_answer_access(&pdf, &record, requester)?;
        Ok(record)
    }
}

/// Get platform-specific data directory
mod dirs {
    use std::path::PathBuf;

    pub fn data_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_blob_path() {
        assert_eq!(
            sanitize_blob_path("configs/abc.json").as_deref(),
            Some("configs/abc.json")
        );
        assert_eq!(sanitize_blob_path("../etc/passwd"), None);
        assert_eq!(sanitize_blob_path("a//b"), None);
        assert_eq!(sanitize_blob_path("/abs"), None);
        assert_eq!(sanitize_blob_path("a\\b"), None);
        assert_eq!(sanitize_blob_path("c:/x"), None);
    }

    #[test]
    fn test_blob_extension() {
        assert_eq!(blob_extension("image/png"), "png");
        assert_eq!(blob_extension("text/plain"), "bin");
    }
}
