//! Storage collaborator interface
//!
//! The core never talks to a database or blob store directly. Everything it
//! needs goes through [`FormBackend`]; the HTTP server implements it on top
//! of SQLite, and [`MemoryBackend`] implements it in memory for tests and
//! embedding.

use crate::answers::{resolve_file_references, AnswerMap, InlineBlob};
use crate::config_store::{to_json, PageConfiguration};
use crate::error::FormError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    View,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Draft,
    Submission,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Draft => "draft",
            RecordKind::Submission => "submission",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordScope {
    Own,
    All,
}

/// Pointer to a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub url: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub file: FileRef,
    #[serde(default)]
    pub config: Option<FileRef>,
    pub created_by: String,
    #[serde(default)]
    pub access_list: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PdfRecord {
    pub fn file_url(&self) -> &str {
        &self.file.url
    }

    pub fn config_url(&self) -> Option<&str> {
        self.config.as_ref().map(|c| c.url.as_str())
    }

    pub fn is_creator(&self, requester: &str) -> bool {
        self.created_by == requester
    }
}

/// A saved draft or submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub id: String,
    pub pdf_id: String,
    pub kind: RecordKind,
    pub values: AnswerMap,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Check whether `requester` may open `record` in `mode`.
///
/// Viewing is allowed for the creator and anyone on the access list;
/// editing only for the creator.
pub fn check_access(record: &PdfRecord, mode: AccessMode, requester: &str) -> Result<(), FormError> {
    let allowed = match mode {
        AccessMode::View => {
            record.is_creator(requester) || record.access_list.iter().any(|u| u == requester)
        }
        AccessMode::Edit => record.is_creator(requester),
    };
    if allowed {
        Ok(())
    } else {
        Err(FormError::Forbidden(format!(
            "{} may not {} PDF {}",
            requester,
            match mode {
                AccessMode::View => "view",
                AccessMode::Edit => "edit",
            },
            record.id
        )))
    }
}

/// Listing "all" records is reserved for the PDF's creator.
pub fn check_scope(record: &PdfRecord, scope: RecordScope, requester: &str) -> Result<(), FormError> {
    match scope {
        RecordScope::Own => check_access(record, AccessMode::View, requester),
        RecordScope::All => check_access(record, AccessMode::Edit, requester),
    }
}

/// An answer record is readable by its author and by the PDF's creator.
pub fn check_answer_access(
    pdf: &PdfRecord,
    answer: &AnswerRecord,
    requester: &str,
) -> Result<(), FormError> {
    if answer.created_by == requester || pdf.is_creator(requester) {
        Ok(())
    } else {
        Err(FormError::Forbidden(format!(
            "{} may not read {} {}",
            requester,
            answer.kind.as_str(),
            answer.id
        )))
    }
}

/// Newest record first; ties broken by id for a stable order.
pub fn sort_newest_first(records: &mut [AnswerRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[async_trait]
pub trait FormBackend: Send + Sync {
    async fn fetch_pdf_record(
        &self,
        pdf_id: &str,
        mode: AccessMode,
        requester: &str,
    ) -> Result<PdfRecord, FormError>;

    /// Raw base document bytes for a record already fetched.
    async fn fetch_pdf_bytes(&self, record: &PdfRecord) -> Result<Vec<u8>, FormError>;

    /// Plain GET of a stored configuration document.
    async fn fetch_configuration_json(&self, url: &str) -> Result<String, FormError>;

    /// Overwrite the PDF's configuration. Creator only.
    async fn save_configuration(
        &self,
        pdf_id: &str,
        requester: &str,
        config: &PageConfiguration,
    ) -> Result<FileRef, FormError>;

    /// Store a new draft or submission and return its id.
    ///
    /// Values that are file references are replaced by the URL of the
    /// matching uploaded blob.
    async fn save_answer_record(
        &self,
        pdf_id: &str,
        requester: &str,
        kind: RecordKind,
        values: AnswerMap,
        blobs: Vec<InlineBlob>,
    ) -> Result<String, FormError>;

    /// Records of one kind, newest first.
    async fn list_answer_records(
        &self,
        pdf_id: &str,
        requester: &str,
        kind: RecordKind,
        scope: RecordScope,
    ) -> Result<Vec<AnswerRecord>, FormError>;

    async fn fetch_answer_record(
        &self,
        pdf_id: &str,
        requester: &str,
        kind: RecordKind,
        record_id: &str,
    ) -> Result<AnswerRecord, FormError>;
}

const MEMORY_URL_PREFIX: &str = "memory://";

#[derive(Default)]
struct MemoryStore {
    pdfs: HashMap<String, PdfRecord>,
    blobs: HashMap<String, Vec<u8>>,
    records: Vec<AnswerRecord>,
    offline: bool,
}

/// In-process backend keeping records and blobs in maps.
#[derive(Default)]
pub struct MemoryBackend {
    store: Mutex<MemoryStore>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a PDF and return its record.
    pub fn insert_pdf(
        &self,
        name: &str,
        created_by: &str,
        access_list: &[&str],
        bytes: Vec<u8>,
    ) -> Result<PdfRecord, FormError> {
        let id = Uuid::new_v4().to_string();
        let path = format!("pdfs/{}.pdf", id);
        let record = PdfRecord {
            id: id.clone(),
            name: name.to_string(),
            description: String::new(),
            file: FileRef {
                url: format!("{}{}", MEMORY_URL_PREFIX, path),
                path: path.clone(),
            },
            config: None,
            created_by: created_by.to_string(),
            access_list: access_list.iter().map(|s| s.to_string()).collect(),
            created_at: Utc::now(),
        };
        let mut store = self.lock()?;
        store.blobs.insert(path, bytes);
        store.pdfs.insert(id, record.clone());
        Ok(record)
    }

    /// Store a raw configuration document and point the PDF at it.
    pub fn put_configuration_json(&self, pdf_id: &str, json: &str) -> Result<FileRef, FormError> {
        let mut store = self.lock()?;
        let file = FileRef {
            url: format!("{}configs/{}.json", MEMORY_URL_PREFIX, pdf_id),
            path: format!("configs/{}.json", pdf_id),
        };
        store.blobs.insert(file.path.clone(), json.as_bytes().to_vec());
        let pdf = store
            .pdfs
            .get_mut(pdf_id)
            .ok_or_else(|| FormError::NotFound(format!("PDF {}", pdf_id)))?;
        pdf.config = Some(file.clone());
        Ok(file)
    }

    /// While offline every call fails with a transient error.
    pub fn set_offline(&self, offline: bool) -> Result<(), FormError> {
        self.lock()?.offline = offline;
        Ok(())
    }

    pub fn blob(&self, path: &str) -> Result<Option<Vec<u8>>, FormError> {
        Ok(self.lock()?.blobs.get(path).cloned())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryStore>, FormError> {
        self.store
            .lock()
            .map_err(|_| FormError::TransientIo("memory store lock poisoned".to_string()))
    }

    fn online(&self) -> Result<std::sync::MutexGuard<'_, MemoryStore>, FormError> {
        let store = self.lock()?;
        if store.offline {
            return Err(FormError::TransientIo("backend unreachable".to_string()));
        }
        Ok(store)
    }
}

impl MemoryStore {
    fn pdf(&self, pdf_id: &str) -> Result<&PdfRecord, FormError> {
        self.pdfs
            .get(pdf_id)
            .ok_or_else(|| FormError::NotFound(format!("PDF {}", pdf_id)))
    }

    fn blob_at(&self, url: &str) -> Result<&Vec<u8>, FormError> {
        let path = url.strip_prefix(MEMORY_URL_PREFIX).unwrap_or(url);
        self.blobs
            .get(path)
            .ok_or_else(|| FormError::NotFound(format!("Blob {}", url)))
    }
}

#[async_trait]
impl FormBackend for MemoryBackend {
    async fn fetch_pdf_record(
        &self,
        pdf_id: &str,
        mode: AccessMode,
        requester: &str,
    ) -> Result<PdfRecord, FormError> {
        let store = self.online()?;
        let record = store.pdf(pdf_id)?;
        check_access(record, mode, requester)?;
        Ok(record.clone())
    }

    async fn fetch_pdf_bytes(&self, record: &PdfRecord) -> Result<Vec<u8>, FormError> {
        let store = self.online()?;
        Ok(store.blob_at(&record.file.url)?.clone())
    }

    async fn fetch_configuration_json(&self, url: &str) -> Result<String, FormError> {
        let store = self.online()?;
        let bytes = store.blob_at(url)?;
        String::from_utf8(bytes.clone())
            .map_err(|e| FormError::Validation(format!("Configuration is not UTF-8: {}", e)))
    }

    async fn save_configuration(
        &self,
        pdf_id: &str,
        requester: &str,
        config: &PageConfiguration,
    ) -> Result<FileRef, FormError> {
        let json = to_json(config)?;
        {
            let store = self.online()?;
            check_access(store.pdf(pdf_id)?, AccessMode::Edit, requester)?;
        }
        let file = self.put_configuration_json(pdf_id, &json)?;
        info!(pdf_id, pages = config.len(), "Saved configuration");
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
        let mut store = self.online()?;
        check_access(store.pdf(pdf_id)?, AccessMode::View, requester)?;

        let id = Uuid::new_v4().to_string();
        let paths: Vec<String> = blobs
            .iter()
            .map(|blob| format!("answers/{}/{}/{}.png", pdf_id, id, blob.key))
            .collect();
        let resolved: BTreeMap<String, String> = blobs
            .iter()
            .zip(&paths)
            .map(|(blob, path)| (blob.key.clone(), format!("{}{}", MEMORY_URL_PREFIX, path)))
            .collect();
        let values = resolve_file_references(values, &resolved)?;

        for (blob, path) in blobs.into_iter().zip(paths) {
            store.blobs.insert(path, blob.data);
        }

        store.records.push(AnswerRecord {
            id: id.clone(),
            pdf_id: pdf_id.to_string(),
            kind,
            values,
            created_by: requester.to_string(),
            created_at: Utc::now(),
        });
        info!(pdf_id, kind = kind.as_str(), "Saved answer record");
        Ok(id)
    }

    async fn list_answer_records(
        &self,
        pdf_id: &str,
        requester: &str,
        kind: RecordKind,
        scope: RecordScope,
    ) -> Result<Vec<AnswerRecord>, FormError> {
        let store = self.online()?;
        check_scope(store.pdf(pdf_id)?, scope, requester)?;

        let mut records: Vec<AnswerRecord> = store
            .records
            .iter()
            .filter(|r| r.pdf_id == pdf_id && r.kind == kind)
            .filter(|r| scope == RecordScope::All || r.created_by == requester)
            .cloned()
            .collect();
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
        let store = self.online()?;
        let pdf = store.pdf(pdf_id)?;
        let record = store
            .records
            .iter()
            .find(|r| r.id == record_id && r.pdf_id == pdf_id && r.kind == kind)
            .ok_or_else(|| FormError::NotFound(format!("{} {}", kind.as_str(), record_id)))?;
        check_answer_access(pdf, record, requester)?;
        Ok(record.clone())
    }
}
