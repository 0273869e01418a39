//! Data models for the PDF form API

use chrono::{DateTime, Utc};
use pdfform_core::{
    AccessMode, AnswerMap, InlineBlob, PageConfiguration, PdfRecord, RecordScope,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            _ => None,
        }
    }
}

/// User row
#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// PDF row; access list kept as a JSON array
#[derive(Debug, Clone, FromRow)]
pub struct DbPdf {
    pub id: String,
    pub name: String,
    pub description: String,
    pub file_path: String,
    pub config_path: Option<String>,
    pub created_by: String,
    pub access_list_json: String,
    pub created_at: DateTime<Utc>,
}

/// Draft or submission row
#[derive(Debug, Clone, FromRow)]
pub struct DbAnswer {
    pub id: String,
    pub pdf_id: String,
    pub kind: String,
    pub values_json: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub role: Role,
}

/// Upload body; the PDF travels as base64
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPdfRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_by: String,
    #[serde(default)]
    pub access_list: Vec<String>,
    pub pdf_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPdfResponse {
    #[serde(flatten)]
    pub pdf: PdfRecord,
    pub page_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequesterQuery {
    pub requester: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenPdfQuery {
    pub requester: String,
    #[serde(default)]
    pub mode: Option<AccessMode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListRecordsQuery {
    pub requester: String,
    #[serde(default)]
    pub scope: Option<RecordScope>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveConfigRequest {
    pub requester: String,
    pub config: PageConfiguration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveAnswersRequest {
    pub requester: String,
    pub values: AnswerMap,
    #[serde(default)]
    pub blobs: Vec<InlineBlob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub requester: String,
    pub submission_id: String,
}
