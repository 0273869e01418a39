//! Answer values keyed by field id
//!
//! Text, radio and dropdown answers are single strings; checkbox answers are
//! an ordered list without duplicates. Canvas answers start life as inline
//! PNG data URIs and are swapped for file references before storage.
//!
//! A file reference is always `blob:<own field id>`. Any other string, even
//! one starting with `blob:` or `data:`, is an ordinary answer.

use crate::canvas::decode_data_uri;
use crate::error::FormError;
use crate::fields::FieldId;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// Marker prefix for a value that points at a blob uploaded with the record.
pub const FILE_REFERENCE_PREFIX: &str = "blob:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Single(String),
    Multiple(Vec<String>),
}

pub type AnswerMap = BTreeMap<FieldId, AnswerValue>;

impl AnswerValue {
    pub fn as_single(&self) -> Option<&str> {
        match self {
            AnswerValue::Single(s) => Some(s),
            AnswerValue::Multiple(_) => None,
        }
    }

    /// Selected options. A single string counts as one selection.
    pub fn selected(&self) -> Vec<&str> {
        match self {
            AnswerValue::Single(s) if s.is_empty() => Vec::new(),
            AnswerValue::Single(s) => vec![s.as_str()],
            AnswerValue::Multiple(items) => items.iter().map(String::as_str).collect(),
        }
    }

    pub fn contains(&self, option: &str) -> bool {
        self.selected().contains(&option)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Single(s) => s.is_empty(),
            AnswerValue::Multiple(items) => items.is_empty(),
        }
    }

    /// Whether this is the file reference marker of `field_id`.
    pub fn is_file_reference(&self, field_id: &str) -> bool {
        self.as_single()
            .and_then(|s| s.strip_prefix(FILE_REFERENCE_PREFIX))
            .is_some_and(|key| key == field_id)
    }
}

pub fn file_reference(field_id: &str) -> AnswerValue {
    AnswerValue::Single(format!("{}{}", FILE_REFERENCE_PREFIX, field_id))
}

/// Check or uncheck one checkbox option.
///
/// Checking appends the option after the existing selections unless it is
/// already present; unchecking removes it. Selection order is otherwise
/// untouched.
pub fn toggle_checkbox(current: Option<&AnswerValue>, option: &str, checked: bool) -> AnswerValue {
    let mut selected: Vec<String> = current
        .map(|v| v.selected().into_iter().map(str::to_string).collect())
        .unwrap_or_default();

    if checked {
        if !selected.iter().any(|s| s == option) {
            selected.push(option.to_string());
        }
    } else {
        selected.retain(|s| s != option);
    }

    AnswerValue::Multiple(selected)
}

/// Binary payload sent alongside an answer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineBlob {
    pub key: String,
    pub content_type: String,
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub data: Vec<u8>,
}

fn to_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

fn from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD
        .decode(encoded)
        .map_err(serde::de::Error::custom)
}

/// Replace the inline data URIs of canvas fields with file references.
///
/// Only fields named in `canvas_fields` are considered. Each data URI value
/// becomes `blob:<field id>` and its decoded bytes are returned as an
/// [`InlineBlob`] under the same key. Values of every other field pass
/// through untouched.
pub fn extract_inline_blobs(
    values: &AnswerMap,
    canvas_fields: &BTreeSet<FieldId>,
) -> Result<(AnswerMap, Vec<InlineBlob>), FormError> {
    let mut stripped = AnswerMap::new();
    let mut blobs = Vec::new();

    for (id, value) in values {
        match value.as_single() {
            Some(s) if canvas_fields.contains(id) && s.starts_with("data:") => {
                let (content_type, data) = decode_data_uri(s)?;
                blobs.push(InlineBlob {
                    key: id.clone(),
                    content_type,
                    data,
                });
                stripped.insert(id.clone(), file_reference(id));
            }
            _ => {
                stripped.insert(id.clone(), value.clone());
            }
        }
    }

    Ok((stripped, blobs))
}

/// Substitute every file reference with the URL its blob was stored at.
///
/// A field's own marker without a matching uploaded blob is rejected.
pub fn resolve_file_references(
    values: AnswerMap,
    resolved: &BTreeMap<String, String>,
) -> Result<AnswerMap, FormError> {
    values
        .into_iter()
        .map(|(id, value)| {
            if !value.is_file_reference(&id) {
                return Ok((id, value));
            }
            match resolved.get(&id) {
                Some(url) => Ok((id, AnswerValue::Single(url.clone()))),
                None => Err(FormError::Validation(format!(
                    "No blob uploaded for reference {}",
                    id
                ))),
            }
        })
        .collect()
}
