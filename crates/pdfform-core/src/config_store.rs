//! Page configuration persistence
//!
//! A configuration maps 1-based page numbers to the fields drawn on that
//! page. It is stored as one JSON document per PDF:
//!
//! ```json
//! { "1": { "elements": { "text-…": { "type": "text", "fontSize": 20, "rect": {…}, "placeholder": "…" } } } }
//! ```

use crate::answers::AnswerMap;
use crate::backend::FormBackend;
use crate::error::FormError;
use crate::fields::{Field, FieldId, FieldRecord, FieldType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default)]
    pub elements: BTreeMap<FieldId, FieldRecord>,
}

pub type PageConfiguration = BTreeMap<u32, PageConfig>;

/// Live fields of one page, keyed by id.
pub type PageFields = BTreeMap<FieldId, Field>;

/// Rebuild the fields stored for `page`. Missing pages yield no fields.
pub fn fields_for_page(config: &PageConfiguration, page: u32) -> PageFields {
    config
        .get(&page)
        .map(|page_config| {
            page_config
                .elements
                .iter()
                .map(|(id, record)| (id.clone(), Field::from_record(id.clone(), record)))
                .collect()
        })
        .unwrap_or_default()
}

pub fn serialize_page(fields: &PageFields) -> PageConfig {
    PageConfig {
        elements: fields
            .iter()
            .map(|(id, field)| (id.clone(), field.serialize()))
            .collect(),
    }
}

/// Build the configuration to save from the pages visited this session.
///
/// Visited pages replace their persisted entry, or drop it when they no
/// longer hold any field. Pages that were never visited keep their
/// persisted entry as is.
pub fn serialize_for_save<'a, I>(persisted: &PageConfiguration, visited: I) -> PageConfiguration
where
    I: IntoIterator<Item = (u32, &'a PageFields)>,
{
    let mut config = persisted.clone();
    for (page, fields) in visited {
        if fields.is_empty() {
            config.remove(&page);
        } else {
            config.insert(page, serialize_page(fields));
        }
    }
    config
}

/// Copy of `config` with each answered field's `value` set.
///
/// `config` itself is left untouched.
pub fn hydrate_for_fill(config: &PageConfiguration, answers: &AnswerMap) -> PageConfiguration {
    let mut hydrated = config.clone();
    for page in hydrated.values_mut() {
        for (id, record) in page.elements.iter_mut() {
            if let Some(value) = answers.get(id) {
                record.value = Some(value.clone());
            }
        }
    }
    hydrated
}

/// Ids of every canvas field, across all pages.
pub fn canvas_field_ids(config: &PageConfiguration) -> BTreeSet<FieldId> {
    config
        .values()
        .flat_map(|page| page.elements.iter())
        .filter(|(_, record)| record.field_type == FieldType::Canvas)
        .map(|(id, _)| id.clone())
        .collect()
}

/// Values carried by a hydrated configuration.
pub fn answers_from_config(config: &PageConfiguration) -> AnswerMap {
    config
        .values()
        .flat_map(|page| page.elements.iter())
        .filter_map(|(id, record)| record.value.clone().map(|v| (id.clone(), v)))
        .collect()
}

pub fn to_json(config: &PageConfiguration) -> Result<String, FormError> {
    Ok(serde_json::to_string(config)?)
}

/// Parse a stored configuration. Empty documents and `null` are empty.
pub fn parse_configuration(json: &str) -> Result<PageConfiguration, FormError> {
    let trimmed = json.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(PageConfiguration::new());
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// Fetch and parse a configuration, degrading to empty on any failure.
///
/// A PDF without a configuration pointer simply has no fields yet.
pub async fn fetch_configuration<B: FormBackend + ?Sized>(
    backend: &B,
    config_url: Option<&str>,
) -> PageConfiguration {
    let Some(url) = config_url else {
        debug!("No configuration stored yet");
        return PageConfiguration::new();
    };

    let json = match backend.fetch_configuration_json(url).await {
        Ok(json) => json,
        Err(e) => {
            warn!(url, error = %e, "Configuration fetch failed, rendering without fields");
            return PageConfiguration::new();
        }
    };

    match parse_configuration(&json) {
        Ok(config) => config,
        Err(e) => {
            warn!(url, error = %e, "Configuration is malformed, rendering without fields");
            PageConfiguration::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::AnswerValue;
    use crate::fields::{FieldEdit, FieldType};
    use crate::geometry::Rect;
    use pretty_assertions::assert_eq;

    fn page_with(types: &[FieldType]) -> PageFields {
        types
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let field = Field::create(*t, Rect::new(10.0, 40.0 * i as f64, 150.0, 30.0), 16.0);
                (field.id.clone(), field)
            })
            .collect()
    }

    #[test]
    fn test_round_trip_every_variant() {
        let mut fields = page_with(&FieldType::ALL);
        for field in fields.values_mut() {
            let _ = field.apply_edit(&FieldEdit::AddOption);
            let _ = field.apply_edit(&FieldEdit::SetPlaceholder {
                placeholder: "Name".to_string(),
            });
        }

        let saved = serialize_for_save(&PageConfiguration::new(), [(1, &fields)]);
        let hydrated = hydrate_for_fill(&saved, &AnswerMap::new());
        assert_eq!(fields_for_page(&hydrated, 1), fields);
    }

    #[test]
    fn test_serialize_is_idempotent() {
        let fields = page_with(&[FieldType::Text, FieldType::Checkbox]);
        let first = to_json(&serialize_for_save(&PageConfiguration::new(), [(2, &fields)])).unwrap();
        let second = to_json(&serialize_for_save(&PageConfiguration::new(), [(2, &fields)])).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unvisited_pages_are_carried_forward() {
        let mut persisted = PageConfiguration::new();
        persisted.insert(1, serialize_page(&page_with(&[FieldType::Text])));
        persisted.insert(3, serialize_page(&page_with(&[FieldType::Radio])));

        let page2 = page_with(&[FieldType::Dropdown]);
        let saved = serialize_for_save(&persisted, [(2, &page2)]);

        assert_eq!(saved.get(&1), persisted.get(&1));
        assert_eq!(saved.get(&3), persisted.get(&3));
        assert_eq!(saved[&2], serialize_page(&page2));
    }

    #[test]
    fn test_visited_empty_page_is_omitted() {
        let mut persisted = PageConfiguration::new();
        persisted.insert(1, serialize_page(&page_with(&[FieldType::Text])));

        let saved = serialize_for_save(&persisted, [(1, &PageFields::new())]);
        assert!(saved.is_empty());
        assert_eq!(to_json(&saved).unwrap(), "{}");
    }

    #[test]
    fn test_canvas_field_ids_spans_pages() {
        let page1 = page_with(&[FieldType::Canvas, FieldType::Text]);
        let page2 = page_with(&[FieldType::Canvas]);
        let config = serialize_for_save(&PageConfiguration::new(), [(1, &page1), (2, &page2)]);

        let ids = canvas_field_ids(&config);
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| id.starts_with("canvas-")));
    }

    #[test]
    fn test_hydrate_does_not_mutate_source() {
        let fields = page_with(&[FieldType::Text]);
        let id = fields.keys().next().unwrap().clone();
        let config = serialize_for_save(&PageConfiguration::new(), [(1, &fields)]);
        let snapshot = config.clone();

        let mut answers = AnswerMap::new();
        answers.insert(id.clone(), AnswerValue::Single("Jane".to_string()));
        answers.insert("unknown".to_string(), AnswerValue::Single("x".to_string()));
        let hydrated = hydrate_for_fill(&config, &answers);

        assert_eq!(config, snapshot);
        assert_eq!(
            hydrated[&1].elements[&id].value,
            Some(AnswerValue::Single("Jane".to_string()))
        );
        let carried = answers_from_config(&hydrated);
        assert_eq!(carried.len(), 1);
        assert_eq!(carried[&id], answers[&id]);
    }

    #[test]
    fn test_page_keys_are_strings_on_the_wire() {
        let fields = page_with(&[FieldType::Canvas]);
        let json = to_json(&serialize_for_save(&PageConfiguration::new(), [(4, &fields)])).unwrap();
        assert!(json.starts_with(r#"{"4":{"elements":{"canvas-"#));
        let parsed = parse_configuration(&json).unwrap();
        assert!(parsed.contains_key(&4));
    }

    #[test]
    fn test_parse_legacy_document() {
        let json = r#"{
            "1": {"elements": {
                "text-1700000000000": {"type": "text", "fontSize": 20,
                    "rect": {"width": 200, "height": 30, "left": 50, "top": 100},
                    "placeholder": "Enter text"},
                "free-hand-1": {"type": "free-hand", "fontSize": 20,
                    "rect": {"width": 100, "height": 60, "left": 0, "top": 0}}
            }}
        }"#;
        let config = parse_configuration(json).unwrap();
        let fields = fields_for_page(&config, 1);
        assert_eq!(fields["text-1700000000000"].rect, Rect::new(50.0, 100.0, 200.0, 30.0));
        assert_eq!(fields["free-hand-1"].field_type(), FieldType::Canvas);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            parse_configuration("{not json"),
            Err(FormError::Serialization(_))
        ));
        assert!(parse_configuration("  ").unwrap().is_empty());
        assert!(parse_configuration("null").unwrap().is_empty());
    }
}
