//! Canonical event records.
//!
//! Records arrive already cleaned (one JSON array of objects in the shape
//! below). Upstream exports write `null` for missing strings and numeric
//! identifiers, so deserialization is lenient about both.

use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// A cultural event in canonical form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique identifier within a batch.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location_city: String,
    /// ISO 8601 start timestamp.
    #[serde(default)]
    pub date_start: Option<String>,
    /// ISO 8601 end timestamp.
    #[serde(default)]
    pub date_end: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    /// Comma-joined keywords.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub keywords: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub category: String,
    /// Agenda the event was collected from.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub source_agenda: String,
}

impl EventRecord {
    /// Create a record with only an identifier and title set.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Records parsed from one events file.
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    pub events: Vec<EventRecord>,
    /// Array elements that could not be read as an event.
    pub malformed: usize,
    /// Records dropped because their identifier was already seen.
    pub duplicates: usize,
}

/// Load a batch of events from a JSON array file.
///
/// Malformed records and records with an identifier already seen in the
/// batch are dropped and counted.
pub fn load_events(path: &Path) -> Result<EventBatch> {
    let content = std::fs::read_to_string(path)?;
    let batch = parse_events(&content)?;
    info!("Loaded {} events from {:?}", batch.events.len(), path);
    Ok(batch)
}

/// Parse a batch of events from a JSON array string.
///
/// Only a document that is not a JSON array is an error; each element is
/// read on its own.
pub fn parse_events(json: &str) -> Result<EventBatch> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;

    let mut records = Vec::with_capacity(values.len());
    let mut malformed = 0usize;
    for (position, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<EventRecord>(value) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("Skipping malformed event at position {}: {}", position, e);
                malformed += 1;
            }
        }
    }
    if malformed > 0 {
        warn!("Skipped {} malformed events", malformed);
    }

    let total = records.len();
    let events = dedup_by_id(records);
    Ok(EventBatch {
        duplicates: total - events.len(),
        events,
        malformed,
    })
}

pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number identifier, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lenient_fields() {
        let json = r#"[
            {"id": 123, "title": "Concert de jazz", "description": null,
             "location_city": "Paris", "date_start": "2024-06-21T20:00:00+02:00"},
            {"id": "abc", "title": null, "keywords": "jazz, live"}
        ]"#;

        let events = parse_events(json).unwrap().events;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "123");
        assert_eq!(events[0].description, "");
        assert_eq!(events[0].date_start.as_deref(), Some("2024-06-21T20:00:00+02:00"));
        assert_eq!(events[1].title, "");
        assert_eq!(events[1].keywords, "jazz, live");
        assert!(events[1].date_start.is_none());
    }

    #[test]
    fn test_duplicate_identifiers_are_dropped() {
        let json = r#"[
            {"id": "e1", "title": "First"},
            {"id": "e2", "title": "Second"},
            {"id": "e1", "title": "First again"}
        ]"#;

        let events = parse_events(json).unwrap().events;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "First");
        assert_eq!(events[1].id, "e2");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events_clean.json");
        std::fs::write(&path, r#"[{"id": "e1", "title": "Expo photo"}]"#).unwrap();

        let events = load_events(&path).unwrap().events;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Expo photo");
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let json = r#"[
            {"id": "e1", "title": "Concert"},
            {"title": "Sans identifiant"},
            {"id": "e3", "title": {"fr": "Expo"}},
            {"id": "e4", "title": "Théâtre"},
            {"id": "e1", "title": "Concert bis"}
        ]"#;

        let batch = parse_events(json).unwrap();
        assert_eq!(batch.malformed, 2);
        assert_eq!(batch.duplicates, 1);
        let ids: Vec<&str> = batch.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e4"]);
    }

    #[test]
    fn test_non_array_document_fails() {
        assert!(parse_events(r#"{"id": "e1"}"#).is_err());
    }
}
