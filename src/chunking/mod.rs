//! Chunking of event records into embeddable text units.
//!
//! Every chunk carries a denormalized copy of its event's metadata, including
//! the `year` / `ym` keys used for temporal filtering at query time. Those two
//! keys are derived here, once, and nowhere else.

mod compose;
mod splitter;

pub use compose::{compose_event_text, format_date_fr, parse_iso_date};
pub use splitter::{TextSplitter, TextWindow};

use crate::error::{PulsError, Result};
use crate::events::{null_as_empty, string_or_number, EventRecord};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Metadata attached to every chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkMetadata {
    /// Position of this chunk within its event (dense from 0).
    pub chunk_id: u32,
    /// Number of chunks produced for the event.
    pub total_chunks: u32,
    #[serde(deserialize_with = "string_or_number")]
    pub event_id: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub location_city: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub location_name: String,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub category: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub keywords: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub source_agenda: String,
    /// Year of `date_start`.
    pub year: Option<i32>,
    /// Year and month of `date_start`, formatted `YYYY-MM`.
    pub ym: Option<String>,
}

impl Default for ChunkMetadata {
    fn default() -> Self {
        Self {
            chunk_id: 0,
            total_chunks: 1,
            event_id: String::new(),
            title: String::new(),
            location_city: String::new(),
            location_name: String::new(),
            date_start: None,
            date_end: None,
            category: String::new(),
            url: String::new(),
            keywords: String::new(),
            source_agenda: String::new(),
            year: None,
            ym: None,
        }
    }
}

/// A value of a single metadata field, used for exact-match filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Text(String),
    Int(i64),
    Missing,
}

impl MetadataValue {
    /// Exact equality, treating an integer and its decimal string as equal.
    pub fn matches(&self, other: &MetadataValue) -> bool {
        match (self, other) {
            (MetadataValue::Int(n), MetadataValue::Text(s))
            | (MetadataValue::Text(s), MetadataValue::Int(n)) => s.trim() == n.to_string(),
            _ => self == other,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Int(value as i64)
    }
}

fn text_value(s: &str) -> MetadataValue {
    MetadataValue::Text(s.to_string())
}

fn optional_text(s: &Option<String>) -> MetadataValue {
    s.as_deref().map(text_value).unwrap_or(MetadataValue::Missing)
}

impl ChunkMetadata {
    /// Field names accepted by [`ChunkMetadata::field`].
    pub const FIELDS: [&'static str; 14] = [
        "chunk_id", "total_chunks", "event_id", "title", "location_city", "location_name",
        "date_start", "date_end", "category", "url", "keywords", "source_agenda", "year", "ym",
    ];

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Result<MetadataValue> {
        let value = match name {
            "chunk_id" => MetadataValue::Int(self.chunk_id as i64),
            "total_chunks" => MetadataValue::Int(self.total_chunks as i64),
            "event_id" => text_value(&self.event_id),
            "title" => text_value(&self.title),
            "location_city" => text_value(&self.location_city),
            "location_name" => text_value(&self.location_name),
            "date_start" => optional_text(&self.date_start),
            "date_end" => optional_text(&self.date_end),
            "category" => text_value(&self.category),
            "url" => text_value(&self.url),
            "keywords" => text_value(&self.keywords),
            "source_agenda" => text_value(&self.source_agenda),
            "year" => self.year.map(MetadataValue::from).unwrap_or(MetadataValue::Missing),
            "ym" => optional_text(&self.ym),
            other => {
                return Err(PulsError::InvalidInput(format!(
                    "Unknown metadata field '{}' (expected one of: {})",
                    other,
                    Self::FIELDS.join(", ")
                )))
            }
        };
        Ok(value)
    }

    /// Fill `year` / `ym` from `date_start` when they are absent.
    fn with_temporal_keys(mut self) -> Self {
        if self.year.is_none() && self.ym.is_none() {
            let (year, ym) = temporal_keys(self.date_start.as_deref());
            self.year = year;
            self.ym = ym;
        }
        self
    }
}

/// Derive `(year, ym)` from an ISO start date.
pub fn temporal_keys(date_start: Option<&str>) -> (Option<i32>, Option<String>) {
    match date_start.and_then(parse_iso_date) {
        Some(date) => (
            Some(date.year()),
            Some(format!("{}-{:02}", date.year(), date.month())),
        ),
        None => (None, None),
    }
}

/// An embeddable text unit with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    #[serde(flatten)]
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Build a chunk from pre-split text and free-form metadata.
    ///
    /// Missing temporal keys are derived from `date_start`.
    pub fn from_document(text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            text: text.into(),
            metadata: metadata.with_temporal_keys(),
        }
    }

    /// Whether the chunk has any non-whitespace text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Configuration for chunking.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum window length in characters.
    pub max_chars: usize,
    /// Characters shared between consecutive windows.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 500,
            overlap: 50,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(PulsError::Config("chunking.max_chars must be positive".to_string()));
        }
        if self.overlap >= self.max_chars {
            return Err(PulsError::Config(format!(
                "chunking.overlap ({}) must be smaller than chunking.max_chars ({})",
                self.overlap, self.max_chars
            )));
        }
        Ok(())
    }
}

/// Chunks produced from a batch of events.
#[derive(Debug, Default)]
pub struct ChunkBatch {
    pub chunks: Vec<Chunk>,
    /// Events that produced at least one chunk.
    pub events_chunked: usize,
    /// Events skipped for an empty body or an error.
    pub events_skipped: usize,
}

/// Splits event records into chunks.
#[derive(Debug, Clone)]
pub struct EventChunker {
    splitter: TextSplitter,
}

impl EventChunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            splitter: TextSplitter::new(&config),
        })
    }

    /// Chunk one event. An event with an empty composed body yields no chunks.
    pub fn chunk(&self, event: &EventRecord) -> Result<Vec<Chunk>> {
        if event.id.trim().is_empty() {
            return Err(PulsError::InvalidInput(format!(
                "event '{}' has no identifier",
                event.title
            )));
        }

        let body = compose_event_text(event);
        let windows = self.splitter.split(&body);
        let total_chunks = windows.len() as u32;
        let (year, ym) = temporal_keys(event.date_start.as_deref());

        let chunks = windows
            .into_iter()
            .enumerate()
            .map(|(i, window)| Chunk {
                text: window.text,
                metadata: ChunkMetadata {
                    chunk_id: i as u32,
                    total_chunks,
                    event_id: event.id.clone(),
                    title: event.title.clone(),
                    location_city: event.location_city.clone(),
                    location_name: event.location_name.clone(),
                    date_start: event.date_start.clone(),
                    date_end: event.date_end.clone(),
                    category: event.category.clone(),
                    url: event.url.clone(),
                    keywords: event.keywords.clone(),
                    source_agenda: event.source_agenda.clone(),
                    year,
                    ym: ym.clone(),
                },
            })
            .collect();

        Ok(chunks)
    }

    /// Chunk a batch. Events that fail or produce nothing are skipped and counted.
    #[instrument(skip_all, fields(events = events.len()))]
    pub fn chunk_batch(&self, events: &[EventRecord]) -> ChunkBatch {
        let mut batch = ChunkBatch::default();

        for event in events {
            match self.chunk(event) {
                Ok(chunks) if chunks.is_empty() => {
                    warn!("Event {} has no text to index, skipping", event.id);
                    batch.events_skipped += 1;
                }
                Ok(chunks) => {
                    batch.chunks.extend(chunks);
                    batch.events_chunked += 1;
                }
                Err(e) => {
                    warn!("Failed to chunk event {}: {}", event.id, e);
                    batch.events_skipped += 1;
                }
            }
        }

        info!(
            "Created {} chunks from {} events ({} skipped)",
            batch.chunks.len(),
            events.len(),
            batch.events_skipped
        );
        batch
    }
}

impl Default for EventChunker {
    fn default() -> Self {
        Self {
            splitter: TextSplitter::new(&ChunkingConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, date: Option<&str>, description: &str) -> EventRecord {
        EventRecord {
            id: id.to_string(),
            title: format!("Événement {}", id),
            description: description.to_string(),
            location_city: "Lyon".to_string(),
            date_start: date.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_short_event_single_chunk() {
        let chunker = EventChunker::default();
        let chunks = chunker
            .chunk(&event("e1", Some("2024-03-09T18:00:00+01:00"), "Court."))
            .unwrap();

        assert_eq!(chunks.len(), 1);
        let meta = &chunks[0].metadata;
        assert_eq!(meta.chunk_id, 0);
        assert_eq!(meta.total_chunks, 1);
        assert_eq!(meta.year, Some(2024));
        assert_eq!(meta.ym.as_deref(), Some("2024-03"));
        assert!(chunks[0].text.contains("DateISO: 2024-03-09T18:00:00+01:00"));
    }

    #[test]
    fn test_long_event_dense_chunk_ids() {
        let chunker = EventChunker::new(ChunkingConfig {
            max_chars: 120,
            overlap: 20,
        })
        .unwrap();
        let description = "Une soirée de musique baroque. ".repeat(20);
        let chunks = chunker
            .chunk(&event("e2", Some("2023-12-01"), &description))
            .unwrap();

        assert!(chunks.len() > 1);
        let total = chunks.len() as u32;
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk_id, i as u32);
            assert_eq!(chunk.metadata.total_chunks, total);
            assert_eq!(chunk.metadata.event_id, "e2");
            assert!(!chunk.is_blank());
            assert!(chunk.text.chars().count() <= 120);
        }
    }

    #[test]
    fn test_year_month_consistency() {
        let chunker = EventChunker::default();
        for date in ["2024-01-31", "2025-12-01T09:00:00Z", "2023-07-14T22:00:00+02:00"] {
            let chunks = chunker.chunk(&event("e", Some(date), "Texte.")).unwrap();
            let meta = &chunks[0].metadata;
            let year = meta.year.unwrap();
            assert!(meta.ym.as_deref().unwrap().starts_with(&year.to_string()));
        }
    }

    #[test]
    fn test_missing_date_has_no_temporal_keys() {
        let chunks = EventChunker::default()
            .chunk(&event("e3", None, "Sans date."))
            .unwrap();
        assert_eq!(chunks[0].metadata.year, None);
        assert_eq!(chunks[0].metadata.ym, None);
    }

    #[test]
    fn test_batch_skips_empty_and_invalid() {
        let chunker = EventChunker::default();
        let events = vec![
            event("ok", Some("2024-05-01"), "Contenu."),
            EventRecord::new("blank", ""),
            event("", None, "Pas d'identifiant."),
        ];

        let batch = chunker.chunk_batch(&events);
        assert_eq!(batch.events_chunked, 1);
        assert_eq!(batch.events_skipped, 2);
        assert_eq!(batch.chunks.len(), 1);
        assert_eq!(batch.chunks[0].metadata.event_id, "ok");
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(EventChunker::new(ChunkingConfig { max_chars: 50, overlap: 50 }).is_err());
        assert!(EventChunker::new(ChunkingConfig { max_chars: 0, overlap: 0 }).is_err());
    }

    #[test]
    fn test_from_document_derives_temporal_keys() {
        let chunk = Chunk::from_document(
            "Expo photo à Lyon",
            ChunkMetadata {
                date_start: Some("2025-11-20".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(chunk.metadata.year, Some(2025));
        assert_eq!(chunk.metadata.ym.as_deref(), Some("2025-11"));
    }

    #[test]
    fn test_metadata_field_lookup() {
        let meta = ChunkMetadata {
            location_city: "Paris".to_string(),
            year: Some(2024),
            ..Default::default()
        };
        assert_eq!(meta.field("location_city").unwrap(), MetadataValue::from("Paris"));
        assert!(meta.field("year").unwrap().matches(&MetadataValue::from("2024")));
        assert_eq!(meta.field("ym").unwrap(), MetadataValue::Missing);
        assert!(meta.field("city").is_err());
    }

    #[test]
    fn test_metadata_deserializes_loose_json() {
        let meta: ChunkMetadata = serde_json::from_str(
            r#"{"category": "jazz", "date_start": "2025-11-15", "url": null, "event_id": 42}"#,
        )
        .unwrap();
        assert_eq!(meta.category, "jazz");
        assert_eq!(meta.url, "");
        assert_eq!(meta.event_id, "42");
        assert_eq!(meta.total_chunks, 1);
    }
}
