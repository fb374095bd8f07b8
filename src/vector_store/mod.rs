//! Vector index for event chunks.
//!
//! Scores are cosine distances (`1 - cos`, in `[0, 2]`): **lower is more
//! similar**. Every threshold in the crate is a maximum distance. Use
//! [`SearchResult::similarity`] when a higher-is-better number is wanted
//! for display.

mod active;
mod flat;
mod sqlite;

pub use active::ActiveIndex;
pub use flat::FlatIndex;
pub use sqlite::SnapshotStore;

use crate::chunking::{Chunk, ChunkMetadata, MetadataValue};
use crate::error::{PulsError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File name of the snapshot sidecar descriptor.
pub const DESCRIPTOR_FILE: &str = "config.json";

/// File name of the snapshot vector database.
pub const VECTORS_FILE: &str = "vectors.db";

/// A chunk bound to its embedding. Never mutated after insertion.
#[derive(Debug, Clone)]
pub struct IndexedVector {
    pub id: Uuid,
    pub document: Chunk,
    pub embedding: Vec<f32>,
    pub indexed_at: DateTime<Utc>,
}

impl IndexedVector {
    pub fn new(document: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            document,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A search result with its distance score.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// The matched chunk.
    pub document: Chunk,
    /// Cosine distance to the query (lower is better).
    pub score: f32,
}

impl SearchResult {
    /// Cosine similarity (higher is better).
    pub fn similarity(&self) -> f32 {
        1.0 - self.score
    }
}

/// Exact-match conditions over chunk metadata, all of which must hold.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    conditions: Vec<(String, MetadataValue)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Reject conditions on fields chunks do not have.
    pub fn validate(&self) -> Result<()> {
        for (field, _) in &self.conditions {
            if !ChunkMetadata::FIELDS.contains(&field.as_str()) {
                return Err(PulsError::InvalidInput(format!(
                    "Cannot filter on unknown metadata field '{}'",
                    field
                )));
            }
        }
        Ok(())
    }

    /// Whether the metadata satisfies every condition.
    pub fn matches(&self, metadata: &ChunkMetadata) -> Result<bool> {
        for (field, expected) in &self.conditions {
            if !metadata.field(field)?.matches(expected) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Whether an index holds any vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Empty,
    Ready,
}

impl std::fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexStatus::Empty => write!(f, "empty"),
            IndexStatus::Ready => write!(f, "ready"),
        }
    }
}

/// Index statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub status: IndexStatus,
    pub vector_count: usize,
    pub provider: String,
    pub dimensions: usize,
}

/// Sidecar written next to a persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub embedding_provider: String,
    pub num_vectors: usize,
    #[serde(default)]
    pub dimensions: usize,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Read-side interface of an index, as used by retrieval.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Nearest neighbours of `query`, best first.
    ///
    /// `filter` restricts candidates before ranking; `max_distance` drops
    /// results scoring above it.
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
        max_distance: Option<f32>,
    ) -> Result<Vec<SearchResult>>;

    fn stats(&self) -> Result<IndexStats>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance, `1 - cosine_similarity`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_distance_range() {
        let a = vec![1.0, 0.0];
        assert!(cosine_distance(&a, &a).abs() < 0.001);
        assert!((cosine_distance(&a, &[-1.0, 0.0]) - 2.0).abs() < 0.001);
        assert!((cosine_distance(&a, &[0.0, 0.0]) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_filter_matches_all_conditions() {
        let meta = ChunkMetadata {
            location_city: "Paris".to_string(),
            category: "Musique".to_string(),
            year: Some(2024),
            ..Default::default()
        };

        let filter = MetadataFilter::new().eq("location_city", "Paris").eq("year", 2024);
        assert!(filter.matches(&meta).unwrap());

        let filter = MetadataFilter::new().eq("location_city", "Paris").eq("category", "Théâtre");
        assert!(!filter.matches(&meta).unwrap());
    }

    #[test]
    fn test_filter_rejects_unknown_field() {
        let filter = MetadataFilter::new().eq("city", "Paris");
        assert!(matches!(filter.validate(), Err(PulsError::InvalidInput(_))));
    }

    #[test]
    fn test_descriptor_accepts_minimal_sidecar() {
        let descriptor: IndexDescriptor =
            serde_json::from_str(r#"{"embedding_provider": "hashing:d64", "num_vectors": 3}"#)
                .unwrap();
        assert_eq!(descriptor.num_vectors, 3);
        assert_eq!(descriptor.dimensions, 0);
    }
}
