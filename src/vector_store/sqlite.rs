//! SQLite storage for index snapshots.
//!
//! One row per indexed vector, metadata in typed columns and the embedding
//! as a little-endian f32 BLOB. Rows keep their insertion position so a
//! loaded index ranks ties exactly like the one that was persisted.

use super::IndexedVector;
use crate::chunking::{Chunk, ChunkMetadata};
use crate::error::{PulsError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, types::Type, Connection, Row};
use std::path::Path;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS vectors (
    position INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    text TEXT NOT NULL,
    chunk_id INTEGER NOT NULL,
    total_chunks INTEGER NOT NULL,
    event_id TEXT NOT NULL,
    title TEXT NOT NULL,
    location_city TEXT NOT NULL,
    location_name TEXT NOT NULL,
    date_start TEXT,
    date_end TEXT,
    category TEXT NOT NULL,
    url TEXT NOT NULL,
    keywords TEXT NOT NULL,
    source_agenda TEXT NOT NULL,
    year INTEGER,
    ym TEXT,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vectors_event_id ON vectors(event_id);
"#;

/// SQLite file holding the vectors of one snapshot.
pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    /// Create (or open) a snapshot database for writing.
    #[instrument(skip_all)]
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        debug!("Opened snapshot database at {:?}", path);
        Ok(Self { conn })
    }

    /// Open an existing snapshot database.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PulsError::VectorStore(format!(
                "Snapshot database not found at {:?}",
                path
            )));
        }
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    /// Create an in-memory snapshot database (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Replace the stored vectors with `vectors`, in order.
    #[instrument(skip(self, vectors), fields(count = vectors.len()))]
    pub fn write_all(&self, vectors: &[IndexedVector]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM vectors", [])?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO vectors
                (position, id, text, chunk_id, total_chunks, event_id, title, location_city,
                 location_name, date_start, date_end, category, url, keywords, source_agenda,
                 year, ym, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
                "#,
            )?;

            for (position, vector) in vectors.iter().enumerate() {
                let meta = &vector.document.metadata;
                stmt.execute(params![
                    position as i64,
                    vector.id.to_string(),
                    vector.document.text,
                    meta.chunk_id,
                    meta.total_chunks,
                    meta.event_id,
                    meta.title,
                    meta.location_city,
                    meta.location_name,
                    meta.date_start,
                    meta.date_end,
                    meta.category,
                    meta.url,
                    meta.keywords,
                    meta.source_agenda,
                    meta.year,
                    meta.ym,
                    embedding_to_bytes(&vector.embedding),
                    vector.indexed_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;
        info!("Wrote {} vectors to snapshot", vectors.len());
        Ok(vectors.len())
    }

    /// Read every stored vector in insertion order.
    pub fn read_all(&self) -> Result<Vec<IndexedVector>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, text, chunk_id, total_chunks, event_id, title, location_city,
                   location_name, date_start, date_end, category, url, keywords, source_agenda,
                   year, ym, embedding, indexed_at
            FROM vectors
            ORDER BY position
            "#,
        )?;

        let vectors = stmt
            .query_map([], row_to_vector)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| match e {
                rusqlite::Error::FromSqlConversionFailure(column, _, err) => {
                    PulsError::VectorStore(format!("Corrupt snapshot row (column {}): {}", column, err))
                }
                other => other.into(),
            })?;

        debug!("Read {} vectors from snapshot", vectors.len());
        Ok(vectors)
    }

    /// Number of stored vectors.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM vectors", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn row_to_vector(row: &Row<'_>) -> rusqlite::Result<IndexedVector> {
    let id: String = row.get(0)?;
    let embedding: Vec<u8> = row.get(16)?;
    let indexed_at: String = row.get(17)?;

    Ok(IndexedVector {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        document: Chunk {
            text: row.get(1)?,
            metadata: ChunkMetadata {
                chunk_id: row.get(2)?,
                total_chunks: row.get(3)?,
                event_id: row.get(4)?,
                title: row.get(5)?,
                location_city: row.get(6)?,
                location_name: row.get(7)?,
                date_start: row.get(8)?,
                date_end: row.get(9)?,
                category: row.get(10)?,
                url: row.get(11)?,
                keywords: row.get(12)?,
                source_agenda: row.get(13)?,
                year: row.get(14)?,
                ym: row.get(15)?,
            },
        },
        embedding: bytes_to_embedding(&embedding),
        indexed_at: DateTime::parse_from_rfc3339(&indexed_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(17, e))?,
    })
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

/// Serialize embedding to bytes.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize embedding from bytes.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
            f32::from_le_bytes(arr)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(event_id: &str, year: Option<i32>, embedding: Vec<f32>) -> IndexedVector {
        IndexedVector::new(
            Chunk::from_document(
                format!("Texte de {}", event_id),
                ChunkMetadata {
                    event_id: event_id.to_string(),
                    location_city: "Nantes".to_string(),
                    date_start: year.map(|y| format!("{}-05-01", y)),
                    ..Default::default()
                },
            ),
            embedding,
        )
    }

    #[test]
    fn test_write_and_read_preserves_order_and_fields() {
        let store = SnapshotStore::in_memory().unwrap();
        let vectors = vec![
            vector("b", Some(2024), vec![0.5, -0.25, 1.0]),
            vector("a", None, vec![0.0, 1.0, 0.0]),
        ];

        assert_eq!(store.write_all(&vectors).unwrap(), 2);
        let loaded = store.read_all().unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, vectors[0].id);
        assert_eq!(loaded[0].document, vectors[0].document);
        assert_eq!(loaded[0].embedding, vec![0.5, -0.25, 1.0]);
        assert_eq!(loaded[0].document.metadata.year, Some(2024));
        assert_eq!(loaded[1].document.metadata.event_id, "a");
        assert_eq!(loaded[1].document.metadata.ym, None);
    }

    #[test]
    fn test_write_replaces_previous_contents() {
        let store = SnapshotStore::in_memory().unwrap();
        store
            .write_all(&[vector("x", None, vec![1.0]), vector("y", None, vec![1.0])])
            .unwrap();
        store.write_all(&[vector("z", None, vec![1.0])]).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_corrupt_rows_are_reported() {
        let store = SnapshotStore::in_memory().unwrap();
        store.write_all(&[vector("a", None, vec![1.0])]).unwrap();

        store
            .conn
            .execute("UPDATE vectors SET id = 'pas-un-uuid'", [])
            .unwrap();
        assert!(matches!(store.read_all(), Err(PulsError::VectorStore(_))));

        store
            .conn
            .execute(
                "UPDATE vectors SET id = ?1, indexed_at = 'hier'",
                [uuid::Uuid::new_v4().to_string()],
            )
            .unwrap();
        match store.read_all() {
            Err(PulsError::VectorStore(msg)) => assert!(msg.contains("column 17")),
            other => panic!("expected corrupt row error, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SnapshotStore::open(&dir.path().join("vectors.db")).is_err());
    }

    #[test]
    fn test_embedding_bytes_roundtrip() {
        let original = vec![0.1f32, -2.5, 3.75];
        assert_eq!(bytes_to_embedding(&embedding_to_bytes(&original)), original);
    }
}
