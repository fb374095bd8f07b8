//! Exact nearest-neighbour index over an in-memory vector set.

use super::{
    cosine_distance, IndexDescriptor, IndexStats, IndexStatus, IndexedVector, MetadataFilter,
    SearchResult, SnapshotStore, VectorIndex, DESCRIPTOR_FILE, VECTORS_FILE,
};
use crate::chunking::Chunk;
use crate::embedding::Embedder;
use crate::error::{PulsError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, instrument, warn};

/// Flat (brute-force) index bound to one embedder.
///
/// The vector set is replaced wholesale by [`FlatIndex::build`] and only
/// ever grows through [`FlatIndex::add`]. Embedding happens outside the
/// lock; the write lock is held just long enough to swap or extend.
pub struct FlatIndex {
    embedder: Arc<dyn Embedder>,
    vectors: RwLock<Vec<IndexedVector>>,
}

impl FlatIndex {
    /// Create an empty (unbuilt) index.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            vectors: RwLock::new(Vec::new()),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<IndexedVector>>> {
        self.vectors
            .read()
            .map_err(|e| PulsError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<IndexedVector>>> {
        self.vectors
            .write()
            .map_err(|e| PulsError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Number of vectors in the index.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_built(&self) -> Result<bool> {
        Ok(!self.read()?.is_empty())
    }

    /// Embed chunks, dropping blank ones.
    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<IndexedVector>> {
        let total = chunks.len();
        let chunks: Vec<Chunk> = chunks.into_iter().filter(|c| !c.is_blank()).collect();
        if chunks.len() < total {
            warn!("Dropped {} blank chunks", total - chunks.len());
        }
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(PulsError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dimensions = self.embedder.dimensions();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
            return Err(PulsError::Embedding(format!(
                "Embedding has {} dimensions, expected {}",
                bad.len(),
                dimensions
            )));
        }

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedVector::new(chunk, embedding))
            .collect())
    }

    /// Replace the index contents with `chunks`.
    ///
    /// Fails with `EmptyInput` when no chunk has text. On failure the
    /// previous contents are untouched.
    #[instrument(skip_all, fields(chunks = chunks.len()))]
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Err(PulsError::EmptyInput("no chunks provided".to_string()));
        }

        let vectors = self.embed_chunks(chunks).await?;
        if vectors.is_empty() {
            return Err(PulsError::EmptyInput("every chunk was blank".to_string()));
        }

        let count = vectors.len();
        *self.write()? = vectors;
        info!("Built index with {} vectors", count);
        Ok(count)
    }

    /// Append `chunks` to a built index. Blank or empty input is a no-op.
    #[instrument(skip_all, fields(chunks = chunks.len()))]
    pub async fn add(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if !self.is_built()? {
            return Err(PulsError::NotBuilt);
        }

        let vectors = self.embed_chunks(chunks).await?;
        if vectors.is_empty() {
            return Ok(0);
        }

        let count = vectors.len();
        self.write()?.extend(vectors);
        info!("Added {} vectors to index", count);
        Ok(count)
    }

    /// Write the index to `dir` as `vectors.db` plus a `config.json` sidecar.
    pub fn persist(&self, dir: &Path) -> Result<IndexDescriptor> {
        self.persist_with(dir, &[])
    }

    /// Like [`FlatIndex::persist`], with `extra` `(file name, contents)` pairs
    /// written into the snapshot directory.
    ///
    /// The snapshot is assembled in a temporary sibling directory and renamed
    /// into place. `dir` must be absent, empty, or a previous snapshot; any
    /// other directory is refused with `InvalidInput` and left untouched.
    #[instrument(skip(self, extra))]
    pub fn persist_with(&self, dir: &Path, extra: &[(&str, String)]) -> Result<IndexDescriptor> {
        let vectors = self.read()?.clone();
        if vectors.is_empty() {
            return Err(PulsError::NotBuilt);
        }
        check_replaceable(dir)?;

        let parent = match dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let staging = tempfile::Builder::new()
            .prefix(".puls-index-")
            .tempdir_in(&parent)?;

        SnapshotStore::create(&staging.path().join(VECTORS_FILE))?.write_all(&vectors)?;

        let descriptor = IndexDescriptor {
            embedding_provider: self.embedder.provider_id(),
            num_vectors: vectors.len(),
            dimensions: self.embedder.dimensions(),
            created_at: Utc::now(),
        };
        std::fs::write(
            staging.path().join(DESCRIPTOR_FILE),
            serde_json::to_string_pretty(&descriptor)?,
        )?;
        for (name, contents) in extra {
            std::fs::write(staging.path().join(name), contents)?;
        }

        let retired = tempfile::Builder::new()
            .prefix(".puls-retired-")
            .tempdir_in(&parent)?;
        let parked = retired.path().join("index");
        if let Err(e) = swap_into_place(staging.path(), dir, &parked) {
            if parked.exists() {
                let kept = retired.keep();
                error!("Previous snapshot could not be restored, kept at {:?}", kept);
            }
            return Err(e);
        }

        info!("Persisted {} vectors to {:?}", descriptor.num_vectors, dir);
        Ok(descriptor)
    }

    /// Read the sidecar descriptor of a snapshot.
    pub fn read_descriptor(dir: &Path) -> Result<IndexDescriptor> {
        let path = dir.join(DESCRIPTOR_FILE);
        if !path.exists() {
            return Err(PulsError::ConfigNotFound(path));
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load a snapshot from `dir`, bound to `embedder`.
    ///
    /// The descriptor is read first; a snapshot written under a different
    /// embedding provider or size is rejected with `ProviderMismatch`.
    #[instrument(skip(embedder))]
    pub fn load(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let descriptor = Self::read_descriptor(dir)?;

        let configured = embedder.provider_id();
        let dimensions_differ =
            descriptor.dimensions != 0 && descriptor.dimensions != embedder.dimensions();
        if descriptor.embedding_provider != configured || dimensions_differ {
            return Err(PulsError::ProviderMismatch {
                stored: descriptor.embedding_provider,
                configured,
            });
        }

        let vectors = SnapshotStore::open(&dir.join(VECTORS_FILE))?.read_all()?;
        if vectors.len() != descriptor.num_vectors {
            warn!(
                "Snapshot descriptor lists {} vectors but {} were stored",
                descriptor.num_vectors,
                vectors.len()
            );
        }
        if let Some(bad) = vectors.iter().find(|v| v.embedding.len() != embedder.dimensions()) {
            return Err(PulsError::VectorStore(format!(
                "Stored vector has {} dimensions, expected {}",
                bad.embedding.len(),
                embedder.dimensions()
            )));
        }

        info!("Loaded {} vectors from {:?}", vectors.len(), dir);
        Ok(Self {
            embedder,
            vectors: RwLock::new(vectors),
        })
    }
}

/// Refuse to replace anything but a missing path, an empty directory or a
/// previous snapshot.
fn check_replaceable(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    if !dir.is_dir() {
        return Err(PulsError::InvalidInput(format!(
            "{:?} exists and is not a directory",
            dir
        )));
    }
    if dir.join(DESCRIPTOR_FILE).is_file() || std::fs::read_dir(dir)?.next().is_none() {
        return Ok(());
    }
    Err(PulsError::InvalidInput(format!(
        "{:?} is not an index snapshot (no {}); refusing to replace it",
        dir, DESCRIPTOR_FILE
    )))
}

/// Move `staged` to `dir`, parking any previous snapshot at `parked`.
///
/// When the final rename fails the previous snapshot is moved back.
fn swap_into_place(staged: &Path, dir: &Path, parked: &Path) -> Result<()> {
    let had_previous = dir.exists();
    if had_previous {
        std::fs::rename(dir, parked)?;
    }

    if let Err(e) = std::fs::rename(staged, dir) {
        if had_previous {
            std::fs::rename(parked, dir).map_err(|restore| {
                PulsError::VectorStore(format!(
                    "Failed to install snapshot at {:?} ({}) and to restore the previous one: {}",
                    dir, e, restore
                ))
            })?;
            warn!("Snapshot install failed, previous snapshot restored at {:?}", dir);
        }
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl VectorIndex for FlatIndex {
    #[instrument(skip(self, filter))]
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
        max_distance: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(PulsError::EmptyQuery);
        }
        if !self.is_built()? {
            return Err(PulsError::NotBuilt);
        }
        if let Some(filter) = filter {
            filter.validate()?;
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_query(query).await?;
        if query_embedding.len() != self.embedder.dimensions() {
            return Err(PulsError::Embedding(format!(
                "Query embedding has {} dimensions, expected {}",
                query_embedding.len(),
                self.embedder.dimensions()
            )));
        }

        let vectors = self.read()?;
        let mut scored: Vec<(usize, f32)> = Vec::with_capacity(vectors.len());
        for (i, vector) in vectors.iter().enumerate() {
            if let Some(filter) = filter {
                if !filter.matches(&vector.document.metadata)? {
                    continue;
                }
            }
            let distance = cosine_distance(&query_embedding, &vector.embedding);
            if max_distance.is_some_and(|max| distance > max) {
                continue;
            }
            scored.push((i, distance));
        }

        // Stable sort keeps insertion order among equal distances.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        let results: Vec<SearchResult> = scored
            .into_iter()
            .map(|(i, score)| SearchResult {
                document: vectors[i].document.clone(),
                score,
            })
            .collect();

        debug!("Found {} results", results.len());
        Ok(results)
    }

    fn stats(&self) -> Result<IndexStats> {
        let vector_count = self.len()?;
        Ok(IndexStats {
            status: if vector_count == 0 {
                IndexStatus::Empty
            } else {
                IndexStatus::Ready
            },
            vector_count,
            provider: self.embedder.provider_id(),
            dimensions: self.embedder.dimensions(),
        })
    }
}
