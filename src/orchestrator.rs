//! Pipeline orchestrator for Puls.
//!
//! Coordinates index builds (events file or raw documents), snapshot
//! loading, and the wiring of the answer engine around the active index.

use crate::chunking::{Chunk, ChunkMetadata, EventChunker};
use crate::config::{EmbeddingProvider, EmbeddingSettings, Prompts, Settings};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{PulsError, Result};
use crate::events::{load_events, EventRecord};
use crate::rag::{ContextFormatter, Generator, RagEngine, Retriever};
use crate::vector_store::{ActiveIndex, FlatIndex, IndexDescriptor, IndexStats, VectorIndex};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Chunks written next to the index for inspection.
const SAMPLE_FILE: &str = "chunks_sample.json";
const SAMPLE_SIZE: usize = 10;

/// A pre-chunked document submitted for a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildDocument {
    pub text: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

/// Outcome of indexing an events batch.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub events_loaded: usize,
    pub events_chunked: usize,
    pub events_skipped: usize,
    /// Records in the events file that could not be parsed.
    pub events_malformed: usize,
    pub chunks: usize,
    pub index_path: PathBuf,
    pub descriptor: IndexDescriptor,
}

/// Outcome of a rebuild from raw documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildReport {
    pub ok: bool,
    pub count: usize,
    pub index_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub provider: String,
}

/// The main orchestrator for the Puls pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    embedder: Arc<dyn Embedder>,
    chunker: EventChunker,
    active: Arc<ActiveIndex>,
    rebuild_lock: Mutex<()>,
}

impl Orchestrator {
    /// Create an orchestrator from settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let embedder = create_embedder(&settings.embedding)?;
        Self::with_components(settings, prompts, embedder)
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let chunker = EventChunker::new(settings.chunking_config())?;
        Ok(Self {
            settings,
            prompts,
            embedder,
            chunker,
            active: Arc::new(ActiveIndex::empty()),
            rebuild_lock: Mutex::new(()),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// The cell holding the serving index.
    pub fn active_index(&self) -> Arc<ActiveIndex> {
        self.active.clone()
    }

    /// Configured snapshot directory.
    pub fn index_path(&self) -> PathBuf {
        self.settings.index_path()
    }

    /// Load the snapshot at `path` (or the configured one) and serve it.
    #[instrument(skip(self))]
    pub fn load_index(&self, path: Option<&Path>) -> Result<IndexStats> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| self.index_path());
        let index = FlatIndex::load(&path, self.embedder.clone())?;
        let stats = index.stats()?;
        self.active.install(index)?;
        info!("Serving {} vectors from {:?}", stats.vector_count, path);
        Ok(stats)
    }

    /// Like [`Orchestrator::load_index`], but a missing snapshot is not an error.
    pub fn try_load_index(&self, path: Option<&Path>) -> Result<Option<IndexStats>> {
        match self.load_index(path) {
            Ok(stats) => Ok(Some(stats)),
            Err(PulsError::ConfigNotFound(sidecar)) => {
                warn!("No index found ({:?} missing)", sidecar);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Statistics of the serving index, if any.
    pub fn stats(&self) -> Result<Option<IndexStats>> {
        match self.active.current()? {
            Some(index) => Ok(Some(index.stats()?)),
            None => Ok(None),
        }
    }

    /// Chunk, embed and persist an events batch, then serve it.
    #[instrument(skip(self, events), fields(events = events.len()))]
    pub async fn index_events(&self, events: &[EventRecord], path: Option<&Path>) -> Result<IndexReport> {
        let _guard = self.rebuild_lock.lock().await;
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| self.index_path());

        let batch = self.chunker.chunk_batch(events);
        if batch.chunks.is_empty() {
            return Err(PulsError::EmptyInput(format!(
                "none of the {} events produced text",
                events.len()
            )));
        }

        let index = FlatIndex::new(self.embedder.clone());
        let chunks = batch.chunks.len();
        let sample: Vec<Chunk> = batch.chunks.iter().take(SAMPLE_SIZE).cloned().collect();
        index.build(batch.chunks).await?;

        let sample = serde_json::to_string_pretty(&sample)?;
        let descriptor = index.persist_with(&path, &[(SAMPLE_FILE, sample)])?;
        self.active.install(index)?;

        Ok(IndexReport {
            events_loaded: events.len(),
            events_chunked: batch.events_chunked,
            events_skipped: batch.events_skipped,
            events_malformed: 0,
            chunks,
            index_path: path,
            descriptor,
        })
    }

    /// [`Orchestrator::index_events`] over a cleaned events JSON file.
    pub async fn index_file(&self, events_path: &Path, path: Option<&Path>) -> Result<IndexReport> {
        let batch = load_events(events_path)?;
        let mut report = self.index_events(&batch.events, path).await?;
        report.events_malformed = batch.malformed;
        Ok(report)
    }

    /// Replace the serving index with one built from `docs`.
    ///
    /// The new index is built and persisted in isolation and installed only
    /// once complete. `provider` overrides the configured embedding provider
    /// for this index.
    #[instrument(skip(self, docs), fields(docs = docs.len()))]
    pub async fn rebuild(
        &self,
        docs: Vec<RebuildDocument>,
        path: Option<&Path>,
        provider: Option<EmbeddingProvider>,
    ) -> Result<RebuildReport> {
        if docs.is_empty() {
            return Err(PulsError::EmptyInput("no documents provided".to_string()));
        }

        let _guard = self.rebuild_lock.lock().await;
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| self.index_path());

        let embedder = match provider {
            Some(p) if p != self.settings.embedding.provider => {
                create_embedder(&EmbeddingSettings::for_provider(p))?
            }
            _ => self.embedder.clone(),
        };

        let chunks: Vec<Chunk> = docs
            .into_iter()
            .map(|d| Chunk::from_document(d.text, d.metadata))
            .collect();

        let index = FlatIndex::new(embedder);
        let count = index.build(chunks).await?;
        let descriptor = index.persist(&path)?;
        self.active.install(index)?;

        info!("Rebuilt index with {} vectors at {:?}", count, path);
        Ok(RebuildReport {
            ok: true,
            count,
            index_path: path,
            created_at: descriptor.created_at,
            provider: descriptor.embedding_provider,
        })
    }

    /// Answer engine over the active index, configured from settings.
    pub fn rag_engine(&self, generator: Arc<dyn Generator>) -> RagEngine {
        RagEngine::new(self.active.clone(), generator)
            .with_retriever(Retriever::from_settings(&self.settings.retrieval))
            .with_formatter(
                ContextFormatter::new()
                    .with_description_chars(self.settings.generation.description_chars),
            )
            .with_prompts(self.prompts.clone())
            .with_default_k(self.settings.retrieval.k)
    }
}
