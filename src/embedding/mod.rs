//! Embedding generation for indexing and retrieval.
//!
//! The embedder is injected into the index at construction. Swapping
//! providers changes the vector space, so every embedder exposes a stable
//! [`Embedder::provider_id`] that is written next to persisted indexes and
//! checked when they are loaded.

mod hashing;
mod openai;

pub use hashing::HashingEmbedder;
pub use openai::OpenAIEmbedder;

use crate::config::{EmbeddingProvider, EmbeddingSettings};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embeddings for documents, in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate an embedding for a search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Identity of the vector space, e.g. `openai:text-embedding-3-small:1536`.
    fn provider_id(&self) -> String;
}

/// Build the embedder described by the settings.
pub fn create_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match settings.provider {
        EmbeddingProvider::OpenAI => Arc::new(OpenAIEmbedder::openai(
            &settings.model,
            settings.dimensions as usize,
        )?),
        EmbeddingProvider::Mistral => Arc::new(OpenAIEmbedder::mistral(
            &settings.model,
            settings.dimensions as usize,
        )?),
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(settings.dimensions as usize)),
    };
    Ok(embedder)
}
