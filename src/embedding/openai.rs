//! Remote embeddings over an OpenAI-compatible API (OpenAI or Mistral).

use super::Embedder;
use crate::error::{PulsError, Result};
use crate::openai::{create_client_for, Endpoint};
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";
const DEFAULT_MISTRAL_MODEL: &str = "mistral-embed";

/// Embedder backed by an OpenAI-compatible embeddings endpoint.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    endpoint: Endpoint,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// OpenAI embeddings with the given model and dimensions.
    pub fn openai(model: &str, dimensions: usize) -> Result<Self> {
        Self::build(Endpoint::OpenAI, model, DEFAULT_OPENAI_MODEL, dimensions)
    }

    /// Mistral embeddings. The model has a fixed size, so `dimensions` is
    /// only recorded, never sent.
    pub fn mistral(model: &str, dimensions: usize) -> Result<Self> {
        Self::build(Endpoint::Mistral, model, DEFAULT_MISTRAL_MODEL, dimensions)
    }

    fn build(endpoint: Endpoint, model: &str, default_model: &str, dimensions: usize) -> Result<Self> {
        let model = if model.trim().is_empty() { default_model } else { model };
        Ok(Self {
            client: create_client_for(endpoint)?,
            endpoint,
            model: model.to_string(),
            dimensions,
        })
    }

    async fn request(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut args = CreateEmbeddingRequestArgs::default();
        args.model(&self.model).input(EmbeddingInput::StringArray(input));
        if self.endpoint == Endpoint::OpenAI {
            args.dimensions(self.dimensions as u32);
        }
        let request = args
            .build()
            .map_err(|e| PulsError::Embedding(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| PulsError::OpenAI(format!("Embedding API error: {}", e)))?;

        let mut data = response.data;
        data.sort_by_key(|e| e.index);

        let embeddings: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(PulsError::Embedding(format!(
                "Model {} returned {} dimensions, expected {}",
                self.model,
                bad.len(),
                self.dimensions
            )));
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        // Provider limit on inputs per request
        const BATCH_SIZE: usize = 100;
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(BATCH_SIZE) {
            let embeddings = self.request(batch.to_vec()).await?;
            if embeddings.len() != batch.len() {
                return Err(PulsError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }
            all_embeddings.extend(embeddings);
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    #[instrument(skip(self, text))]
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.request(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PulsError::Embedding("Empty embedding response".to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_id(&self) -> String {
        let name = match self.endpoint {
            Endpoint::OpenAI => "openai",
            Endpoint::Mistral => "mistral",
        };
        format!("{}:{}:{}", name, self.model, self.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_creation() {
        let embedder = OpenAIEmbedder::openai("", 1536).unwrap();
        assert_eq!(embedder.dimensions(), 1536);
        assert_eq!(embedder.provider_id(), "openai:text-embedding-3-small:1536");

        let embedder = OpenAIEmbedder::openai("text-embedding-3-large", 3072).unwrap();
        assert_eq!(embedder.dimensions(), 3072);
        assert_eq!(embedder.provider_id(), "openai:text-embedding-3-large:3072");
    }
}
