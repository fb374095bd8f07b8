//! Pre-flight checks before expensive operations.
//!
//! Validates that the API keys the configured providers need are present
//! before starting operations that would otherwise fail midway.

use crate::config::{EmbeddingProvider, Settings};
use crate::error::{PulsError, Result};
use crate::openai::Endpoint;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Indexing embeds documents.
    Index,
    /// Searching embeds the query.
    Search,
    /// Asking embeds the query and calls the chat model.
    Ask,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    check_with(operation, settings, |key| std::env::var(key).ok())
}

fn check_with<F>(operation: Operation, settings: &Settings, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(endpoint) = embedding_endpoint(settings.embedding.provider) {
        check_api_key(endpoint, &lookup)?;
    }

    if let Operation::Ask = operation {
        check_api_key(Endpoint::from_provider(&settings.generation.provider)?, &lookup)?;
    }

    Ok(())
}

fn embedding_endpoint(provider: EmbeddingProvider) -> Option<Endpoint> {
    match provider {
        EmbeddingProvider::OpenAI => Some(Endpoint::OpenAI),
        EmbeddingProvider::Mistral => Some(Endpoint::Mistral),
        EmbeddingProvider::Hashing => None,
    }
}

/// Check that the endpoint's API key is configured.
fn check_api_key<F>(endpoint: Endpoint, lookup: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = endpoint.api_key_var();
    match lookup(var) {
        Some(key) if !key.trim().is_empty() => Ok(()),
        Some(_) => Err(PulsError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            var, var
        ))),
        None => Err(PulsError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            var, var
        ))),
    }
}
