//! Error types for Puls.

use std::path::PathBuf;
use thiserror::Error;

/// Library-level error type for Puls operations.
#[derive(Error, Debug)]
pub enum PulsError {
    #[error("No valid chunks to index: {0}")]
    EmptyInput(String),

    #[error("Search query cannot be empty")]
    EmptyQuery,

    #[error("Index has not been built. Build or load an index first.")]
    NotBuilt,

    #[error("Index descriptor not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error(
        "Index was built with embedding provider '{stored}' but '{configured}' is configured. \
         Rebuild the index or switch providers."
    )]
    ProviderMismatch { stored: String, configured: String },

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl PulsError {
    /// Whether the error was caused by the caller's input or the state of the
    /// index rather than a failing backend.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PulsError::EmptyInput(_)
                | PulsError::EmptyQuery
                | PulsError::NotBuilt
                | PulsError::ConfigNotFound(_)
                | PulsError::ProviderMismatch { .. }
                | PulsError::InvalidInput(_)
        )
    }
}

/// Result type alias for Puls operations.
pub type Result<T> = std::result::Result<T, PulsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(PulsError::EmptyQuery.is_client_error());
        assert!(PulsError::NotBuilt.is_client_error());
        assert!(PulsError::ProviderMismatch {
            stored: "a".to_string(),
            configured: "b".to_string()
        }
        .is_client_error());
        assert!(!PulsError::Generation("timeout".to_string()).is_client_error());
        assert!(!PulsError::Retrieval("down".to_string()).is_client_error());
    }
}
