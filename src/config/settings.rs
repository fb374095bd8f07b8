//! Configuration settings for Puls.

use crate::chunking::ChunkingConfig;
use crate::error::{PulsError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.puls".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Embedding provider type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI embeddings API.
    #[default]
    OpenAI,
    /// Mistral embeddings through its OpenAI-compatible endpoint.
    Mistral,
    /// Local feature-hashing embedder, no network.
    Hashing,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(EmbeddingProvider::OpenAI),
            "mistral" => Ok(EmbeddingProvider::Mistral),
            "hashing" | "local" => Ok(EmbeddingProvider::Hashing),
            _ => Err(format!("Unknown embedding provider: {}", s)),
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::OpenAI => write!(f, "openai"),
            EmbeddingProvider::Mistral => write!(f, "mistral"),
            EmbeddingProvider::Hashing => write!(f, "hashing"),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai, mistral, hashing).
    pub provider: EmbeddingProvider,
    /// Embedding model. Empty means the provider's default.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAI,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

impl EmbeddingSettings {
    /// Settings for a provider with that provider's default model and size.
    pub fn for_provider(provider: EmbeddingProvider) -> Self {
        match provider {
            EmbeddingProvider::OpenAI => Self::default(),
            EmbeddingProvider::Mistral => Self {
                provider,
                model: "mistral-embed".to_string(),
                dimensions: 1024,
            },
            EmbeddingProvider::Hashing => Self {
                provider,
                model: String::new(),
                dimensions: 384,
            },
        }
    }
}

/// Text chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum chunk length in characters.
    pub max_chars: usize,
    /// Characters shared between consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_chars: 500,
            overlap: 50,
        }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(settings: &ChunkingSettings) -> Self {
        ChunkingConfig {
            max_chars: settings.max_chars,
            overlap: settings.overlap,
        }
    }
}

/// Persisted index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Directory holding the index snapshot.
    pub path: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            path: "~/.puls/index".to_string(),
        }
    }
}

/// Query-time retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of results returned by default.
    pub k: usize,
    /// Results with a cosine distance above this are dropped.
    pub max_distance: Option<f32>,
    /// Oversampling multiplier applied to `k` when a year is detected.
    pub year_oversample: usize,
    /// Minimum raw candidates fetched when a year is detected.
    pub year_min_candidates: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k: 5,
            max_distance: None,
            year_oversample: 10,
            year_min_candidates: 200,
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Chat provider (openai, mistral).
    pub provider: String,
    /// Chat model.
    pub model: String,
    pub temperature: f32,
    /// Description characters kept per context block.
    pub description_chars: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            description_chars: 300,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Environment overrides are applied after the file is read.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply `PULS_INDEX_PATH` / `PERSIST_PATH` and
    /// `PULS_EMBED_PROVIDER` / `EMBED_PROVIDER`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(k))
                .find(|v| !v.trim().is_empty())
        };

        if let Some(path) = first(&["PULS_INDEX_PATH", "PERSIST_PATH"]) {
            debug!("Index path overridden from environment: {}", path);
            self.index.path = path;
        }

        if let Some(provider) = first(&["PULS_EMBED_PROVIDER", "EMBED_PROVIDER"]) {
            let provider: EmbeddingProvider = provider.parse().map_err(PulsError::Config)?;
            if provider != self.embedding.provider {
                debug!("Embedding provider overridden from environment: {}", provider);
                self.embedding = EmbeddingSettings::for_provider(provider);
            }
        }

        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PulsError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("puls")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded index directory path.
    pub fn index_path(&self) -> PathBuf {
        Self::expand_path(&self.index.path)
    }

    /// Chunking configuration derived from these settings.
    pub fn chunking_config(&self) -> ChunkingConfig {
        ChunkingConfig::from(&self.chunking)
    }
}
