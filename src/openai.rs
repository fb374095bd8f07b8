//! OpenAI-compatible client configuration with sensible defaults.

use crate::error::{PulsError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Base URL of Mistral's OpenAI-compatible API.
pub const MISTRAL_API_BASE: &str = "https://api.mistral.ai/v1";

/// An API endpoint and the environment variable holding its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    OpenAI,
    Mistral,
}

impl Endpoint {
    /// Parse a provider name as used in the settings file.
    pub fn from_provider(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Ok(Endpoint::OpenAI),
            "mistral" => Ok(Endpoint::Mistral),
            other => Err(PulsError::Config(format!("Unknown API provider: {}", other))),
        }
    }

    pub fn api_key_var(&self) -> &'static str {
        match self {
            Endpoint::OpenAI => "OPENAI_API_KEY",
            Endpoint::Mistral => "MISTRAL_API_KEY",
        }
    }

    fn config(&self) -> Result<OpenAIConfig> {
        match self {
            // async-openai reads OPENAI_API_KEY itself.
            Endpoint::OpenAI => Ok(OpenAIConfig::default()),
            Endpoint::Mistral => {
                let key = std::env::var(self.api_key_var()).map_err(|_| {
                    PulsError::Config(format!("{} is not set", self.api_key_var()))
                })?;
                Ok(OpenAIConfig::new()
                    .with_api_base(MISTRAL_API_BASE)
                    .with_api_key(key))
            }
        }
    }
}

/// Create an OpenAI client with the default timeout.
pub fn create_client() -> Result<Client<OpenAIConfig>> {
    create_client_for(Endpoint::OpenAI)
}

/// Create a client for the given endpoint with the default timeout.
pub fn create_client_for(endpoint: Endpoint) -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(endpoint, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a client for the given endpoint with a custom timeout.
pub fn create_client_with_timeout(
    endpoint: Endpoint,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Client::with_config(endpoint.config()?).with_http_client(http_client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_provider() {
        assert_eq!(Endpoint::from_provider("OpenAI").unwrap(), Endpoint::OpenAI);
        assert_eq!(Endpoint::from_provider("mistral").unwrap(), Endpoint::Mistral);
        assert!(Endpoint::from_provider("cohere").is_err());
        assert_eq!(Endpoint::Mistral.api_key_var(), "MISTRAL_API_KEY");
    }

    #[test]
    fn test_openai_client_builds_without_key() {
        assert!(create_client().is_ok());
    }
}
