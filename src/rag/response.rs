//! Grounded answer generation.

use super::context::{sources, ContextFormatter, Source};
use super::retriever::{RetrievalOutcome, Retriever};
use crate::chunking::format_date_fr;
use crate::config::{GenerationSettings, Prompts};
use crate::error::{PulsError, Result};
use crate::openai::{create_client_for, Endpoint};
use crate::vector_store::ActiveIndex;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Answer returned when retrieval finds nothing. Generation is skipped.
pub const NO_MATCH_ANSWER: &str = "Je n'ai trouvé aucun événement correspondant à votre recherche.";

/// Text generation capability.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete a system/user message pair into plain text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Chat completions over an OpenAI-compatible API.
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIGenerator {
    pub fn new(endpoint: Endpoint, model: &str, temperature: f32) -> Result<Self> {
        Ok(Self {
            client: create_client_for(endpoint)?,
            model: model.to_string(),
            temperature,
        })
    }

    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        Self::new(
            Endpoint::from_provider(&settings.provider)?,
            &settings.model,
            settings.temperature,
        )
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.to_string())
                .build()
                .map_err(|e| PulsError::Generation(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user.to_string())
                .build()
                .map_err(|e| PulsError::Generation(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| PulsError::Generation(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| PulsError::Generation(format!("Failed to generate response: {}", e)))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| PulsError::Generation("Empty response from LLM".to_string()))
    }
}

/// Answer with the sources it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    pub question: String,
    pub answer: String,
    /// One entry per context block, same order.
    pub sources: Vec<Source>,
    /// Context passed to the generator (empty for the no-match answer).
    pub context: String,
    pub num_sources: usize,
}

impl RagResponse {
    /// The sentinel response for a query without matching events.
    pub fn no_match(question: &str) -> Self {
        Self {
            question: question.to_string(),
            answer: NO_MATCH_ANSWER.to_string(),
            sources: Vec::new(),
            context: String::new(),
            num_sources: 0,
        }
    }

    pub fn is_no_match(&self) -> bool {
        self.sources.is_empty()
    }

    /// Format the response for display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.answer.clone();

        if !self.sources.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            for source in &self.sources {
                output.push_str(&format!(
                    "\n{} ({}, {}) distance {:.3}",
                    source.title, source.city, source.date, source.score
                ));
                output.push_str(&format!("\n  {}", source.url));
            }
        }

        output
    }
}

/// Retrieval plus generation over the active index.
pub struct RagEngine {
    index: Arc<ActiveIndex>,
    retriever: Retriever,
    formatter: ContextFormatter,
    generator: Arc<dyn Generator>,
    prompts: Prompts,
    default_k: usize,
}

impl RagEngine {
    pub fn new(index: Arc<ActiveIndex>, generator: Arc<dyn Generator>) -> Self {
        Self {
            index,
            retriever: Retriever::new(),
            formatter: ContextFormatter::new(),
            generator,
            prompts: Prompts::default(),
            default_k: 5,
        }
    }

    pub fn with_retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn with_formatter(mut self, formatter: ContextFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = k.max(1);
        self
    }

    pub fn index(&self) -> &Arc<ActiveIndex> {
        &self.index
    }

    /// Run retrieval only.
    pub async fn retrieve(&self, question: &str, k: Option<usize>) -> Result<RetrievalOutcome> {
        if question.trim().is_empty() {
            return Err(PulsError::EmptyQuery);
        }
        let index = self.index.get()?;
        self.retriever
            .retrieve(index.as_ref(), question, k.unwrap_or(self.default_k))
            .await
    }

    /// Answer a question from the active index.
    ///
    /// When nothing matches, the sentinel answer is returned and the
    /// generator is not called.
    #[instrument(skip(self), fields(question = %question))]
    pub async fn ask(&self, question: &str, k: Option<usize>) -> Result<RagResponse> {
        info!("Processing question: {}", question);

        let outcome = self.retrieve(question, k).await?;
        if outcome.is_empty() {
            info!("No matching events, returning sentinel answer");
            return Ok(RagResponse::no_match(question));
        }
        debug!(
            "Retrieved {} results (year {:?}, recency {})",
            outcome.len(),
            outcome.intent.year,
            outcome.intent.recency
        );

        let context = self.formatter.format(&outcome.results);

        let mut vars = HashMap::new();
        vars.insert("today".to_string(), today());
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context.clone());

        let system = self.prompts.render_with_custom(&self.prompts.rag.system, &vars);
        let user = self.prompts.render_with_custom(&self.prompts.rag.user, &vars);

        let answer = self
            .generator
            .complete(&system, &user)
            .await
            .map_err(|e| match e {
                PulsError::Generation(_) => e,
                other => PulsError::Generation(other.to_string()),
            })?;

        let sources = sources(&outcome.results);
        debug!("Generated response with {} sources", sources.len());

        Ok(RagResponse {
            question: question.to_string(),
            answer,
            num_sources: sources.len(),
            sources,
            context,
        })
    }
}

fn today() -> String {
    format_date_fr(&chrono::Local::now().date_naive().to_string())
}
