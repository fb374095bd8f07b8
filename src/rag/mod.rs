//! RAG (Retrieval-Augmented Generation) for question answering with sources.
//!
//! A question goes through [`Retriever`] (year intent, oversampling,
//! post-filter, one fallback query), then [`ContextFormatter`], then a
//! [`Generator`]. Sources are rebuilt from the same retrieval outcome as
//! the context, so an answer can only cite what it was shown.

pub mod context;
pub mod intent;
mod response;
mod retriever;

pub use context::{ContextFormatter, Source};
pub use intent::{IntentExtractor, QueryIntent, YearIntentExtractor};
pub use response::{Generator, OpenAIGenerator, RagEngine, RagResponse, NO_MATCH_ANSWER};
pub use retriever::{fallback_query, RetrievalOutcome, Retriever};
