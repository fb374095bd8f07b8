//! Puls - answers about cultural events
//!
//! Builds a vector index over cleaned event records and answers questions
//! about them with a chat model, citing the events it used.
//!
//! # Architecture
//!
//! - `events` - Cleaned event records
//! - `chunking` - Event text composition and windowed chunking
//! - `embedding` - Embedding providers (OpenAI, Mistral, local hashing)
//! - `vector_store` - Flat cosine index, snapshots and the swappable active index
//! - `rag` - Year-aware retrieval, context formatting and answer generation
//! - `orchestrator` - Index builds, rebuilds and engine wiring
//! - `config` - Settings and prompt templates
//! - `cli` - Command line and HTTP surfaces
//!
//! # Example
//!
//! ```rust,no_run
//! use puls::config::Settings;
//! use puls::orchestrator::Orchestrator;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let report = orchestrator.index_file(Path::new("events.json"), None).await?;
//!     println!("Indexed {} chunks", report.chunks);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod events;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod vector_store;

pub use error::{PulsError, Result};
