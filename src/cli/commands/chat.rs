//! Interactive question session.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::rag::{OpenAIGenerator, RagEngine, RagResponse};
use chrono::{DateTime, Utc};
use console::style;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One answered question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub answer: String,
    pub num_sources: usize,
}

/// Run the interactive chat command.
pub async fn run_chat(
    model: Option<String>,
    k: Option<usize>,
    save_history: Option<PathBuf>,
    settings: Settings,
) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let mut generation = settings.generation.clone();
    if let Some(model) = model {
        generation.model = model;
    }
    let generator = Arc::new(OpenAIGenerator::from_settings(&generation)?);

    let orchestrator = Orchestrator::new(settings)?;
    let Some(stats) = orchestrator.try_load_index(None)? else {
        Output::warning("No index found. Run 'puls index <events.json>' first.");
        return Ok(());
    };

    let mut session = ChatSession::new(orchestrator.rag_engine(generator), k);

    println!("\n{}", style("Puls Chat").bold().cyan());
    println!(
        "{}",
        style(format!("{} events indexed ({})", stats.vector_count, stats.provider)).dim()
    );
    println!(
        "{}\n",
        style("Ask about events, or type 'help' for commands and 'exit' to quit.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("Vous:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        match input.to_lowercase().as_str() {
            "" => continue,
            "exit" | "quit" => {
                Output::info("Au revoir !");
                break;
            }
            "help" => {
                print_help();
                continue;
            }
            "clear" => {
                session.clear();
                Output::info("History cleared.");
                continue;
            }
            "history" => {
                print_history(session.history());
                continue;
            }
            "stats" => {
                match orchestrator.stats()? {
                    Some(stats) => Output::stats(&stats),
                    None => Output::warning("No index loaded."),
                }
                continue;
            }
            _ => {}
        }

        let spinner = Output::spinner("Searching events...");
        let result = session.ask(input).await;
        spinner.finish_and_clear();

        match result {
            Ok(response) => {
                println!("\n{} {}\n", style("Puls:").cyan().bold(), response.answer);
                for source in &response.sources {
                    Output::source(source);
                }
                println!();
            }
            Err(e) => Output::error(&format!("Error: {}", e)),
        }
    }

    if let Some(path) = save_history {
        session.save_history(&path)?;
        Output::success(&format!(
            "Saved {} exchanges to {}",
            session.history().len(),
            path.display()
        ));
    }

    Ok(())
}

fn print_help() {
    Output::header("Commands");
    Output::kv("help", "show this message");
    Output::kv("history", "list the questions asked so far");
    Output::kv("stats", "show index statistics");
    Output::kv("clear", "forget the session history");
    Output::kv("exit", "leave the session");
    println!();
}

fn print_history(history: &[HistoryEntry]) {
    if history.is_empty() {
        Output::info("No questions yet.");
        return;
    }
    for entry in history {
        Output::list_item(&format!(
            "[{}] {} ({} sources)",
            entry.timestamp.format("%H:%M:%S"),
            entry.question,
            entry.num_sources
        ));
    }
}

/// Question session over the answer engine.
struct ChatSession {
    engine: RagEngine,
    k: Option<usize>,
    history: Vec<HistoryEntry>,
}

impl ChatSession {
    fn new(engine: RagEngine, k: Option<usize>) -> Self {
        Self {
            engine,
            k,
            history: Vec::new(),
        }
    }

    async fn ask(&mut self, question: &str) -> Result<RagResponse> {
        let response = self.engine.ask(question, self.k).await?;
        self.history.push(HistoryEntry {
            timestamp: Utc::now(),
            question: question.to_string(),
            answer: response.answer.clone(),
            num_sources: response.num_sources,
        });
        Ok(response)
    }

    fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    fn clear(&mut self) {
        self.history.clear();
    }

    fn save_history(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self.history)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingProvider, EmbeddingSettings, Prompts};
    use crate::embedding::create_embedder;
    use crate::orchestrator::RebuildDocument;
    use crate::rag::{Generator, NO_MATCH_ANSWER};
    use async_trait::async_trait;

    struct FixedGenerator;

    #[async_trait]
    impl Generator for FixedGenerator {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Ok("Voici les événements.".to_string())
        }
    }

    async fn session(dir: &Path) -> ChatSession {
        let mut settings = Settings::default();
        settings.embedding = EmbeddingSettings::for_provider(EmbeddingProvider::Hashing);
        settings.index.path = dir.join("index").to_string_lossy().to_string();
        let embedder = create_embedder(&settings.embedding).unwrap();
        let orchestrator =
            Orchestrator::with_components(settings, Prompts::default(), embedder).unwrap();

        let mut metadata = crate::chunking::ChunkMetadata::default();
        metadata.title = "Festival de cinéma".to_string();
        metadata.date_start = Some("2024-09-20".to_string());
        orchestrator
            .rebuild(
                vec![RebuildDocument {
                    text: "Festival de cinéma en plein air".to_string(),
                    metadata,
                }],
                None,
                None,
            )
            .await
            .unwrap();

        ChatSession::new(orchestrator.rag_engine(Arc::new(FixedGenerator)), Some(3))
    }

    #[tokio::test]
    async fn test_history_is_recorded_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path()).await;

        session.ask("festival de cinéma").await.unwrap();
        session.ask("cinéma en 2019").await.unwrap();

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].answer, "Voici les événements.");
        assert_eq!(history[0].num_sources, 1);
        assert_eq!(history[1].answer, NO_MATCH_ANSWER);
        assert_eq!(history[1].num_sources, 0);

        let path = dir.path().join("out").join("history.json");
        session.save_history(&path).unwrap();
        let saved: Vec<HistoryEntry> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].question, "cinéma en 2019");

        session.clear();
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_failed_question_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path()).await;

        assert!(session.ask("   ").await.is_err());
        assert!(session.history().is_empty());
    }
}
