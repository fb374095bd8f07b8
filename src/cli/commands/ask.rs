//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::OpenAIGenerator;
use anyhow::Result;
use std::sync::Arc;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    k: Option<usize>,
    model: Option<String>,
    show_context: bool,
    settings: Settings,
) -> Result<()> {
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
    if orchestrator.try_load_index(None)?.is_none() {
        Output::warning("No index found. Run 'puls index <events.json>' first.");
        return Ok(());
    }

    let engine = orchestrator.rag_engine(generator);
    let spinner = Output::spinner("Searching events...");

    match engine.ask(question, k).await {
        Ok(response) => {
            spinner.finish_and_clear();

            println!("\n{}\n", response.answer);

            if !response.sources.is_empty() {
                Output::header("Sources");
                for source in &response.sources {
                    Output::source(source);
                }
            }

            if show_context && !response.context.is_empty() {
                Output::header("Context");
                println!("{}", response.context);
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
