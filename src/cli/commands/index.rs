//! Index command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::path::Path;

/// Run the index command.
pub async fn run_index(events: &Path, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Index, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    Output::info(&format!(
        "Indexing {} with {}",
        events.display(),
        orchestrator.embedder().provider_id()
    ));

    let spinner = Output::spinner("Chunking and embedding events...");
    let result = orchestrator.index_file(events, None).await;
    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            Output::success(&format!(
                "Indexed {} chunks from {} events",
                report.chunks, report.events_chunked
            ));
            Output::kv("Events loaded", &report.events_loaded.to_string());
            if report.events_skipped > 0 {
                Output::warning(&format!(
                    "{} events skipped (no id or no text)",
                    report.events_skipped
                ));
            }
            if report.events_malformed > 0 {
                Output::warning(&format!(
                    "{} malformed records skipped",
                    report.events_malformed
                ));
            }
            Output::kv("Provider", &report.descriptor.embedding_provider);
            Output::kv("Index", &report.index_path.display().to_string());
        }
        Err(e) => {
            Output::error(&format!("Indexing failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
