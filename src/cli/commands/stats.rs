//! Stats command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the stats command.
pub fn run_stats(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let path = orchestrator.index_path();

    Output::header("Index");
    Output::kv("Path", &path.display().to_string());

    match orchestrator.try_load_index(None)? {
        Some(stats) => Output::stats(&stats),
        None => Output::warning("No index found. Run 'puls index <events.json>' first."),
    }

    Ok(())
}
