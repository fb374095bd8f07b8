//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::vector_store::{MetadataFilter, VectorIndex};
use anyhow::Result;

/// Build the metadata filter for the optional CLI constraints.
fn build_filter(city: Option<String>, category: Option<String>) -> Option<MetadataFilter> {
    let mut filter = MetadataFilter::new();
    if let Some(city) = city {
        filter = filter.eq("location_city", city);
    }
    if let Some(category) = category {
        filter = filter.eq("category", category);
    }
    (!filter.is_empty()).then_some(filter)
}

/// Run the search command.
pub async fn run_search(
    query: &str,
    limit: usize,
    city: Option<String>,
    category: Option<String>,
    max_distance: Option<f32>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    if orchestrator.try_load_index(None)?.is_none() {
        Output::warning("No index found. Run 'puls index <events.json>' first.");
        return Ok(());
    }
    let index = orchestrator.active_index().get()?;
    let filter = build_filter(city, category);

    let spinner = Output::spinner("Searching...");
    let results = index
        .search(query, limit, filter.as_ref(), max_distance)
        .await;
    spinner.finish_and_clear();

    match results {
        Ok(results) => {
            if results.is_empty() {
                Output::warning("No results found matching your query.");
            } else {
                Output::success(&format!("Found {} results", results.len()));
                for (i, result) in results.iter().enumerate() {
                    Output::search_result(i + 1, result);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkMetadata;

    #[test]
    fn test_build_filter() {
        assert!(build_filter(None, None).is_none());

        let filter = build_filter(Some("Nantes".into()), Some("Musique".into())).unwrap();
        let mut meta = ChunkMetadata::default();
        meta.location_city = "Nantes".to_string();
        meta.category = "Musique".to_string();
        assert!(filter.matches(&meta).unwrap());

        meta.category = "Théâtre".to_string();
        assert!(!filter.matches(&meta).unwrap());
    }
}
