//! Query-time retrieval: intent detection, oversampling, year post-filter
//! and a single fallback query.

use super::intent::{IntentExtractor, QueryIntent, YearIntentExtractor};
use crate::config::RetrievalSettings;
use crate::error::{PulsError, Result};
use crate::vector_store::{SearchResult, VectorIndex};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Candidates fetched when no year is detected.
const BASE_CANDIDATES: usize = 10;

/// Ranked results for one query, best first.
///
/// An empty outcome is the "no matching event" sentinel.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalOutcome {
    pub query: String,
    pub intent: QueryIntent,
    pub results: Vec<SearchResult>,
    /// Whether the reformulated year query was needed.
    pub used_fallback: bool,
}

impl RetrievalOutcome {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

/// Retrieval pipeline over any [`VectorIndex`].
pub struct Retriever {
    intent: Arc<dyn IntentExtractor>,
    year_oversample: usize,
    year_min_candidates: usize,
    max_distance: Option<f32>,
}

impl Retriever {
    pub fn new() -> Self {
        Self::from_settings(&RetrievalSettings::default())
    }

    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self {
            intent: Arc::new(YearIntentExtractor::new()),
            year_oversample: settings.year_oversample.max(1),
            year_min_candidates: settings.year_min_candidates,
            max_distance: settings.max_distance,
        }
    }

    /// Replace the intent extractor.
    pub fn with_intent_extractor(mut self, extractor: Arc<dyn IntentExtractor>) -> Self {
        self.intent = extractor;
        self
    }

    /// Set the maximum cosine distance kept in outcomes.
    pub fn with_max_distance(mut self, max_distance: Option<f32>) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Raw candidates requested from the index.
    pub fn candidate_count(&self, k: usize, intent: &QueryIntent) -> usize {
        match intent.year {
            Some(_) => k
                .saturating_mul(self.year_oversample)
                .max(self.year_min_candidates),
            None => k.max(BASE_CANDIDATES),
        }
    }

    /// Retrieve at most `k` results for `query`.
    ///
    /// Structural errors (blank query, unbuilt index) are returned as-is;
    /// any other failure of the index is wrapped in `Retrieval`.
    #[instrument(skip(self, index))]
    pub async fn retrieve(
        &self,
        index: &dyn VectorIndex,
        query: &str,
        k: usize,
    ) -> Result<RetrievalOutcome> {
        if query.trim().is_empty() {
            return Err(PulsError::EmptyQuery);
        }
        if k == 0 {
            return Err(PulsError::InvalidInput("k must be at least 1".to_string()));
        }

        let intent = self.intent.extract(query);
        let fetch = self.candidate_count(k, &intent);
        debug!("Intent {:?}, fetching {} candidates", intent, fetch);

        let mut results = search(index, query, fetch).await?;
        let mut used_fallback = false;

        if let Some(year) = intent.year {
            results = keep_year(results, year);

            if results.is_empty() {
                let fallback = fallback_query(year);
                info!("No {} candidates for query, retrying with '{}'", year, fallback);
                used_fallback = true;
                results = keep_year(search(index, &fallback, fetch).await?, year);
            }
        }

        if let Some(max) = self.max_distance {
            results.retain(|r| r.score <= max);
        }
        results.truncate(k);

        info!("Retrieved {} results", results.len());
        Ok(RetrievalOutcome {
            query: query.to_string(),
            intent,
            results,
            used_fallback,
        })
    }
}

impl Default for Retriever {
    fn default() -> Self {
        Self::new()
    }
}

/// Neutral query used when a year-filtered search finds nothing.
pub fn fallback_query(year: i32) -> String {
    format!("événement {}", year)
}

async fn search(index: &dyn VectorIndex, query: &str, k: usize) -> Result<Vec<SearchResult>> {
    index.search(query, k, None, None).await.map_err(|e| {
        if e.is_client_error() {
            e
        } else {
            PulsError::Retrieval(e.to_string())
        }
    })
}

fn keep_year(results: Vec<SearchResult>, year: i32) -> Vec<SearchResult> {
    results
        .into_iter()
        .filter(|r| r.document.metadata.year == Some(year))
        .collect()
}
