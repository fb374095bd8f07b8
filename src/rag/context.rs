//! Context formatting for answer generation.

use crate::chunking::format_date_fr;
use crate::vector_store::SearchResult;
use serde::{Deserialize, Serialize};

/// Rendered in place of any absent field.
pub const MISSING: &str = "non disponible";

/// Separates event blocks in the prompt context.
pub const BLOCK_DELIMITER: &str = "\n\n---\n\n";

/// A source returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub city: String,
    pub date: String,
    pub url: String,
    /// Cosine distance (lower is better).
    pub score: f32,
}

impl From<&SearchResult> for Source {
    fn from(result: &SearchResult) -> Self {
        let meta = &result.document.metadata;
        Self {
            title: or_missing(&meta.title),
            city: or_missing(&meta.location_city),
            date: meta
                .date_start
                .as_deref()
                .map(or_missing)
                .unwrap_or_else(|| MISSING.to_string()),
            url: or_missing(&meta.url),
            score: result.score,
        }
    }
}

/// Sources for a set of results, in the same order.
pub fn sources(results: &[SearchResult]) -> Vec<Source> {
    results.iter().map(Source::from).collect()
}

/// Renders results as fixed-field blocks.
#[derive(Debug, Clone)]
pub struct ContextFormatter {
    description_chars: usize,
}

impl ContextFormatter {
    pub fn new() -> Self {
        Self {
            description_chars: 300,
        }
    }

    /// Set the number of description characters kept per block.
    pub fn with_description_chars(mut self, description_chars: usize) -> Self {
        self.description_chars = description_chars;
        self
    }

    /// Format results for the prompt. Empty input gives an empty string.
    pub fn format(&self, results: &[SearchResult]) -> String {
        results
            .iter()
            .enumerate()
            .map(|(i, result)| self.block(i + 1, result))
            .collect::<Vec<_>>()
            .join(BLOCK_DELIMITER)
    }

    fn block(&self, position: usize, result: &SearchResult) -> String {
        let meta = &result.document.metadata;

        let date = meta
            .date_start
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(format_date_fr)
            .unwrap_or_else(|| MISSING.to_string());

        let venue: Vec<&str> = [meta.location_city.trim(), meta.location_name.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        let venue = if venue.is_empty() {
            MISSING.to_string()
        } else {
            venue.join(" - ")
        };

        format!(
            "Événement {} (distance: {:.3})\n\
             Titre: {}\n\
             Date: {}\n\
             Lieu: {}\n\
             Catégorie: {}\n\
             Description: {}\n\
             URL: {}",
            position,
            result.score,
            or_missing(&meta.title),
            date,
            venue,
            or_missing(&meta.category),
            or_missing(&truncate(&result.document.text, self.description_chars)),
            or_missing(&meta.url),
        )
    }
}

impl Default for ContextFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn or_missing(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        MISSING.to_string()
    } else {
        value.to_string()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}
