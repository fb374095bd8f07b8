//! Query intent extraction.

use regex::Regex;
use serde::Serialize;

/// Signals extracted from a query before retrieval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryIntent {
    /// Explicit year (2000 to 2099) mentioned in the query.
    pub year: Option<i32>,
    /// The query asks for upcoming or near-term events.
    pub recency: bool,
}

/// Turns a query into intent signals.
pub trait IntentExtractor: Send + Sync {
    fn extract(&self, query: &str) -> QueryIntent;
}

/// Regex-based extractor: first standalone `20xx` token plus French and
/// English recency cues.
pub struct YearIntentExtractor {
    year: Regex,
    recency: Regex,
}

impl YearIntentExtractor {
    pub fn new() -> Self {
        let year = Regex::new(r"\b(20\d{2})\b").expect("Invalid regex");
        let recency = Regex::new(
            r"(?ix)
            \b(
                prochain(e|es|s)?
                | bientôt
                | à\ venir
                | aujourd'hui
                | demain
                | ce\ soir
                | cette\ semaine
                | ce\ week-end
                | ce\ mois
                | upcoming
                | tonight
                | this\ (week|weekend|month)
                | next
                | soon
            )\b",
        )
        .expect("Invalid regex");

        Self { year, recency }
    }
}

impl Default for YearIntentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentExtractor for YearIntentExtractor {
    fn extract(&self, query: &str) -> QueryIntent {
        let year = self
            .year
            .captures(query)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());

        QueryIntent {
            year,
            recency: self.recency.is_match(query),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_detection() {
        let extractor = YearIntentExtractor::new();
        assert_eq!(extractor.extract("concerts en 2024 à Lyon").year, Some(2024));
        assert_eq!(extractor.extract("festival 2099").year, Some(2099));
        assert_eq!(extractor.extract("expositions").year, None);
    }

    #[test]
    fn test_year_must_be_standalone_and_in_range() {
        let extractor = YearIntentExtractor::new();
        assert_eq!(extractor.extract("ticket 120245").year, None);
        assert_eq!(extractor.extract("en 1999").year, None);
        assert_eq!(extractor.extract("salle 2100").year, None);
    }

    #[test]
    fn test_first_year_wins() {
        let extractor = YearIntentExtractor::new();
        assert_eq!(extractor.extract("entre 2023 et 2025").year, Some(2023));
    }

    #[test]
    fn test_recency_cues() {
        let extractor = YearIntentExtractor::new();
        assert!(extractor.extract("Quels concerts ce week-end ?").recency);
        assert!(extractor.extract("les prochaines expositions").recency);
        assert!(extractor.extract("Upcoming jazz shows").recency);
        assert!(!extractor.extract("concerts de jazz en 2023").recency);
    }
}
