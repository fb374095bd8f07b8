//! Composition of an event record into a single embeddable text body.
//!
//! Field order is fixed: title, date (readable + year tokens + raw ISO),
//! location, category, tags, then the description last since it is the only
//! unbounded field.

use crate::events::EventRecord;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

const MONTHS_FR: [&str; 12] = [
    "janvier", "février", "mars", "avril", "mai", "juin", "juillet", "août",
    "septembre", "octobre", "novembre", "décembre",
];

/// Parse an ISO 8601 date or timestamp into its calendar date.
///
/// Timestamps with an offset keep the date as written (no conversion to UTC).
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local().date());
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Human-readable French date, e.g. `15 novembre 2025`.
///
/// Unparseable input is returned unchanged.
pub fn format_date_fr(value: &str) -> String {
    match parse_iso_date(value) {
        Some(date) => format!(
            "{} {} {}",
            date.day(),
            MONTHS_FR[date.month0() as usize],
            date.year()
        ),
        None => value.to_string(),
    }
}

/// Build the text body that gets chunked and embedded for an event.
pub fn compose_event_text(event: &EventRecord) -> String {
    let mut parts: Vec<String> = Vec::new();

    let title = event.title.trim();
    if !title.is_empty() {
        parts.push(format!("Événement: {}", title));
    }

    if let Some(date_start) = event.date_start.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        parts.push(format!("Date: {}", format_date_fr(date_start)));

        // Explicit year tokens give "events in 2024" queries something lexical to match.
        if let Some(date) = parse_iso_date(date_start) {
            parts.push(format!("Année: {}", date.year()));
            parts.push(format!("{}:", date.year()));
        }

        parts.push(format!("DateISO: {}", date_start));
    }

    let location: Vec<&str> = [event.location_city.trim(), event.location_name.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    if !location.is_empty() {
        parts.push(format!("Lieu: {}", location.join(" - ")));
    }

    let category = event.category.trim();
    if !category.is_empty() {
        parts.push(format!("Catégorie: {}", category));
    }

    let keywords = event.keywords.trim();
    if !keywords.is_empty() {
        parts.push(format!("Tags: {}", keywords));
    }

    let description = event.description.trim();
    if !description.is_empty() {
        parts.push(format!("\nDescription:\n{}", description));
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso_variants() {
        let expected = NaiveDate::from_ymd_opt(2025, 11, 15).unwrap();
        assert_eq!(parse_iso_date("2025-11-15"), Some(expected));
        assert_eq!(parse_iso_date("2025-11-15T20:30:00Z"), Some(expected));
        assert_eq!(parse_iso_date("2025-11-15T23:30:00-05:00"), Some(expected));
        assert_eq!(parse_iso_date("2025-11-15T20:30:00"), Some(expected));
        assert_eq!(parse_iso_date("not a date"), None);
        assert_eq!(parse_iso_date(""), None);
    }

    #[test]
    fn test_format_date_fr() {
        assert_eq!(format_date_fr("2025-08-03T10:00:00+02:00"), "3 août 2025");
        assert_eq!(format_date_fr("demain"), "demain");
    }

    #[test]
    fn test_compose_field_order() {
        let event = EventRecord {
            id: "e1".to_string(),
            title: "Concert de jazz".to_string(),
            description: "Un trio de jazz manouche.".to_string(),
            location_name: "Salle Pleyel".to_string(),
            location_city: "Paris".to_string(),
            date_start: Some("2024-06-21T20:00:00+02:00".to_string()),
            category: "Musique".to_string(),
            keywords: "jazz, live".to_string(),
            ..Default::default()
        };

        let text = compose_event_text(&event);
        let expected = "Événement: Concert de jazz\n\
                        Date: 21 juin 2024\n\
                        Année: 2024\n\
                        2024:\n\
                        DateISO: 2024-06-21T20:00:00+02:00\n\
                        Lieu: Paris - Salle Pleyel\n\
                        Catégorie: Musique\n\
                        Tags: jazz, live\n\
                        \n\
                        Description:\n\
                        Un trio de jazz manouche.";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_compose_unparseable_date_keeps_raw() {
        let mut event = EventRecord::new("e1", "Expo");
        event.date_start = Some("bientôt".to_string());

        let text = compose_event_text(&event);
        assert!(text.contains("Date: bientôt"));
        assert!(text.contains("DateISO: bientôt"));
        assert!(!text.contains("Année"));
    }

    #[test]
    fn test_compose_empty_record() {
        assert_eq!(compose_event_text(&EventRecord::new("e1", "  ")), "");
    }
}
