//! CLI output formatting utilities.

use crate::rag::Source;
use crate::vector_store::{IndexStats, SearchResult};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print a raw search result.
    pub fn search_result(rank: usize, result: &SearchResult) {
        let meta = &result.document.metadata;
        let place = [meta.location_city.as_str(), meta.location_name.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" - ");

        println!(
            "\n{} {} {} (distance: {:.3})",
            style(format!("{}.", rank)).green(),
            style(&meta.title).bold(),
            style(meta.date_start.as_deref().unwrap_or("")).cyan(),
            result.score
        );
        if !place.is_empty() {
            println!("   {}", place);
        }
        println!("   {}", content_preview(&result.document.text, 200));
        if !meta.url.is_empty() {
            println!("   {}", style(&meta.url).dim());
        }
    }

    /// Print an answer source.
    pub fn source(source: &Source) {
        println!(
            "  {} {} ({}, {}) {}",
            style("*").cyan(),
            style(&source.title).bold(),
            source.city,
            source.date,
            style(format!("distance {:.3}", source.score)).dim()
        );
        println!("    {}", style(&source.url).dim());
    }

    /// Print index statistics.
    pub fn stats(stats: &IndexStats) {
        Self::kv("Status", &stats.status.to_string());
        Self::kv("Vectors", &stats.vector_count.to_string());
        Self::kv("Provider", &stats.provider);
        Self::kv("Dimensions", &stats.dimensions.to_string());
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Single-line preview, truncated on a character boundary.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
