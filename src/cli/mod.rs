//! CLI module for Puls.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Puls - answers about cultural events, grounded in a local index
///
/// Builds a vector index over cleaned event records and answers questions
/// with sources, from the command line or over HTTP.
#[derive(Parser, Debug)]
#[command(name = "puls")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Index directory (overrides config and PULS_INDEX_PATH)
    #[arg(long, global = true)]
    pub index: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the index from a cleaned events JSON file
    Index {
        /// Path to the events file (JSON array of event records)
        events: PathBuf,
    },

    /// Ask a question and get an answer with sources
    Ask {
        /// The question to ask
        question: String,

        /// Number of events to retrieve
        #[arg(short, long)]
        k: Option<usize>,

        /// LLM model to use for response generation
        #[arg(short, long)]
        model: Option<String>,

        /// Also print the context sent to the model
        #[arg(long)]
        show_context: bool,
    },

    /// Search the index without generating an answer
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Only events in this city
        #[arg(long)]
        city: Option<String>,

        /// Only events in this category
        #[arg(long)]
        category: Option<String>,

        /// Maximum cosine distance (0.0 identical, 2.0 opposite)
        #[arg(long)]
        max_distance: Option<f32>,
    },

    /// Start an interactive question session
    Chat {
        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Number of events to retrieve per question
        #[arg(short, long)]
        k: Option<usize>,

        /// Save the session history to this JSON file on exit
        #[arg(long)]
        save_history: Option<PathBuf>,
    },

    /// Show index statistics
    Stats,

    /// Start HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_filters() {
        let cli = Cli::parse_from([
            "puls", "search", "jazz", "--city", "Lyon", "--max-distance", "0.6", "-l", "3",
        ]);
        match cli.command {
            Commands::Search { query, limit, city, category, max_distance } => {
                assert_eq!(query, "jazz");
                assert_eq!(limit, 3);
                assert_eq!(city.as_deref(), Some("Lyon"));
                assert!(category.is_none());
                assert_eq!(max_distance, Some(0.6));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["puls", "-vv", "stats", "--index", "/tmp/idx"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.index, Some(PathBuf::from("/tmp/idx")));
        assert!(matches!(cli.command, Commands::Stats));
    }
}
