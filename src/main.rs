//! Puls CLI entry point.

use anyhow::Result;
use clap::Parser;
use puls::cli::{commands, Cli, Commands};
use puls::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("puls={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let config_path = cli.config.as_deref().map(PathBuf::from);
    let mut settings = Settings::load_from(config_path.as_ref())?;
    if let Some(index) = &cli.index {
        settings.index.path = index.to_string_lossy().to_string();
    }

    std::fs::create_dir_all(settings.data_dir())?;

    match &cli.command {
        Commands::Index { events } => {
            commands::run_index(events, settings).await?;
        }

        Commands::Ask {
            question,
            k,
            model,
            show_context,
        } => {
            commands::run_ask(question, *k, model.clone(), *show_context, settings).await?;
        }

        Commands::Search {
            query,
            limit,
            city,
            category,
            max_distance,
        } => {
            commands::run_search(
                query,
                *limit,
                city.clone(),
                category.clone(),
                *max_distance,
                settings,
            )
            .await?;
        }

        Commands::Chat {
            model,
            k,
            save_history,
        } => {
            commands::run_chat(model.clone(), *k, save_history.clone(), settings).await?;
        }

        Commands::Stats => {
            commands::run_stats(settings)?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, config_path)?;
        }
    }

    Ok(())
}
