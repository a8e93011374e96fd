//! # Warm Ranker CLI (`warm-ranker`)
//!
//! ## Usage
//!
//! ```bash
//! warm-ranker --config ./config/warm-ranker.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `warm-ranker init` | Create the vector index schema |
//! | `warm-ranker ingest <csv>` | Enrich, embed, and index a contact list |
//! | `warm-ranker rank <csv> --idea "<text>"` | Rank a contact list against an idea |
//! | `warm-ranker serve` | Start the HTTP API |
//!
//! Logs go to stderr (`RUST_LOG` overrides the default `info` filter), so
//! `rank --json` output can be piped.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use warm_ranker::config;
use warm_ranker::context::RankerContext;
use warm_ranker::pipeline::{ingest_csv, rank_csv, render_markdown_table};
use warm_ranker::server;

/// Warm Ranker: find the warmest leads in a contact list for an idea.
#[derive(Parser)]
#[command(
    name = "warm-ranker",
    about = "Rank a contact list by relevance to an idea",
    version,
    long_about = "Warm Ranker enriches each contact from their profile page, pre-filters \
    candidates by embedding similarity, and scores them with an LLM whose prompt refines \
    itself between rounds."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/warm-ranker.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vector index schema. Safe to run repeatedly.
    Init,

    /// Enrich, embed, and index a contact list without ranking it.
    Ingest {
        /// CSV file with a header row.
        csv: PathBuf,
    },

    /// Rank a contact list against an idea.
    Rank {
        /// CSV file with a header row.
        csv: PathBuf,

        /// The idea to find warm leads for.
        #[arg(long)]
        idea: String,

        /// Override `[ranking].iterations`.
        #[arg(long)]
        iterations: Option<usize>,

        /// Print JSON instead of a markdown table.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;
    let ctx = RankerContext::new(cfg)?;

    match cli.command {
        Commands::Init => {
            ctx.index().await?;
            println!("Index initialized successfully.");
        }
        Commands::Ingest { csv } => {
            let summary = ingest_csv(&ctx, &csv).await?;
            println!(
                "Indexed {} contacts ({} enriched, {} enrichment failures).",
                summary.candidates.len(),
                summary.enriched,
                summary.failed
            );
        }
        Commands::Rank {
            csv,
            idea,
            iterations,
            json,
        } => {
            let run = rank_csv(&ctx, &idea, &csv, iterations).await?;
            if let Some(reason) = &run.outcome.stopped_early {
                tracing::warn!(%reason, "ranking stopped before the last iteration");
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&run.ranked)?);
            } else {
                print!("{}", render_markdown_table(&run.ranked));
            }
        }
        Commands::Serve => {
            server::run_server(Arc::new(ctx)).await?;
        }
    }

    Ok(())
}
