//! CLI entry point for feedcache.
//!
//! This binary provides the `feedcache` command with subcommands to read,
//! replace, and clear the cached feed snapshot, and to inspect the store.

mod cli;
mod config;

use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use feedcache_store::{FeedImageRecord, SqliteFeedStore};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::config::CliConfig;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // .env is optional.
    let _ = dotenvy::dotenv();

    let mut config = CliConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.store.path = db;
    }

    init_tracing(&config.log_level);
    debug!(?config, "configuration loaded");

    let store = open_store(&config)?;

    match cli.command {
        Commands::Retrieve => cmd_retrieve(&store).await,
        Commands::Insert { input, timestamp } => {
            cmd_insert(&store, &input, timestamp.unwrap_or_else(Utc::now)).await
        }
        Commands::Delete => cmd_delete(&store).await,
        Commands::Status => cmd_status(&store).await,
    }
}

fn open_store(config: &CliConfig) -> Result<SqliteFeedStore> {
    if let Some(parent) = config.store.path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create data directory {}", parent.display()))?;
        }
    }

    SqliteFeedStore::from_config(&config.store)
        .with_context(|| format!("failed to open store {}", config.store.path.display()))
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn cmd_retrieve(store: &SqliteFeedStore) -> Result<()> {
    match store.retrieve().await.context("failed to retrieve cached feed")? {
        Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        None => println!("empty"),
    }
    Ok(())
}

async fn cmd_insert(
    store: &SqliteFeedStore,
    input: &Path,
    timestamp: chrono::DateTime<Utc>,
) -> Result<()> {
    let images = read_images(input)?;
    let count = images.len();

    store
        .insert(images, timestamp)
        .await
        .context("failed to insert feed")?;

    info!(images = count, %timestamp, "feed cached");
    println!("cached {count} image(s) at {}", timestamp.to_rfc3339());
    Ok(())
}

async fn cmd_delete(store: &SqliteFeedStore) -> Result<()> {
    store.delete().await.context("failed to delete cached feed")?;
    println!("cache cleared");
    Ok(())
}

async fn cmd_status(store: &SqliteFeedStore) -> Result<()> {
    let status = store.status().await.context("failed to read store status")?;

    println!();
    println!("  feedcache status");
    println!("  ----------------");
    println!("  Store:            {}", status.path.display());
    println!("  Schema:           {} (v{})", status.schema, status.schema_version);
    match status.cached_at {
        Some(at) => println!(
            "  Cached feed:      {} image(s) at {}",
            status.image_count,
            at.to_rfc3339()
        ),
        None => println!("  Cached feed:      EMPTY"),
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

/// Read a JSON array of images from `input`, or stdin when it is `-`.
fn read_images(input: &Path) -> Result<Vec<FeedImageRecord>> {
    let raw = if input == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read images from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("failed to read {}", input.display()))?
    };

    parse_images(&raw)
}

fn parse_images(raw: &str) -> Result<Vec<FeedImageRecord>> {
    serde_json::from_str(raw).context("expected a JSON array of {id, description, location, url}")
}
