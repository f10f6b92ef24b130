//! CLI argument definitions for feedcache.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// feedcache -- inspect and modify a single-slot feed cache.
#[derive(Parser)]
#[command(
    name = "feedcache",
    version,
    about = "Inspect and modify a single-slot feed cache",
    long_about = "Reads and writes the one cached feed snapshot held in a feedcache \
                  SQLite store."
)]
pub struct Cli {
    /// TOML configuration file. Defaults to `feedcache.toml` when present.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Store file, overriding the configuration.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the cached snapshot as JSON, or `empty`.
    Retrieve,

    /// Replace the cached snapshot with images read from a JSON array.
    Insert {
        /// File holding the images, or `-` for stdin.
        input: PathBuf,

        /// Snapshot time (RFC 3339). Defaults to now.
        #[arg(long)]
        timestamp: Option<DateTime<Utc>>,
    },

    /// Clear the cached snapshot.
    Delete,

    /// Show store location, schema version and slot contents.
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_insert_with_timestamp() {
        let cli = Cli::try_parse_from([
            "feedcache",
            "--db",
            "/tmp/feed.sqlite",
            "insert",
            "images.json",
            "--timestamp",
            "2021-04-25T10:00:00Z",
        ])
        .unwrap();

        assert_eq!(cli.db, Some(PathBuf::from("/tmp/feed.sqlite")));
        match cli.command {
            Commands::Insert { input, timestamp } => {
                assert_eq!(input, PathBuf::from("images.json"));
                assert_eq!(
                    timestamp.map(|t| t.to_rfc3339()),
                    Some("2021-04-25T10:00:00+00:00".to_string())
                );
            }
            _ => panic!("expected insert"),
        }
    }

    #[test]
    fn rejects_malformed_timestamp() {
        let result = Cli::try_parse_from(["feedcache", "insert", "-", "--timestamp", "soon"]);
        assert!(result.is_err());
    }
}
