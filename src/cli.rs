//! Command-line surface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cardingest", version)]
#[command(about = "Ingest trading-card image folders into object storage and a card catalog", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Which catalog backend to record cards in.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Record cards in a SQLite catalog database
    Db {
        /// Catalog database file (created if missing)
        database: PathBuf,
        /// Report file that one block per collection is appended to
        report: PathBuf,
        /// Input roots containing the group folders
        #[arg(required = true)]
        roots: Vec<PathBuf>,
    },
    /// Record cards in a pair of JSON files
    Json {
        /// JSON array of card records
        cards: PathBuf,
        /// JSON array of collection records
        collections: PathBuf,
        /// Report file that one block per collection is appended to
        report: PathBuf,
        /// Input roots containing the group folders
        #[arg(required = true)]
        roots: Vec<PathBuf>,
    },
}

impl Command {
    pub fn report(&self) -> &PathBuf {
        match self {
            Self::Db { report, .. } | Self::Json { report, .. } => report,
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        match self {
            Self::Db { roots, .. } | Self::Json { roots, .. } => roots,
        }
    }
}
