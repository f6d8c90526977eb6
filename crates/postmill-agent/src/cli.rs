//! Command-line surface of the `postmill` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use postmill_common::ContentMode;

#[derive(Parser, Debug)]
#[command(name = "postmill", version)]
#[command(about = "Ingest article listings and detail pages into the article store")]
pub struct Cli {
    /// Configuration file. Defaults to ./postmill.toml when present.
    #[arg(long, global = true, value_name = "FILE", env = "POSTMILL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Save every article of a listing payload (JSON array of entries).
    Batch {
        #[arg(value_name = "FILE")]
        listing: PathBuf,
    },

    /// Parse one detail page and merge what it adds.
    Detail {
        link: String,

        /// Use a saved page instead of fetching the link.
        #[arg(long, value_name = "FILE")]
        document: Option<PathBuf>,

        /// Persist the article body.
        #[arg(long)]
        save_content: bool,

        /// Body rendition: html or text.
        #[arg(long, value_name = "MODE")]
        content_mode: Option<ContentMode>,
    },

    /// Overwrite-merge article records (one JSON object or an array).
    Upsert {
        #[arg(value_name = "FILE")]
        records: PathBuf,
    },
}
