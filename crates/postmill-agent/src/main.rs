//! Postmill: article ingestion for a content-publishing platform.
//! Entry point for the `postmill` binary.

mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use postmill_common::Config;
use postmill_db::MemoryStore;
use postmill_ingestion::history::{MemoryPublishHistory, NoQueue};
use postmill_ingestion::models::{ArticleListingEntry, ArticleRecord, OneOrMany};
use postmill_ingestion::sources::HttpFetcher;
use postmill_ingestion::IngestionPipeline;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("postmill=debug,info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Postmill {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::load_or_default()?,
    };

    let store = Arc::new(MemoryStore::new());
    let history = Arc::new(MemoryPublishHistory::new());
    let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);

    match cli.command {
        Command::Batch { listing } => {
            let entries: Vec<ArticleListingEntry> = read_json(&listing)?;
            let pipeline = IngestionPipeline::new(
                store.clone(),
                fetcher,
                history.clone(),
                Arc::new(NoQueue),
                config.ingestion,
            );
            let report = pipeline.ingest_batch_report(&entries).await;
            print_json(&report)?;
            for record in history.records().await {
                info!(biz = %record.biz, articles = record.article_ids.len(), "publish recorded");
            }
        }
        Command::Detail { link, document, save_content, content_mode } => {
            if save_content {
                config.ingestion.save_post_content = true;
            }
            if let Some(mode) = content_mode {
                config.ingestion.content_mode = mode;
            }
            let prefetched = document
                .as_deref()
                .map(|path| {
                    std::fs::read_to_string(path)
                        .with_context(|| format!("failed to read {}", path.display()))
                })
                .transpose()?;

            let pipeline = IngestionPipeline::new(
                store.clone(),
                fetcher,
                history,
                Arc::new(NoQueue),
                config.ingestion,
            );
            let outcome = pipeline.ingest_detail(&link, prefetched.as_deref()).await?;
            print_json(&outcome)?;
            print_json(&store.articles().await)?;
        }
        Command::Upsert { records } => {
            let records: OneOrMany<ArticleRecord> = read_json(&records)?;
            let pipeline = IngestionPipeline::new(
                store.clone(),
                fetcher,
                history,
                Arc::new(NoQueue),
                config.ingestion,
            );
            let saved = pipeline.upsert(records).await?;
            print_json(&saved)?;
        }
    }

    let stats = store.stats();
    info!(
        article_reads = stats.article_reads,
        article_writes = stats.article_writes,
        profile_reads = stats.profile_reads,
        profile_writes = stats.profile_writes,
        "store activity"
    );
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
