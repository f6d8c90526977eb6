//! Errors surfaced by the ingestion pipeline.

use postmill_db::DbError;
use thiserror::Error;

use crate::cache::CacheError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("store error: {0}")]
    Store(#[from] DbError),

    #[error("profile lookup failed: {0}")]
    Profile(#[from] CacheError),

    #[error("fetch failed for {link}: {source}")]
    Fetch {
        link: String,
        source: anyhow::Error,
    },

    #[error("upsert returned {got} records for {expected} inputs")]
    Cardinality { expected: usize, got: usize },
}
