//! postmill-ingestion: Article ingestion pipeline.
//! Covers:
//! - Listing expansion and canonical identity extraction (`identity`)
//! - Single-flight publisher profile lookups (`cache`)
//! - Detail document parsing and invalidation detection (`detail`)
//! - Merge policies over the document store (`repository`, `failure`)
//! - Fetch, publish-history and queue collaborators (`sources`, `history`)
//! - Bulk and deep ingestion entry points (`pipeline`)

pub mod cache;
pub mod detail;
pub mod error;
pub mod failure;
pub mod history;
pub mod identity;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod sources;

pub use cache::{CacheError, CoalescingCache, ProfileCache};
pub use error::IngestError;
pub use pipeline::{DeepOutcome, IngestReport, IngestionPipeline};
