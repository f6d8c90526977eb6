//! Detail page fetchers.

pub mod http;

use async_trait::async_trait;

pub use http::HttpFetcher;

/// Produces the raw detail document for an article link.
///
/// Retry, backoff and rate limiting belong to implementations.
#[async_trait]
pub trait DetailFetcher: Send + Sync {
    async fn fetch(&self, link: &str) -> anyhow::Result<String>;
}
