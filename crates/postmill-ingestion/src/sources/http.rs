//! reqwest-backed detail fetcher.

use std::time::Duration;

use async_trait::async_trait;
use postmill_common::{FetchConfig, PostmillError};
use reqwest::Client;
use tracing::{debug, instrument};

use super::DetailFetcher;

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, PostmillError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DetailFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, link: &str) -> anyhow::Result<String> {
        let resp = self.client.get(link).send().await.map_err(PostmillError::from)?;
        if !resp.status().is_success() {
            anyhow::bail!("detail fetch failed: HTTP {}", resp.status());
        }
        let body = resp.text().await.map_err(PostmillError::from)?;
        debug!(bytes = body.len(), "detail page fetched");
        Ok(body)
    }
}
