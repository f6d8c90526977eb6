//! Publish-history and work-queue collaborators.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::models::PublishRecord;

/// Records which articles were saved from each publish event.
#[async_trait]
pub trait PublishHistory: Send + Sync {
    async fn record(&self, records: &[PublishRecord]) -> anyhow::Result<()>;
}

/// Reports how much crawl work is still queued. Used for progress logging only.
#[async_trait]
pub trait QueueMonitor: Send + Sync {
    async fn depth(&self) -> anyhow::Result<usize>;
}

/// Publish history kept in memory.
#[derive(Debug, Default)]
pub struct MemoryPublishHistory {
    records: Mutex<Vec<PublishRecord>>,
}

impl MemoryPublishHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<PublishRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl PublishHistory for MemoryPublishHistory {
    async fn record(&self, records: &[PublishRecord]) -> anyhow::Result<()> {
        self.records.lock().await.extend_from_slice(records);
        Ok(())
    }
}

/// A queue monitor for processes that do not track a queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoQueue;

#[async_trait]
impl QueueMonitor for NoQueue {
    async fn depth(&self) -> anyhow::Result<usize> {
        Ok(0)
    }
}
