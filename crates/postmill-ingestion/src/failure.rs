//! Terminal "unavailable" marking for removed or blocked articles.

use std::sync::Arc;

use postmill_db::{ArticleFields, ArticleId, DbError, DocumentStore};
use tracing::info;

#[derive(Clone)]
pub struct FailureMarker {
    store: Arc<dyn DocumentStore>,
}

impl FailureMarker {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Set `is_fail` on the article, creating it if needed. No other field is written.
    pub async fn mark_unavailable(&self, id: &ArticleId, reason: &str) -> Result<(), DbError> {
        let fields = ArticleFields { is_fail: Some(true), ..Default::default() };
        self.store.set_article(id, &fields, true).await?;
        info!(biz = %id.biz, mid = %id.mid, idx = %id.idx, reason, "article marked unavailable");
        Ok(())
    }
}
