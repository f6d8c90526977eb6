//! Merge policies over the document store.
//!
//! Two policies exist and are kept as separately named operations:
//! - overwrite: every named field is written, the record is created if absent
//! - fill-gaps: the write happens only when the existing record is missing
//!   one of its completeness fields; complete records are left untouched

use std::sync::Arc;

use postmill_common::ContentMode;
use postmill_db::{
    Article, ArticleFields, ArticleId, DbError, DocumentStore, ProfileFields, PublisherProfile,
};
use tracing::debug;

/// Ingestion-side view of the document store.
#[derive(Clone)]
pub struct IngestionRepository {
    store: Arc<dyn DocumentStore>,
}

impl IngestionRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self { Self { store } }

    // ── Article operations ───────────────────────────────────────────────────

    pub async fn find_article(&self, id: &ArticleId) -> Result<Option<Article>, DbError> {
        self.store.find_article(id).await
    }

    /// Write every named field, creating the article if absent.
    pub async fn overwrite_article(
        &self,
        id: &ArticleId,
        fields: &ArticleFields,
    ) -> Result<Article, DbError> {
        self.store
            .set_article(id, fields, true)
            .await?
            .ok_or_else(|| DbError::NotFound(id.to_string()))
    }

    /// Write `fields` only if `existing` is absent or lacks title, link or
    /// publisher identifier. Returns the written record, or `None` when skipped.
    pub async fn fill_article_gaps(
        &self,
        id: &ArticleId,
        existing: Option<&Article>,
        fields: &ArticleFields,
    ) -> Result<Option<Article>, DbError> {
        if existing.is_some_and(Article::has_basic_fields) {
            debug!(%id, "article already complete, skipping");
            return Ok(None);
        }
        if fields.is_empty() {
            return Ok(None);
        }
        self.store.set_article(id, fields, true).await
    }

    /// Store the body in the configured rendition unless the existing record
    /// already carries it.
    pub async fn save_content(
        &self,
        id: &ArticleId,
        existing: Option<&Article>,
        mode: ContentMode,
        body: &str,
    ) -> Result<Option<Article>, DbError> {
        if existing.is_some_and(|a| has_content(a, mode)) {
            debug!(%id, mode = mode.as_str(), "content already saved, skipping");
            return Ok(None);
        }
        let fields = match mode {
            ContentMode::Html => ArticleFields { content_html: Some(body.to_string()), ..Default::default() },
            ContentMode::Text => ArticleFields { content_text: Some(body.to_string()), ..Default::default() },
        };
        self.store.set_article(id, &fields, true).await
    }

    // ── Profile operations ───────────────────────────────────────────────────

    pub async fn find_profile(&self, biz: &str) -> Result<Option<PublisherProfile>, DbError> {
        self.store.find_profile(biz).await
    }

    /// Write `fields` only if `existing` is absent or lacks identifier,
    /// username or avatar.
    pub async fn fill_profile_gaps(
        &self,
        biz: &str,
        existing: Option<&PublisherProfile>,
        fields: &ProfileFields,
    ) -> Result<Option<PublisherProfile>, DbError> {
        if existing.is_some_and(PublisherProfile::is_complete) {
            debug!(biz, "profile already complete, skipping");
            return Ok(None);
        }
        if fields.is_empty() {
            return Ok(None);
        }
        self.store.set_profile(biz, fields, true).await
    }
}

/// The article already holds a non-empty body in `mode`.
pub fn has_content(article: &Article, mode: ContentMode) -> bool {
    let body = match mode {
        ContentMode::Html => &article.content_html,
        ContentMode::Text => &article.content_text,
    };
    body.as_deref().is_some_and(|b| !b.trim().is_empty())
}
