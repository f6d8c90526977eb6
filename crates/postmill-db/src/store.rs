//! The persistence seam the ingestion pipeline writes through.

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::{Article, ArticleFields, ArticleId, ProfileFields, PublisherProfile};

/// A document store with find-by-key and atomic find-and-modify.
///
/// `set_*` applies the partial field set to the document with the given key
/// and returns the document as it is after the write. With `upsert` the
/// document is created when absent; without it a missing document yields
/// `Ok(None)` and nothing is written.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_article(&self, id: &ArticleId) -> Result<Option<Article>>;

    async fn set_article(
        &self,
        id: &ArticleId,
        fields: &ArticleFields,
        upsert: bool,
    ) -> Result<Option<Article>>;

    async fn find_profile(&self, biz: &str) -> Result<Option<PublisherProfile>>;

    async fn set_profile(
        &self,
        biz: &str,
        fields: &ProfileFields,
        upsert: bool,
    ) -> Result<Option<PublisherProfile>>;
}
