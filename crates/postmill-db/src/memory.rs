//! In-process document store.
//!
//! Keeps both collections in hash maps behind async read/write locks. Each
//! find-and-modify runs under the collection's write lock, so a single
//! `set_*` call is atomic with respect to other calls on the same store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{DbError, Result};
use crate::schema::{Article, ArticleFields, ArticleId, ProfileFields, PublisherProfile};
use crate::store::DocumentStore;

/// Operation counters, mostly useful for asserting write behaviour in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub article_reads: u64,
    pub article_writes: u64,
    pub profile_reads: u64,
    pub profile_writes: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    articles: RwLock<HashMap<ArticleId, Article>>,
    profiles: RwLock<HashMap<String, PublisherProfile>>,
    article_reads: AtomicU64,
    article_writes: AtomicU64,
    profile_reads: AtomicU64,
    profile_writes: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("stats", &self.stats())
            .finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            article_reads: self.article_reads.load(Ordering::Relaxed),
            article_writes: self.article_writes.load(Ordering::Relaxed),
            profile_reads: self.profile_reads.load(Ordering::Relaxed),
            profile_writes: self.profile_writes.load(Ordering::Relaxed),
        }
    }

    pub async fn article_count(&self) -> usize {
        self.articles.read().await.len()
    }

    pub async fn profile_count(&self) -> usize {
        self.profiles.read().await.len()
    }

    /// Snapshot of every stored article, ordered by key.
    pub async fn articles(&self) -> Vec<Article> {
        let mut all: Vec<Article> = self.articles.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Insert a document as-is, bypassing the counters.
    pub async fn seed_article(&self, article: Article) {
        self.articles.write().await.insert(article.id.clone(), article);
    }

    /// Insert a profile as-is, bypassing the counters.
    pub async fn seed_profile(&self, profile: PublisherProfile) {
        self.profiles.write().await.insert(profile.biz.clone(), profile);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_article(&self, id: &ArticleId) -> Result<Option<Article>> {
        self.article_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.articles.read().await.get(id).cloned())
    }

    async fn set_article(
        &self,
        id: &ArticleId,
        fields: &ArticleFields,
        upsert: bool,
    ) -> Result<Option<Article>> {
        if !id.is_valid() {
            return Err(DbError::InvalidKey(id.to_string()));
        }
        let mut articles = self.articles.write().await;
        if !upsert && !articles.contains_key(id) {
            return Ok(None);
        }
        self.article_writes.fetch_add(1, Ordering::Relaxed);
        let article = articles.entry(id.clone()).or_insert_with(|| {
            debug!(%id, "creating article");
            Article::new(id.clone())
        });
        fields.apply_to(article);
        article.updated_at = Utc::now();
        Ok(Some(article.clone()))
    }

    async fn find_profile(&self, biz: &str) -> Result<Option<PublisherProfile>> {
        self.profile_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.profiles.read().await.get(biz).cloned())
    }

    async fn set_profile(
        &self,
        biz: &str,
        fields: &ProfileFields,
        upsert: bool,
    ) -> Result<Option<PublisherProfile>> {
        if biz.is_empty() {
            return Err(DbError::InvalidKey("empty biz".to_string()));
        }
        let mut profiles = self.profiles.write().await;
        if !upsert && !profiles.contains_key(biz) {
            return Ok(None);
        }
        self.profile_writes.fetch_add(1, Ordering::Relaxed);
        let profile = profiles.entry(biz.to_string()).or_insert_with(|| {
            debug!(biz, "creating profile");
            PublisherProfile::new(biz)
        });
        fields.apply_to(profile);
        profile.updated_at = Utc::now();
        Ok(Some(profile.clone()))
    }
}
