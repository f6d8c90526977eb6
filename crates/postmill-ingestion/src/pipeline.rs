//! Ingestion entry points.
//!
//! Three ways in:
//!   - bulk: a batch of listing entries, metadata only, full overwrite
//!   - deep: one detail page, fill-gaps merge plus optional body
//!   - upsert: caller-built records, full overwrite, shape preserving
//!
//! Every write goes through [`IngestionRepository`]; publisher profiles are
//! read through the shared [`ProfileCache`].

use std::sync::Arc;
use std::time::Instant;

use futures::future::{join_all, try_join_all};
use postmill_common::IngestionConfig;
use postmill_db::{Article, ArticleId, DocumentStore, PublisherProfile};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheError, ProfileCache};
use crate::detail::{article_id_from_document, parse_detail, DetailOutcome};
use crate::error::IngestError;
use crate::failure::FailureMarker;
use crate::history::{PublishHistory, QueueMonitor};
use crate::identity::{extract_units, parse_article_id};
use crate::models::{ArticleListingEntry, ArticleRecord, OneOrMany, PublishRecord};
use crate::repository::IngestionRepository;
use crate::sources::DetailFetcher;

// ── Result summaries ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Identified units after filtering and de-duplication.
    pub units_found: usize,
    pub saved: Vec<ArticleId>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// What deep ingestion did with one link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeepOutcome {
    /// Neither the link nor the document carried an article identity.
    Unresolvable,
    MarkedFailed { id: ArticleId, reason: String },
    Ingested {
        id: ArticleId,
        article_written: bool,
        profile_written: bool,
        content_written: bool,
    },
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct IngestionPipeline {
    repo: IngestionRepository,
    failures: FailureMarker,
    profiles: Arc<ProfileCache>,
    fetcher: Arc<dyn DetailFetcher>,
    history: Arc<dyn PublishHistory>,
    queue: Arc<dyn QueueMonitor>,
    config: IngestionConfig,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        fetcher: Arc<dyn DetailFetcher>,
        history: Arc<dyn PublishHistory>,
        queue: Arc<dyn QueueMonitor>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            repo: IngestionRepository::new(store.clone()),
            failures: FailureMarker::new(store),
            profiles: Arc::new(ProfileCache::new()),
            fetcher,
            history,
            queue,
            config,
        }
    }

    /// Share a profile cache with other pipelines in the same process.
    pub fn with_profile_cache(mut self, profiles: Arc<ProfileCache>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn profiles(&self) -> &Arc<ProfileCache> {
        &self.profiles
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    /// Publisher profile for `biz`, loaded from the store at most once per process.
    pub async fn resolve_profile(&self, biz: &str) -> Result<Option<PublisherProfile>, CacheError> {
        let repo = &self.repo;
        self.profiles
            .resolve(&biz.to_string(), || async move { repo.find_profile(biz).await })
            .await
    }

    /// Profile to gate a fill-gaps merge on. The cache answers when it holds a
    /// complete profile; otherwise the store is read again, since the cached
    /// value may predate an earlier fill.
    async fn current_profile(&self, biz: &str) -> Result<Option<PublisherProfile>, IngestError> {
        match self.resolve_profile(biz).await? {
            Some(profile) if profile.is_complete() => Ok(Some(profile)),
            _ => Ok(self.repo.find_profile(biz).await?),
        }
    }

    // ── Bulk path ─────────────────────────────────────────────────────────────

    /// Save every identifiable unit of `entries`. Returns the ids written.
    pub async fn ingest_batch(&self, entries: &[ArticleListingEntry]) -> Vec<ArticleId> {
        self.ingest_batch_report(entries).await.saved
    }

    /// Like [`ingest_batch`](Self::ingest_batch), with per-unit errors and timing.
    ///
    /// A failed write never fails its siblings. Publish history, the profile
    /// lookup and the queue depth are best-effort and only logged on failure.
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn ingest_batch_report(&self, entries: &[ArticleListingEntry]) -> IngestReport {
        let start = Instant::now();
        let units = extract_units(entries);
        let mut report = IngestReport { units_found: units.len(), ..Default::default() };

        let writes = units.iter().map(|unit| async move {
            let fields = unit.to_fields();
            (unit, self.repo.overwrite_article(&unit.id, &fields).await)
        });

        let mut saved: Vec<Article> = Vec::with_capacity(units.len());
        for (unit, result) in join_all(writes).await {
            match result {
                Ok(article) => saved.push(article),
                Err(e) => {
                    warn!(biz = %unit.id.biz, mid = %unit.id.mid, idx = %unit.id.idx, "article save failed: {e}");
                    report.errors.push(format!("{}: {e}", unit.id));
                }
            }
        }
        report.saved = saved.iter().map(|a| a.id.clone()).collect();

        if !saved.is_empty() {
            let records = PublishRecord::group(&saved);
            if let Err(e) = self.history.record(&records).await {
                warn!(records = records.len(), "publish history not recorded: {e}");
            }
        }

        if let Some(first) = saved.first() {
            match self.resolve_profile(&first.id.biz).await {
                Ok(Some(profile)) => debug!(biz = %profile.biz, title = ?profile.title, "publisher known"),
                Ok(None) => debug!(biz = %first.id.biz, "publisher not yet profiled"),
                Err(e) => warn!(biz = %first.id.biz, "profile lookup failed: {e}"),
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        match self.queue.depth().await {
            Ok(remaining) => info!(
                found = report.units_found,
                saved = report.saved.len(),
                failed = report.errors.len(),
                remaining,
                "batch ingested"
            ),
            Err(e) => {
                info!(found = report.units_found, saved = report.saved.len(), failed = report.errors.len(), "batch ingested");
                warn!("queue depth unavailable: {e}");
            }
        }
        report
    }

    // ── Deep path ─────────────────────────────────────────────────────────────

    /// Ingest one detail page. `prefetched` skips the fetch.
    ///
    /// Existing article basics and complete profiles are never overwritten.
    #[instrument(skip(self, prefetched), fields(prefetched = prefetched.is_some()))]
    pub async fn ingest_detail(
        &self,
        link: &str,
        prefetched: Option<&str>,
    ) -> Result<DeepOutcome, IngestError> {
        let id = parse_article_id(link).or_else(|| prefetched.and_then(article_id_from_document));
        let Some(id) = id else {
            warn!("no article identity in link or document");
            return Ok(DeepOutcome::Unresolvable);
        };

        let document = match prefetched {
            Some(doc) => doc.to_string(),
            None => self.fetcher.fetch(link).await.map_err(|source| IngestError::Fetch {
                link: link.to_string(),
                source,
            })?,
        };

        let fields = match parse_detail(&document, &self.config) {
            DetailOutcome::Invalid { reason } => {
                self.failures.mark_unavailable(&id, &reason).await?;
                return Ok(DeepOutcome::MarkedFailed { id, reason });
            }
            DetailOutcome::Parsed(fields) => fields,
        };

        let existing = self.repo.find_article(&id).await?;
        let link = Some(link.trim()).filter(|l| !l.is_empty());
        let article_written = self
            .repo
            .fill_article_gaps(&id, existing.as_ref(), &fields.article_fields(link))
            .await?
            .is_some();

        let profile = self.current_profile(&id.biz).await?;
        let profile_written = self
            .repo
            .fill_profile_gaps(&id.biz, profile.as_ref(), &fields.profile_fields())
            .await?
            .is_some();

        let mut content_written = false;
        if self.config.save_post_content {
            if let Some(body) = fields.content.as_deref() {
                content_written = self
                    .repo
                    .save_content(&id, existing.as_ref(), self.config.content_mode, body)
                    .await?
                    .is_some();
            }
        }

        info!(
            biz = %id.biz, mid = %id.mid, idx = %id.idx,
            article_written, profile_written, content_written,
            "detail ingested"
        );
        Ok(DeepOutcome::Ingested { id, article_written, profile_written, content_written })
    }

    // ── Standalone upsert ─────────────────────────────────────────────────────

    /// Overwrite-merge each record. A single record yields a single article,
    /// a list yields a list in input order.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn upsert(
        &self,
        records: OneOrMany<ArticleRecord>,
    ) -> Result<OneOrMany<Article>, IngestError> {
        let writes = records
            .as_slice()
            .iter()
            .map(|record| self.repo.overwrite_article(&record.id, &record.fields));
        let saved = try_join_all(writes).await?;

        let (expected, got) = (records.len(), saved.len());
        records.reshape(saved).ok_or(IngestError::Cardinality { expected, got })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{MemoryPublishHistory, NoQueue};
    use async_trait::async_trait;
    use postmill_db::{ArticleFields, MemoryStore};

    struct NoFetch;

    #[async_trait]
    impl DetailFetcher for NoFetch {
        async fn fetch(&self, link: &str) -> anyhow::Result<String> {
            anyhow::bail!("unexpected fetch of {link}")
        }
    }

    fn pipeline(store: Arc<MemoryStore>) -> IngestionPipeline {
        IngestionPipeline::new(
            store,
            Arc::new(NoFetch),
            Arc::new(MemoryPublishHistory::new()),
            Arc::new(NoQueue),
            IngestionConfig::default(),
        )
    }

    fn record(biz: &str, title: &str) -> ArticleRecord {
        ArticleRecord::new(
            ArticleId::new(biz, "m", "1"),
            ArticleFields { title: Some(title.to_string()), ..Default::default() },
        )
    }

    #[tokio::test]
    async fn test_upsert_many_preserves_order() {
        let store = Arc::new(MemoryStore::new());
        let saved = pipeline(store.clone())
            .upsert(OneOrMany::Many(vec![record("A", "a"), record("B", "b")]))
            .await
            .unwrap();

        let OneOrMany::Many(articles) = saved else { panic!("expected a list") };
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].id.biz, "A");
        assert_eq!(articles[1].title.as_deref(), Some("b"));
        assert_eq!(store.article_count().await, 2);
    }

    #[tokio::test]
    async fn test_upsert_one_returns_one() {
        let store = Arc::new(MemoryStore::new());
        let saved = pipeline(store).upsert(OneOrMany::One(record("A", "a"))).await.unwrap();
        assert!(matches!(saved, OneOrMany::One(ref a) if a.id.biz == "A"));
    }

    #[tokio::test]
    async fn test_unresolvable_link() {
        let store = Arc::new(MemoryStore::new());
        let outcome = pipeline(store.clone())
            .ingest_detail("https://host/s?foo=bar", Some("<html></html>"))
            .await
            .unwrap();
        assert_eq!(outcome, DeepOutcome::Unresolvable);
        assert_eq!(store.stats().article_writes, 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces() {
        let store = Arc::new(MemoryStore::new());
        let err = pipeline(store)
            .ingest_detail("https://host/s?__biz=B&mid=m&idx=1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Fetch { .. }));
    }
}
