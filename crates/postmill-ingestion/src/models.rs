//! Data models for the ingestion pipeline.

use chrono::{DateTime, Utc};
use postmill_db::{Article, ArticleFields, ArticleId};
use serde::{Deserialize, Serialize};

// ── Listing payload ───────────────────────────────────────────────────────────

/// One entry of a batch-push listing as delivered by the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleListingEntry {
    pub comm_msg_info: CommMsgInfo,
    /// Absent for entries that are not article pushes (plain text, images).
    pub app_msg_ext_info: Option<AppMsgExtInfo>,
}

/// Batch-level metadata shared by every article in the entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommMsgInfo {
    pub id: Option<i64>,
    /// Publish time, epoch seconds.
    pub datetime: Option<i64>,
}

/// The primary message object of an entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMsgExtInfo {
    #[serde(flatten)]
    pub message: AppMsgInfo,
    pub is_multi: Option<i64>,
    pub multi_app_msg_item_list: Vec<AppMsgInfo>,
}

/// Fields common to primary and sub-item message objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMsgInfo {
    pub title: Option<String>,
    pub content_url: Option<String>,
    pub cover: Option<String>,
    pub digest: Option<String>,
    pub source_url: Option<String>,
    pub author: Option<String>,
    pub copyright_stat: Option<i64>,
}

// ── Extraction units ──────────────────────────────────────────────────────────

/// A message object paired with its batch publish time, before decoding or filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateUnit {
    pub message: AppMsgInfo,
    pub publish_at: Option<DateTime<Utc>>,
}

/// A decoded listing unit carrying its canonical identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingUnit {
    pub id: ArticleId,
    pub title: String,
    pub link: String,
    pub publish_at: Option<DateTime<Utc>>,
    pub cover: Option<String>,
    pub digest: Option<String>,
    pub source_url: Option<String>,
    pub author: Option<String>,
    pub copyright_stat: Option<i64>,
}

impl ListingUnit {
    /// The "set" document written by the bulk path.
    pub fn to_fields(&self) -> ArticleFields {
        ArticleFields {
            title: Some(self.title.clone()),
            link: Some(self.link.clone()),
            publish_at: self.publish_at,
            cover: self.cover.clone(),
            digest: self.digest.clone(),
            source_url: self.source_url.clone(),
            author: self.author.clone(),
            copyright_stat: self.copyright_stat,
            ..Default::default()
        }
    }
}

// ── Upsert records ────────────────────────────────────────────────────────────

/// A partial article keyed by its canonical identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: ArticleId,
    #[serde(flatten)]
    pub fields: ArticleFields,
}

impl ArticleRecord {
    pub fn new(id: ArticleId, fields: ArticleFields) -> Self {
        Self { id, fields }
    }
}

/// A single value or a list, preserved through an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items,
        }
    }

    /// Wrap `items` in the same shape as `self`. `None` when a single value
    /// is expected but `items` does not hold exactly one.
    pub fn reshape<U>(&self, mut items: Vec<U>) -> Option<OneOrMany<U>> {
        match self {
            OneOrMany::One(_) if items.len() == 1 => items.pop().map(OneOrMany::One),
            OneOrMany::One(_) => None,
            OneOrMany::Many(_) => Some(OneOrMany::Many(items)),
        }
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(item: T) -> Self {
        OneOrMany::One(item)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        OneOrMany::Many(items)
    }
}

// ── Publish history ───────────────────────────────────────────────────────────

/// Articles saved from one publish event of one publisher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishRecord {
    pub biz: String,
    pub publish_at: Option<DateTime<Utc>>,
    pub article_ids: Vec<ArticleId>,
}

impl PublishRecord {
    /// Group saved articles by (biz, publish time), keeping first-seen order.
    pub fn group(articles: &[Article]) -> Vec<PublishRecord> {
        let mut records: Vec<PublishRecord> = Vec::new();
        for article in articles {
            match records
                .iter_mut()
                .find(|r| r.biz == article.id.biz && r.publish_at == article.publish_at)
            {
                Some(record) => record.article_ids.push(article.id.clone()),
                None => records.push(PublishRecord {
                    biz: article.id.biz.clone(),
                    publish_at: article.publish_at,
                    article_ids: vec![article.id.clone()],
                }),
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_listing_entry_deserializes_platform_payload() {
        let raw = r#"{
            "comm_msg_info": {"id": 1000000001, "type": 49, "datetime": 1526370760},
            "app_msg_ext_info": {
                "title": "Primary",
                "content_url": "http://mp.weixin.qq.com/s?__biz=Bz1&amp;mid=Mid1&amp;idx=1",
                "copyright_stat": 11,
                "is_multi": 1,
                "multi_app_msg_item_list": [
                    {"title": "Second", "content_url": "http://mp.weixin.qq.com/s?__biz=Bz1&amp;mid=Mid1&amp;idx=2"}
                ]
            }
        }"#;
        let entry: ArticleListingEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.comm_msg_info.datetime, Some(1526370760));
        let ext = entry.app_msg_ext_info.unwrap();
        assert_eq!(ext.message.title.as_deref(), Some("Primary"));
        assert_eq!(ext.message.copyright_stat, Some(11));
        assert_eq!(ext.multi_app_msg_item_list.len(), 1);
    }

    #[test]
    fn test_one_or_many_keeps_shape() {
        let one = OneOrMany::One(1u8);
        assert_eq!(one.reshape(vec!["a"]), Some(OneOrMany::One("a")));

        let many: OneOrMany<u8> = OneOrMany::from(vec![1u8]);
        assert_eq!(many.reshape(vec!["a"]), Some(OneOrMany::Many(vec!["a"])));
        assert_eq!(many.len(), 1);
    }

    #[test]
    fn test_article_record_accepts_single_or_list() {
        let single: OneOrMany<ArticleRecord> = serde_json::from_str(
            r#"{"id": {"biz": "A", "mid": "m", "idx": "1"}, "title": "x"}"#,
        )
        .unwrap();
        assert!(matches!(single, OneOrMany::One(ref r) if r.fields.title.as_deref() == Some("x")));

        let list: OneOrMany<ArticleRecord> = serde_json::from_str(
            r#"[{"id": {"biz": "A", "mid": "m", "idx": "1"}}, {"id": {"biz": "B", "mid": "m", "idx": "1"}}]"#,
        )
        .unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_publish_records_grouped_by_biz_and_time() {
        let t = Utc.timestamp_opt(1_526_370_760, 0).single();
        let mut a = Article::new(ArticleId::new("B", "m", "1"));
        a.publish_at = t;
        let mut b = Article::new(ArticleId::new("B", "m", "2"));
        b.publish_at = t;
        let c = Article::new(ArticleId::new("C", "x", "1"));

        let records = PublishRecord::group(&[a, b, c]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].article_ids.len(), 2);
        assert_eq!(records[1].biz, "C");
    }
}
