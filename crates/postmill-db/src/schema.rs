//! Document shapes for the article and profile collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical identity of an article: the `__biz`, `mid` and `idx` query
/// parameters of its link. Immutable once established.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArticleId {
    pub biz: String,
    pub mid: String,
    pub idx: String,
}

impl ArticleId {
    pub fn new(biz: impl Into<String>, mid: impl Into<String>, idx: impl Into<String>) -> Self {
        Self { biz: biz.into(), mid: mid.into(), idx: idx.into() }
    }

    /// All three components are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.biz.is_empty() && !self.mid.is_empty() && !self.idx.is_empty()
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.biz, self.mid, self.idx)
    }
}

/// A stored article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: Option<String>,
    pub link: Option<String>,
    pub publish_at: Option<DateTime<Utc>>,
    pub cover: Option<String>,
    pub digest: Option<String>,
    pub source_url: Option<String>,
    pub author: Option<String>,
    pub copyright_stat: Option<i64>,
    pub wechat_id: Option<String>,
    pub content_html: Option<String>,
    pub content_text: Option<String>,
    pub viewed: bool,
    pub imported: bool,
    pub is_fail: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// An empty record for `id`, as created by an upsert that finds nothing.
    pub fn new(id: ArticleId) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: None,
            link: None,
            publish_at: None,
            cover: None,
            digest: None,
            source_url: None,
            author: None,
            copyright_stat: None,
            wechat_id: None,
            content_html: None,
            content_text: None,
            viewed: false,
            imported: false,
            is_fail: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Title, link and publisher identifier are all present.
    pub fn has_basic_fields(&self) -> bool {
        present(&self.title) && present(&self.link) && present(&self.wechat_id)
    }
}

/// Partial "set" document for an article. `None` leaves the stored field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleFields {
    pub title: Option<String>,
    pub link: Option<String>,
    pub publish_at: Option<DateTime<Utc>>,
    pub cover: Option<String>,
    pub digest: Option<String>,
    pub source_url: Option<String>,
    pub author: Option<String>,
    pub copyright_stat: Option<i64>,
    pub wechat_id: Option<String>,
    pub content_html: Option<String>,
    pub content_text: Option<String>,
    pub viewed: Option<bool>,
    pub imported: Option<bool>,
    pub is_fail: Option<bool>,
}

impl ArticleFields {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite every named field of `article`.
    pub fn apply_to(&self, article: &mut Article) {
        set(&mut article.title, &self.title);
        set(&mut article.link, &self.link);
        set(&mut article.publish_at, &self.publish_at);
        set(&mut article.cover, &self.cover);
        set(&mut article.digest, &self.digest);
        set(&mut article.source_url, &self.source_url);
        set(&mut article.author, &self.author);
        set(&mut article.copyright_stat, &self.copyright_stat);
        set(&mut article.wechat_id, &self.wechat_id);
        set(&mut article.content_html, &self.content_html);
        set(&mut article.content_text, &self.content_text);
        if let Some(v) = self.viewed { article.viewed = v; }
        if let Some(v) = self.imported { article.imported = v; }
        if let Some(v) = self.is_fail { article.is_fail = v; }
    }
}

/// A publisher account, keyed by `biz`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherProfile {
    pub biz: String,
    pub title: Option<String>,
    pub wechat_id: Option<String>,
    pub username: Option<String>,
    pub headimg: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublisherProfile {
    pub fn new(biz: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            biz: biz.into(),
            title: None,
            wechat_id: None,
            username: None,
            headimg: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Identifier, username and avatar are all present.
    pub fn is_complete(&self) -> bool {
        present(&self.wechat_id) && present(&self.username) && present(&self.headimg)
    }
}

/// Partial "set" document for a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileFields {
    pub title: Option<String>,
    pub wechat_id: Option<String>,
    pub username: Option<String>,
    pub headimg: Option<String>,
}

impl ProfileFields {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, profile: &mut PublisherProfile) {
        set(&mut profile.title, &self.title);
        set(&mut profile.wechat_id, &self.wechat_id);
        set(&mut profile.username, &self.username);
        set(&mut profile.headimg, &self.headimg);
    }
}

fn set<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
    if let Some(v) = value {
        *target = Some(v.clone());
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_apply_only_touches_named_fields() {
        let mut article = Article::new(ArticleId::new("b", "m", "1"));
        article.author = Some("kept".to_string());

        let fields = ArticleFields {
            title: Some("T".to_string()),
            is_fail: Some(true),
            ..Default::default()
        };
        fields.apply_to(&mut article);

        assert_eq!(article.title.as_deref(), Some("T"));
        assert_eq!(article.author.as_deref(), Some("kept"));
        assert!(article.is_fail);
        assert!(!article.viewed);
    }

    #[test]
    fn test_basic_fields_require_non_blank_values() {
        let mut article = Article::new(ArticleId::new("b", "m", "1"));
        article.title = Some("T".to_string());
        article.link = Some("https://mp.weixin.qq.com/s?__biz=b&mid=m&idx=1".to_string());
        article.wechat_id = Some("   ".to_string());
        assert!(!article.has_basic_fields());

        article.wechat_id = Some("rustlang".to_string());
        assert!(article.has_basic_fields());
    }

    #[test]
    fn test_profile_completeness() {
        let mut profile = PublisherProfile::new("b");
        ProfileFields {
            wechat_id: Some("id".to_string()),
            username: Some("gh_1".to_string()),
            ..Default::default()
        }
        .apply_to(&mut profile);
        assert!(!profile.is_complete());

        profile.headimg = Some("http://img".to_string());
        assert!(profile.is_complete());
    }

    #[test]
    fn test_article_id_display_and_validity() {
        let id = ArticleId::new("Bz1", "Mid1", "2");
        assert_eq!(id.to_string(), "Bz1/Mid1/2");
        assert!(id.is_valid());
        assert!(!ArticleId::new("Bz1", "", "2").is_valid());
    }

    #[test]
    fn test_fields_deserialize_partially() {
        let fields: ArticleFields = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(fields.title.as_deref(), Some("x"));
        assert!(fields.link.is_none());
        assert!(!fields.is_empty());
        assert!(ArticleFields::default().is_empty());
    }
}
