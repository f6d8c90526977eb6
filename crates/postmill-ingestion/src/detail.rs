//! Article detail page parsing.
//!
//! A detail page is first checked for the platform's removal and blocking
//! notices. Pages that pass are run through a table of independent field
//! rules: each field is looked up on its own and a miss leaves only that
//! field empty.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use postmill_common::{ContentMode, IngestionConfig};
use postmill_db::{ArticleFields, ArticleId, ProfileFields};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Serialize;

use crate::identity::{epoch_to_utc, parse_article_id, unescape_html};

/// Notices shown in place of an article that has been removed or blocked.
const INVALID_MARKERS: &[&str] = &[
    "该内容已被发布者删除",
    "此内容因违规无法查看",
    "此内容被投诉且经审核涉嫌侵权，无法查看",
    "此帐号已被屏蔽, 内容无法查看",
    "此帐号已自主注销，内容无法查看",
    "此内容发送失败无法查看",
    "该公众号已迁移",
];

/// Elements that start a new line in plain-text content.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "br", "div", "section", "li", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DetailField {
    WechatId,
    Username,
    Title,
    PublishAt,
    SourceUrl,
    Cover,
    Digest,
    HeadImg,
    Nickname,
    MsgLink,
}

enum Rule {
    /// First capture group of a pattern over the raw page (inline script variables).
    Script(Regex),
    /// Text of the first matching element.
    Element(Selector),
}

struct FieldRule {
    field: DetailField,
    /// Tried in order; the first non-empty hit wins.
    rules: Vec<Rule>,
}

fn script_var(name: &str) -> Rule {
    let pattern = format!(r#"var\s+{name}\s*=\s*["']([^"']*)["']"#);
    Rule::Script(Regex::new(&pattern).expect("static script pattern"))
}

fn element(css: &str) -> Rule {
    Rule::Element(Selector::parse(css).expect("static selector"))
}

lazy_static! {
    static ref FIELD_RULES: Vec<FieldRule> = vec![
        FieldRule { field: DetailField::WechatId, rules: vec![element(".profile_meta_value")] },
        FieldRule { field: DetailField::Username, rules: vec![script_var("user_name")] },
        FieldRule {
            field: DetailField::Title,
            rules: vec![script_var("msg_title"), element("#activity-name")],
        },
        FieldRule {
            field: DetailField::PublishAt,
            rules: vec![
                Rule::Script(Regex::new(r#"var\s+ct\s*=\s*["']?(\d+)"#).expect("static script pattern")),
                Rule::Script(Regex::new(r#"create_time\s*[:=]\s*["']?(\d+)"#).expect("static script pattern")),
            ],
        },
        FieldRule { field: DetailField::SourceUrl, rules: vec![script_var("msg_source_url")] },
        FieldRule { field: DetailField::Cover, rules: vec![script_var("msg_cdn_url")] },
        FieldRule { field: DetailField::Digest, rules: vec![script_var("msg_desc")] },
        FieldRule {
            field: DetailField::HeadImg,
            rules: vec![script_var("ori_head_img_url"), script_var("round_head_img")],
        },
        FieldRule {
            field: DetailField::Nickname,
            rules: vec![script_var("nickname"), element("#js_name")],
        },
        FieldRule { field: DetailField::MsgLink, rules: vec![script_var("msg_link")] },
    ];
    static ref ERROR_CONTAINER: Selector =
        Selector::parse(".global_error_msg, .weui-msg__title").expect("static selector");
    static ref CONTENT_CONTAINER: Selector =
        Selector::parse("#js_content").expect("static selector");
    static ref HAN_SCRIPT: Regex = Regex::new(r"\p{Han}").expect("static pattern");
    static ref JS_HEX_ESCAPE: Regex = Regex::new(r"\\x([0-9a-fA-F]{2})").expect("static pattern");
}

/// Result of parsing one detail page.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailOutcome {
    /// The page is a removal or blocking notice. Terminal for the article.
    Invalid { reason: String },
    Parsed(DetailFields),
}

/// Fields extracted from a detail page. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetailFields {
    pub wechat_id: Option<String>,
    pub username: Option<String>,
    pub title: Option<String>,
    pub publish_at: Option<DateTime<Utc>>,
    pub source_url: Option<String>,
    pub cover: Option<String>,
    pub digest: Option<String>,
    pub head_img: Option<String>,
    pub nickname: Option<String>,
    /// Identity read from the page's own canonical link.
    pub article_id: Option<ArticleId>,
    pub link: Option<String>,
    pub content: Option<String>,
}

impl DetailFields {
    /// Basic article fields for a fill-gaps merge. `link` is the link the
    /// page was fetched from, preferred over the page's own.
    pub fn article_fields(&self, link: Option<&str>) -> ArticleFields {
        ArticleFields {
            title: self.title.clone(),
            link: link.map(str::to_string).or_else(|| self.link.clone()),
            publish_at: self.publish_at,
            cover: self.cover.clone(),
            digest: self.digest.clone(),
            source_url: self.source_url.clone(),
            wechat_id: self.wechat_id.clone(),
            ..Default::default()
        }
    }

    pub fn profile_fields(&self) -> ProfileFields {
        ProfileFields {
            title: self.nickname.clone(),
            wechat_id: self.wechat_id.clone(),
            username: self.username.clone(),
            headimg: self.head_img.clone(),
        }
    }
}

/// Parse a detail page.
///
/// Body content is captured only when `config.save_post_content` is set, in
/// the rendition named by `config.content_mode`.
pub fn parse_detail(html: &str, config: &IngestionConfig) -> DetailOutcome {
    let document = Html::parse_document(html);

    if let Some(reason) = invalidation_reason(html, &document) {
        return DetailOutcome::Invalid { reason };
    }

    let mut values = extract_values(html, &document);
    let mut fields = DetailFields {
        wechat_id: values.remove(&DetailField::WechatId),
        username: values.remove(&DetailField::Username),
        title: values.remove(&DetailField::Title),
        publish_at: values
            .remove(&DetailField::PublishAt)
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(epoch_to_utc),
        source_url: values.remove(&DetailField::SourceUrl),
        cover: values.remove(&DetailField::Cover),
        digest: values.remove(&DetailField::Digest),
        head_img: values.remove(&DetailField::HeadImg),
        nickname: values.remove(&DetailField::Nickname),
        article_id: None,
        link: values.remove(&DetailField::MsgLink),
        content: None,
    };
    fields.article_id = fields.link.as_deref().and_then(parse_article_id);

    // Publishers that never set an account id show their display name in its place.
    let id_is_placeholder = fields
        .wechat_id
        .as_deref()
        .map_or(true, |id| HAN_SCRIPT.is_match(id));
    if id_is_placeholder {
        fields.wechat_id = fields.username.clone();
    }

    if config.save_post_content {
        fields.content = extract_content(&document, config.content_mode);
    }

    DetailOutcome::Parsed(fields)
}

/// Identity embedded in a detail page, if any.
pub fn article_id_from_document(html: &str) -> Option<ArticleId> {
    let document = Html::parse_document(html);
    extract_values(html, &document)
        .remove(&DetailField::MsgLink)
        .and_then(|link| parse_article_id(&link))
}

fn invalidation_reason(html: &str, document: &Html) -> Option<String> {
    if let Some(notice) = document.select(&ERROR_CONTAINER).map(element_text).find(|t| !t.is_empty()) {
        return Some(notice);
    }
    if document.select(&CONTENT_CONTAINER).next().is_some() {
        return None;
    }
    INVALID_MARKERS
        .iter()
        .find(|marker| html.contains(*marker))
        .map(|marker| marker.to_string())
}

fn extract_values(html: &str, document: &Html) -> HashMap<DetailField, String> {
    FIELD_RULES
        .iter()
        .filter_map(|rule| {
            rule.rules
                .iter()
                .find_map(|r| apply_rule(r, html, document))
                .map(|value| (rule.field, value))
        })
        .collect()
}

fn apply_rule(rule: &Rule, html: &str, document: &Html) -> Option<String> {
    let raw = match rule {
        Rule::Script(pattern) => pattern
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| decode_script_string(m.as_str())),
        Rule::Element(selector) => document.select(selector).next().map(element_text),
    }?;
    let value = raw.trim().to_string();
    (!value.is_empty()).then_some(value)
}

/// Undo `\xNN` escapes and HTML entities in an inline script string.
fn decode_script_string(raw: &str) -> String {
    let unescaped = JS_HEX_ESCAPE.replace_all(raw, |caps: &regex::Captures| {
        u8::from_str_radix(&caps[1], 16)
            .map(|b| (b as char).to_string())
            .unwrap_or_else(|_| caps[0].to_string())
    });
    unescape_html(&unescaped)
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn extract_content(document: &Html, mode: ContentMode) -> Option<String> {
    let container = document.select(&CONTENT_CONTAINER).next()?;
    let content = match mode {
        ContentMode::Html => container.inner_html().trim().to_string(),
        ContentMode::Text => plain_text(container),
    };
    (!content.is_empty()).then_some(content)
}

/// Text of the container with one line per block element and runs of
/// whitespace collapsed.
fn plain_text(container: ElementRef) -> String {
    let mut raw = String::new();
    for node in container.descendants() {
        match node.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => raw.push('\n'),
            _ => {}
        }
    }
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
