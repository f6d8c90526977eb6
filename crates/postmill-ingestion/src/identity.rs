//! Canonical identity extraction for listing entries.
//!
//! A listing entry bundles a primary article with zero or more sub-articles
//! published in the same push. Every one of them becomes an independent unit
//! keyed by the `(biz, mid, idx)` triple found in its link.

use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use postmill_db::ArticleId;
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use regex::{Captures, Regex};
use tracing::debug;
use url::Url;

use crate::models::{ArticleListingEntry, CandidateUnit, ListingUnit};

const LINK_BASE: &str = "https://mp.weixin.qq.com";

/// Listing links are routinely escaped more than once (`&amp;amp;`).
const MAX_UNESCAPE_PASSES: usize = 3;

lazy_static! {
    static ref ENTITY: Regex = Regex::new(r"&#?[A-Za-z0-9]+;").expect("static pattern");
}

/// Pair every message object of every entry with its entry's publish time.
///
/// An entry with `k` sub-items yields `k + 1` candidates, all sharing the
/// entry's timestamp. Entries without a primary message yield nothing.
pub fn candidate_units(entries: &[ArticleListingEntry]) -> Vec<CandidateUnit> {
    let mut units = Vec::new();
    for entry in entries {
        let Some(ext) = &entry.app_msg_ext_info else { continue };
        let publish_at = entry.comm_msg_info.datetime.and_then(epoch_to_utc);

        units.push(CandidateUnit { message: ext.message.clone(), publish_at });
        units.extend(
            ext.multi_app_msg_item_list
                .iter()
                .map(|item| CandidateUnit { message: item.clone(), publish_at }),
        );
    }
    units
}

/// Expand, decode and identify listing units.
///
/// Units without a title or link, or whose link carries no canonical
/// identity, are dropped. The first unit wins when two share an identity.
pub fn extract_units(entries: &[ArticleListingEntry]) -> Vec<ListingUnit> {
    let candidates = candidate_units(entries);
    let total = candidates.len();

    let mut seen = HashSet::new();
    let units: Vec<ListingUnit> = candidates
        .into_iter()
        .filter_map(identify)
        .filter(|unit| seen.insert(unit.id.clone()))
        .collect();

    debug!(candidates = total, kept = units.len(), "listing units extracted");
    units
}

fn identify(candidate: CandidateUnit) -> Option<ListingUnit> {
    let message = candidate.message;
    let title = non_empty(message.title.as_deref().map(unescape_html))?;
    let link = non_empty(message.content_url.as_deref().map(unescape_html))?;

    let Some(id) = parse_article_id(&link) else {
        debug!(%link, "listing link carries no article identity");
        return None;
    };

    Some(ListingUnit {
        id,
        title,
        link,
        publish_at: candidate.publish_at,
        cover: non_empty(message.cover.as_deref().map(unescape_html)),
        digest: non_empty(message.digest.as_deref().map(unescape_html)),
        source_url: non_empty(message.source_url.as_deref().map(unescape_html)),
        author: non_empty(message.author),
        copyright_stat: message.copyright_stat,
    })
}

/// Parse the canonical identity out of an article link.
///
/// Reads `__biz`, `mid` and `idx`; older links use `appmsgid` and `itemidx`
/// for the latter two. Relative links are resolved against the platform host.
pub fn parse_article_id(link: &str) -> Option<ArticleId> {
    let link = unescape_html(link.trim());
    if link.is_empty() {
        return None;
    }

    let url = Url::parse(&link)
        .or_else(|_| Url::parse(LINK_BASE).and_then(|base| base.join(&link)))
        .ok()?;

    let (mut biz, mut mid, mut idx) = (None, None, None);
    let (mut appmsgid, mut itemidx) = (None, None);
    for (key, value) in url.query_pairs() {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "__biz" => biz = Some(value.to_string()),
            "mid" => mid = Some(value.to_string()),
            "idx" => idx = Some(value.to_string()),
            "appmsgid" => appmsgid = Some(value.to_string()),
            "itemidx" => itemidx = Some(value.to_string()),
            _ => {}
        }
    }

    Some(ArticleId::new(biz?, mid.or(appmsgid)?, idx.or(itemidx)?))
}

/// Decode HTML entities, repeating while the text keeps changing.
///
/// Entities are resolved one at a time against the HTML5 table. An entity
/// the table does not know, or a bare `&`, is kept as written without
/// affecting its neighbours.
pub fn unescape_html(raw: &str) -> String {
    let mut current = raw.to_string();
    for _ in 0..MAX_UNESCAPE_PASSES {
        let next = ENTITY.replace_all(&current, decode_entity).into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn decode_entity(caps: &Captures) -> String {
    let entity = &caps[0];
    unescape_with(entity, resolve_html5_entity)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| entity.to_string())
}

pub(crate) fn epoch_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
