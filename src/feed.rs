//! Feed row projection: raw query rows into presentation-ready items.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::avatars::{letter_avatar_url, UploadPathResolver};
use crate::constants::EXCERPT_MAX_CHARS;
use crate::db::RawFeedRow;

/// Failure modes of the feed pipeline.
///
/// Both variants are caught at the top of the request and converted to the
/// generic failure envelope; the detail stays in the operator log.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("latest replies query failed")]
    Query(#[source] sqlx::Error),
    #[error("malformed feed row for post {post_id}: {reason}")]
    Projection { post_id: i64, reason: String },
}

/// Category badge attached to a feed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedCategory {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub text_color: String,
}

/// One projected, presentation-ready reply record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: i64,
    pub post_number: i64,
    pub created_at: String,
    pub updated_at: String,
    pub excerpt: String,
    pub topic_id: i64,
    pub topic_title: String,
    pub topic_slug: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: String,
    pub category: Option<FeedCategory>,
    pub tags: Vec<String>,
}

/// Maps raw feed rows into [`FeedItem`]s.
///
/// Deterministic given the same row and upload resolver; the only
/// collaborator call is the read-only upload path lookup.
pub struct FeedRowProjector<'a> {
    uploads: &'a dyn UploadPathResolver,
}

impl<'a> FeedRowProjector<'a> {
    #[must_use]
    pub fn new(uploads: &'a dyn UploadPathResolver) -> Self {
        Self { uploads }
    }

    /// Project one raw row.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Projection`] if the row is malformed (blank
    /// username). The query guarantees should make this unreachable, but a
    /// bad row must not leak raw internals to the caller.
    pub fn project(&self, row: &RawFeedRow) -> Result<FeedItem, FeedError> {
        if row.username.trim().is_empty() {
            return Err(FeedError::Projection {
                post_id: row.id,
                reason: "author username is blank".to_string(),
            });
        }

        let excerpt = truncate_excerpt(&strip_markup(&row.excerpt), EXCERPT_MAX_CHARS);

        let display_name = resolve_display_name(
            row.display_name.as_deref(),
            row.full_name.as_deref(),
            &row.username,
        )
        .to_string();

        let avatar_url = row.uploaded_avatar_id.map_or_else(
            || letter_avatar_url(&row.username),
            |upload_id| self.uploads.path_for_upload(upload_id),
        );

        let category = match (&row.category_name, row.category_id) {
            (Some(name), Some(id)) => Some(FeedCategory {
                id,
                name: name.clone(),
                color: row.category_color.clone().unwrap_or_default(),
                text_color: row.category_text_color.clone().unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(FeedItem {
            id: row.id,
            post_number: row.post_number,
            created_at: row.created_at.clone(),
            updated_at: row.updated_at.clone(),
            excerpt,
            topic_id: row.topic_id,
            topic_title: row.topic_title.clone(),
            topic_slug: row.topic_slug.clone(),
            username: row.username.clone(),
            display_name,
            avatar_url,
            category,
            tags: row.tags.clone(),
        })
    }
}

/// Display name priority: display name, then full name, then username.
/// Blank strings count as absent.
fn resolve_display_name<'n>(
    display_name: Option<&'n str>,
    full_name: Option<&'n str>,
    username: &'n str,
) -> &'n str {
    display_name
        .filter(|s| !s.trim().is_empty())
        .or_else(|| full_name.filter(|s| !s.trim().is_empty()))
        .unwrap_or(username)
}

static MD_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid image regex"));
static MD_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid link regex"));
static MD_CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^```\S*").expect("valid code fence regex"));
static MD_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+").expect("valid heading regex"));
static MD_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^>\s?").expect("valid quote regex"));
static MD_EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*{1,3}|_{2,3}|`").expect("valid emphasis regex"));

/// Strip markup from a raw excerpt, producing plain text.
///
/// The source excerpt is cut mid-document at the query layer, so it can hold
/// arbitrary markdown and HTML fragments, including a sliced-open tag at the
/// end. Markdown syntax goes first (images drop, links keep their text), then
/// an HTML fragment parse drops residual tags, then whitespace runs collapse.
#[must_use]
pub fn strip_markup(raw: &str) -> String {
    let text = MD_IMAGE.replace_all(raw, "");
    let text = MD_LINK.replace_all(&text, "$1");
    let text = MD_CODE_FENCE.replace_all(&text, "");
    let text = MD_HEADING.replace_all(&text, "");
    let text = MD_QUOTE.replace_all(&text, "");
    let text = MD_EMPHASIS.replace_all(&text, "");

    let fragment = Html::parse_fragment(&text);
    let plain: String = fragment.root_element().text().collect();

    plain.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Word-boundary-aware truncation to at most `max_chars` characters.
///
/// Text at or under the bound passes through unchanged. Otherwise the first
/// `max_chars` characters are kept, cut back to the last space when that
/// space sits in the final fifth of the window, and `...` is appended. A
/// mid-word cut at exactly `max_chars` beats an overly short excerpt.
#[must_use]
pub fn truncate_excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }

    let window = &chars[..max_chars];
    let boundary_floor = max_chars * 4 / 5;

    let keep = match window.iter().rposition(|c| *c == ' ') {
        Some(pos) if pos >= boundary_floor => pos,
        _ => max_chars,
    };

    let mut out: String = chars[..keep].iter().collect();
    out.push_str("...");
    out
}
