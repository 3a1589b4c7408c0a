use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One raw result row of the latest-replies query, typed at the query
/// boundary so projection never touches loosely-typed column access.
///
/// Nullable columns are explicit: a post may have no category, an author may
/// have no display name or uploaded avatar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFeedRow {
    pub id: i64,
    pub post_number: i64,
    pub created_at: String,
    pub updated_at: String,
    /// Body excerpt pre-truncated at the source, may contain raw markup.
    pub excerpt: String,
    pub topic_id: i64,
    pub topic_title: String,
    pub topic_slug: String,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
    pub category_text_color: Option<String>,
    pub user_id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub full_name: Option<String>,
    pub uploaded_avatar_id: Option<i64>,
    /// Deduplicated tag names, empty when the topic has none. Order is not
    /// guaranteed.
    pub tags: Vec<String>,
}

/// Flat sqlx mapping of the feed query before tag-list decoding.
#[derive(Debug, FromRow)]
pub(crate) struct FeedRowRecord {
    pub id: i64,
    pub post_number: i64,
    pub created_at: String,
    pub updated_at: String,
    pub excerpt: String,
    pub topic_id: i64,
    pub topic_title: String,
    pub topic_slug: String,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
    pub category_text_color: Option<String>,
    pub user_id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub full_name: Option<String>,
    pub uploaded_avatar_id: Option<i64>,
    /// `GROUP_CONCAT(DISTINCT ...)` output: comma-joined or NULL.
    pub tags: Option<String>,
}

impl From<FeedRowRecord> for RawFeedRow {
    fn from(record: FeedRowRecord) -> Self {
        let tags = record.tags.map_or_else(Vec::new, |joined| {
            joined
                .split(',')
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        });

        Self {
            id: record.id,
            post_number: record.post_number,
            created_at: record.created_at,
            updated_at: record.updated_at,
            excerpt: record.excerpt,
            topic_id: record.topic_id,
            topic_title: record.topic_title,
            topic_slug: record.topic_slug,
            category_id: record.category_id,
            category_name: record.category_name,
            category_color: record.category_color,
            category_text_color: record.category_text_color,
            user_id: record.user_id,
            username: record.username,
            display_name: record.display_name,
            full_name: record.full_name,
            uploaded_avatar_id: record.uploaded_avatar_id,
            tags,
        }
    }
}

/// Data for inserting a new user via the ingest path.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub display_name: Option<String>,
    pub full_name: Option<String>,
    pub uploaded_avatar_id: Option<i64>,
}

/// Data for inserting a new category via the ingest path.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub color: String,
    pub text_color: String,
    pub read_restricted: bool,
}

/// Data for inserting a new topic via the ingest path.
#[derive(Debug, Clone)]
pub struct NewTopic {
    pub title: String,
    pub slug: String,
    pub archetype: String,
    pub visible: bool,
    pub category_id: Option<i64>,
}

impl NewTopic {
    /// A visible, regular-archetype topic, the common case.
    #[must_use]
    pub fn regular(title: &str, slug: &str, category_id: Option<i64>) -> Self {
        Self {
            title: title.to_string(),
            slug: slug.to_string(),
            archetype: "regular".to_string(),
            visible: true,
            category_id,
        }
    }
}

/// Data for inserting a new post via the ingest path.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub topic_id: i64,
    pub user_id: i64,
    pub post_number: i64,
    pub raw: String,
    pub hidden: bool,
    /// Explicit creation timestamp (`YYYY-MM-DD HH:MM:SS`); `None` means now.
    pub created_at: Option<String>,
}
