use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

use super::models::{FeedRowRecord, NewCategory, NewPost, NewTopic, NewUser, RawFeedRow};
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, RAW_EXCERPT_CHARS};
use crate::feed::FeedError;

// ========== Latest Replies Feed ==========

/// Normalize a requested page size to the inclusive range `[1, MAX_PAGE_SIZE]`.
///
/// Degenerate requests (zero or negative) fall back to the default rather
/// than being rejected.
#[must_use]
pub fn clamp_limit(limit: i64) -> i64 {
    if limit <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        limit.min(MAX_PAGE_SIZE)
    }
}

/// Fetch the most recent replies across all visible topics, newest first.
///
/// A post qualifies only if it is not the topic's opening post, not deleted,
/// not hidden, and its topic is a visible, non-deleted regular topic whose
/// category is either absent, unrestricted, or in `allowed_category_ids`.
/// The visibility filter is applied inside the query so restricted content
/// never leaves the database and the LIMIT bounds the real result set.
///
/// Tag names are aggregated per post with duplicates removed; the excerpt is
/// pre-truncated at the source. Ties on `created_at` break by post id
/// descending so the ordering is deterministic.
///
/// # Errors
///
/// Returns [`FeedError::Query`] if the query fails. An empty result is
/// success with an empty vector.
pub async fn fetch_latest_replies(
    pool: &SqlitePool,
    allowed_category_ids: &HashSet<i64>,
    limit: i64,
) -> Result<Vec<RawFeedRow>, FeedError> {
    let limit = clamp_limit(limit);

    // Restricted categories only qualify through an explicit grant, so with
    // an empty allowed set the IN arm is dropped entirely.
    let category_clause = if allowed_category_ids.is_empty() {
        "(c.id IS NULL OR c.read_restricted = 0)".to_string()
    } else {
        let placeholders = vec!["?"; allowed_category_ids.len()].join(", ");
        format!("(c.id IS NULL OR c.read_restricted = 0 OR c.id IN ({placeholders}))")
    };

    let sql = format!(
        r"
        SELECT
            p.id,
            p.post_number,
            p.created_at,
            p.updated_at,
            substr(p.raw, 1, {RAW_EXCERPT_CHARS}) AS excerpt,
            p.topic_id,
            t.title AS topic_title,
            t.slug AS topic_slug,
            t.category_id,
            c.name AS category_name,
            c.color AS category_color,
            c.text_color AS category_text_color,
            u.id AS user_id,
            u.username,
            u.display_name,
            u.name AS full_name,
            u.uploaded_avatar_id,
            GROUP_CONCAT(DISTINCT tag.name) AS tags
        FROM posts p
        INNER JOIN topics t ON t.id = p.topic_id
        INNER JOIN users u ON u.id = p.user_id
        LEFT JOIN categories c ON c.id = t.category_id
        LEFT JOIN topic_tags tt ON tt.topic_id = t.id
        LEFT JOIN tags tag ON tag.id = tt.tag_id
        WHERE p.post_number > 1
          AND p.deleted_at IS NULL
          AND t.deleted_at IS NULL
          AND t.archetype = 'regular'
          AND t.visible = 1
          AND p.hidden = 0
          AND {category_clause}
        GROUP BY p.id
        ORDER BY p.created_at DESC, p.id DESC
        LIMIT ?
        "
    );

    let mut query = sqlx::query_as::<_, FeedRowRecord>(&sql);

    // Bind in sorted order so the statement is deterministic for a given set.
    let mut ids: Vec<i64> = allowed_category_ids.iter().copied().collect();
    ids.sort_unstable();
    for id in ids {
        query = query.bind(id);
    }
    query = query.bind(limit);

    let records = query.fetch_all(pool).await.map_err(FeedError::Query)?;

    Ok(records.into_iter().map(RawFeedRow::from).collect())
}

// ========== Ingest Helpers ==========
//
// The feed is a pure read path; these writers exist for the sync job that
// mirrors the forum database, and for test fixtures.

/// Insert a new user, returning its ID.
pub async fn insert_user(pool: &SqlitePool, user: &NewUser) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO users (username, display_name, name, uploaded_avatar_id)
        VALUES (?, ?, ?, ?)
        ",
    )
    .bind(&user.username)
    .bind(&user.display_name)
    .bind(&user.full_name)
    .bind(user.uploaded_avatar_id)
    .execute(pool)
    .await
    .context("Failed to insert user")?;

    Ok(result.last_insert_rowid())
}

/// Insert a new category, returning its ID.
pub async fn insert_category(pool: &SqlitePool, category: &NewCategory) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO categories (name, color, text_color, read_restricted)
        VALUES (?, ?, ?, ?)
        ",
    )
    .bind(&category.name)
    .bind(&category.color)
    .bind(&category.text_color)
    .bind(category.read_restricted)
    .execute(pool)
    .await
    .context("Failed to insert category")?;

    Ok(result.last_insert_rowid())
}

/// Grant a user read access to a restricted category.
pub async fn grant_category_access(pool: &SqlitePool, category_id: i64, user_id: i64) -> Result<()> {
    sqlx::query(
        r"
        INSERT OR IGNORE INTO category_users (category_id, user_id)
        VALUES (?, ?)
        ",
    )
    .bind(category_id)
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to grant category access")?;

    Ok(())
}

/// Insert a new topic, returning its ID.
pub async fn insert_topic(pool: &SqlitePool, topic: &NewTopic) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO topics (title, slug, archetype, visible, category_id)
        VALUES (?, ?, ?, ?, ?)
        ",
    )
    .bind(&topic.title)
    .bind(&topic.slug)
    .bind(&topic.archetype)
    .bind(topic.visible)
    .bind(topic.category_id)
    .execute(pool)
    .await
    .context("Failed to insert topic")?;

    Ok(result.last_insert_rowid())
}

/// Insert a new post, returning its ID.
pub async fn insert_post(pool: &SqlitePool, post: &NewPost) -> Result<i64> {
    let created_at = post
        .created_at
        .clone()
        .unwrap_or_else(|| Utc::now().format("%Y-%m-%d %H:%M:%S").to_string());

    let result = sqlx::query(
        r"
        INSERT INTO posts (topic_id, user_id, post_number, raw, hidden, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(post.topic_id)
    .bind(post.user_id)
    .bind(post.post_number)
    .bind(&post.raw)
    .bind(post.hidden)
    .bind(&created_at)
    .bind(&created_at)
    .execute(pool)
    .await
    .context("Failed to insert post")?;

    Ok(result.last_insert_rowid())
}

/// Soft-delete a post.
pub async fn soft_delete_post(pool: &SqlitePool, post_id: i64) -> Result<()> {
    sqlx::query("UPDATE posts SET deleted_at = datetime('now') WHERE id = ?")
        .bind(post_id)
        .execute(pool)
        .await
        .context("Failed to soft-delete post")?;

    Ok(())
}

/// Soft-delete a topic.
pub async fn soft_delete_topic(pool: &SqlitePool, topic_id: i64) -> Result<()> {
    sqlx::query("UPDATE topics SET deleted_at = datetime('now') WHERE id = ?")
        .bind(topic_id)
        .execute(pool)
        .await
        .context("Failed to soft-delete topic")?;

    Ok(())
}

/// Get a tag id by name, creating the tag if it does not exist.
pub async fn get_or_create_tag(pool: &SqlitePool, name: &str) -> Result<i64> {
    sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await
        .context("Failed to insert tag")?;

    let (id,): (i64,) = sqlx::query_as("SELECT id FROM tags WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await
        .context("Failed to fetch tag id")?;

    Ok(id)
}

/// Associate a tag with a topic. The join carries no uniqueness constraint
/// upstream, so duplicate rows are possible and the feed query must tolerate
/// them.
pub async fn tag_topic(pool: &SqlitePool, topic_id: i64, tag_id: i64) -> Result<()> {
    sqlx::query("INSERT INTO topic_tags (topic_id, tag_id) VALUES (?, ?)")
        .bind(topic_id)
        .bind(tag_id)
        .execute(pool)
        .await
        .context("Failed to tag topic")?;

    Ok(())
}
