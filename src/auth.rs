//! Viewer identity and category access.
//!
//! Session handling belongs to the forum's front-end; this service sits
//! behind it and trusts the authenticated user id the proxy injects. The
//! allowed-category set is computed once per request and passed explicitly
//! into the feed query, never looked up from ambient state inside it.

use std::collections::HashSet;

use axum::http::HeaderMap;
use sqlx::SqlitePool;

use crate::feed::FeedError;

/// Header carrying the authenticated forum user id, set by the front-end
/// proxy. Absent or unparseable means anonymous.
pub const VIEWER_HEADER: &str = "x-forum-user-id";

/// Resolve the requesting viewer from proxy headers.
#[must_use]
pub fn viewer_from_headers(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(VIEWER_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// The set of read-restricted category ids the viewer may read.
///
/// Unrestricted categories need no grant and are not listed here; the feed
/// query admits them unconditionally. Anonymous viewers get an empty set.
///
/// # Errors
///
/// Returns [`FeedError::Query`] if the grant lookup fails.
pub async fn allowed_category_ids(
    pool: &SqlitePool,
    viewer: Option<i64>,
) -> Result<HashSet<i64>, FeedError> {
    let Some(user_id) = viewer else {
        return Ok(HashSet::new());
    };

    let rows: Vec<(i64,)> = sqlx::query_as("SELECT category_id FROM category_users WHERE user_id = ?")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(FeedError::Query)?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}
