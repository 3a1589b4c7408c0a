use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::auth;
use crate::db::fetch_latest_replies;
use crate::feed::{FeedError, FeedItem, FeedRowProjector};

/// Generic error message surfaced to callers. Failure detail goes only to
/// the operator log.
const INTERNAL_ERROR_MESSAGE: &str = "Erro interno do servidor";

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/latest-replies", get(latest_replies))
        .route("/healthz", get(health))
}

#[derive(Debug, Deserialize)]
pub struct LatestRepliesParams {
    /// Requested page size. Kept as a raw string so a malformed value is
    /// silently normalized to the default instead of rejected.
    limit: Option<String>,
}

/// Response envelope for the latest-replies feed.
#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub posts: Vec<FeedItem>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FeedResponse {
    fn success(posts: Vec<FeedItem>) -> Self {
        Self {
            posts,
            success: true,
            error: None,
        }
    }

    fn failure() -> Self {
        Self {
            posts: Vec::new(),
            success: false,
            error: Some(INTERNAL_ERROR_MESSAGE.to_string()),
        }
    }
}

/// Handler for the latest-replies feed (GET /latest-replies).
async fn latest_replies(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<LatestRepliesParams>,
) -> Response {
    if !state.config.feed_enabled {
        return (StatusCode::NOT_FOUND, "Feed disabled").into_response();
    }

    // Missing or non-numeric values land on 0, which the query layer
    // normalizes to the default page size.
    let limit = params
        .limit
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(0);

    let viewer = auth::viewer_from_headers(&headers);

    let allowed = match auth::allowed_category_ids(state.db.pool(), viewer).await {
        Ok(allowed) => allowed,
        Err(e) => return failure_response(&e),
    };

    let rows = match fetch_latest_replies(state.db.pool(), &allowed, limit).await {
        Ok(rows) => rows,
        Err(e) => return failure_response(&e),
    };

    let projector = FeedRowProjector::new(state.uploads.as_ref());
    let mut posts = Vec::with_capacity(rows.len());
    for row in &rows {
        match projector.project(row) {
            Ok(item) => posts.push(item),
            // All-or-nothing: one bad row fails the whole request.
            Err(e) => return failure_response(&e),
        }
    }

    (StatusCode::OK, Json(FeedResponse::success(posts))).into_response()
}

/// Convert a feed failure into the generic envelope, logging the detail.
fn failure_response(error: &FeedError) -> Response {
    tracing::error!(error = ?error, "Failed to build latest replies feed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(FeedResponse::failure()),
    )
        .into_response()
}

async fn health() -> &'static str {
    "OK"
}
