//! Integration tests for the HTTP surface.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serial_test::serial;
use tempfile::TempDir;
use tower::ServiceExt;

use discourse_latest_replies::config::Config;
use discourse_latest_replies::db::{
    grant_category_access, insert_category, insert_post, insert_topic, insert_user, Database,
    NewCategory, NewPost, NewTopic, NewUser,
};
use discourse_latest_replies::web::{create_app, AppState};

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

/// Create a test app with the given database.
fn create_test_app(db: Database, feed_enabled: bool) -> Router {
    std::env::set_var("WEB_HOST", "127.0.0.1");
    std::env::set_var("FEED_ENABLED", if feed_enabled { "true" } else { "false" });
    let config = Config::from_env().expect("Failed to create config");

    create_app(AppState::new(config, db))
}

async fn seed_reply(db: &Database, raw: &str) -> i64 {
    let user_id = insert_user(
        db.pool(),
        &NewUser {
            username: "alice".to_string(),
            display_name: Some("Alice A.".to_string()),
            full_name: None,
            uploaded_avatar_id: None,
        },
    )
    .await
    .unwrap();

    let topic_id = insert_topic(db.pool(), &NewTopic::regular("Hello", "hello", None))
        .await
        .unwrap();

    for (number, body) in [(1, "opening post"), (2, raw)] {
        insert_post(
            db.pool(),
            &NewPost {
                topic_id,
                user_id,
                post_number: number,
                raw: body.to_string(),
                hidden: false,
                created_at: Some(format!("2024-05-01 10:0{number}:00")),
            },
        )
        .await
        .unwrap();
    }

    user_id
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&body).expect("Body is not valid JSON")
}

#[tokio::test]
#[serial]
async fn test_latest_replies_success_envelope() {
    let (db, _temp_dir) = setup_db().await;
    seed_reply(&db, "A **bold** reply").await;
    let app = create_test_app(db, true);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/latest-replies")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["success"], true);
    assert!(json.get("error").is_none());

    let posts = json["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);

    let post = &posts[0];
    assert_eq!(post["post_number"], 2);
    assert_eq!(post["excerpt"], "A bold reply");
    assert_eq!(post["topic_title"], "Hello");
    assert_eq!(post["topic_slug"], "hello");
    assert_eq!(post["username"], "alice");
    assert_eq!(post["display_name"], "Alice A.");
    assert!(post["avatar_url"]
        .as_str()
        .unwrap()
        .starts_with("/letter_avatar_proxy/v4/letter/A/"));
    assert!(post["category"].is_null());
    assert_eq!(post["tags"].as_array().unwrap().len(), 0);
}

#[tokio::test]
#[serial]
async fn test_invalid_limit_is_normalized_not_rejected() {
    let (db, _temp_dir) = setup_db().await;
    seed_reply(&db, "a reply").await;
    let app = create_test_app(db, true);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/latest-replies?limit=abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["posts"].as_array().unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_restricted_category_respects_viewer_header() {
    let (db, _temp_dir) = setup_db().await;

    let user_id = seed_reply(&db, "staff only chatter").await;
    let staff = insert_category(
        db.pool(),
        &NewCategory {
            name: "staff".to_string(),
            color: "E45735".to_string(),
            text_color: "FFFFFF".to_string(),
            read_restricted: true,
        },
    )
    .await
    .unwrap();
    sqlx::query("UPDATE topics SET category_id = ?")
        .bind(staff)
        .execute(db.pool())
        .await
        .unwrap();
    grant_category_access(db.pool(), staff, user_id).await.unwrap();

    let app = create_test_app(db, true);

    // Anonymous viewer: restricted post is invisible
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/latest-replies")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["posts"].as_array().unwrap().len(), 0);

    // Granted viewer sees it, with the category shaped as an object
    let response = app
        .oneshot(
            Request::builder()
                .uri("/latest-replies")
                .header("x-forum-user-id", user_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    let posts = json["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["category"]["name"], "staff");
    assert_eq!(posts[0]["category"]["color"], "E45735");
}

#[tokio::test]
#[serial]
async fn test_disabled_feed_returns_404() {
    let (db, _temp_dir) = setup_db().await;
    let app = create_test_app(db, false);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/latest-replies")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn test_storage_failure_yields_generic_envelope() {
    let (db, _temp_dir) = setup_db().await;
    seed_reply(&db, "soon unreachable").await;

    // Closing the pool makes every subsequent query fail
    db.pool().close().await;
    let app = create_test_app(db, true);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/latest-replies")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Erro interno do servidor");
    assert_eq!(json["posts"].as_array().unwrap().len(), 0);
}

#[tokio::test]
#[serial]
async fn test_healthz() {
    let (db, _temp_dir) = setup_db().await;
    let app = create_test_app(db, true);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
