use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Run all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    create_migration_table(pool).await?;
    let current_version = get_schema_version(pool).await?;

    if current_version < 1 {
        debug!("Running migration v1");
        run_migration_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    Ok(())
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS _schema_version (
            version INTEGER NOT NULL
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create schema version table")?;
    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM _schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .context("Failed to read schema version")?;
    Ok(row.map_or(0, |(v,)| v))
}

async fn set_schema_version(pool: &SqlitePool, version: i64) -> Result<()> {
    sqlx::query("DELETE FROM _schema_version")
        .execute(pool)
        .await
        .context("Failed to clear schema version")?;
    sqlx::query("INSERT INTO _schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await
        .context("Failed to set schema version")?;
    Ok(())
}

/// Initial schema: the forum tables the feed reads, mirrored from the
/// upstream forum database by the ingest path.
async fn run_migration_v1(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v1: creating initial schema");

    // Users table
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            display_name TEXT,
            name TEXT,
            uploaded_avatar_id INTEGER
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    // Categories table
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            color TEXT NOT NULL DEFAULT '0088CC',
            text_color TEXT NOT NULL DEFAULT 'FFFFFF',
            read_restricted INTEGER NOT NULL DEFAULT 0
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create categories table")?;

    // Explicit read grants for restricted categories
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS category_users (
            category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY (category_id, user_id)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create category_users table")?;

    // Topics table
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS topics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            slug TEXT NOT NULL,
            archetype TEXT NOT NULL DEFAULT 'regular',
            visible INTEGER NOT NULL DEFAULT 1,
            deleted_at TEXT,
            category_id INTEGER REFERENCES categories(id)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create topics table")?;

    // Posts table
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            topic_id INTEGER NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id),
            post_number INTEGER NOT NULL,
            raw TEXT NOT NULL,
            hidden INTEGER NOT NULL DEFAULT 0,
            deleted_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create posts table")?;

    // Tags table and topic join
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create tags table")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS topic_tags (
            topic_id INTEGER NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
            tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create topic_tags table")?;

    // The feed orders by post recency
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at DESC)")
        .execute(pool)
        .await
        .context("Failed to create posts created_at index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_topic_id ON posts(topic_id)")
        .execute(pool)
        .await
        .context("Failed to create posts topic_id index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_topic_tags_topic_id ON topic_tags(topic_id)")
        .execute(pool)
        .await
        .context("Failed to create topic_tags index")?;

    Ok(())
}
