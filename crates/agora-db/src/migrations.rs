use anyhow::Result;
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use agora_types::models::DEFAULT_CATEGORIES;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE sessions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at  TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_sessions_expires ON sessions(expires_at);

            CREATE TABLE categories (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE
            );

            CREATE TABLE posts (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                image_path  TEXT,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_posts_created ON posts(created_at);

            CREATE TABLE post_categories (
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                category_id TEXT NOT NULL REFERENCES categories(id),
                PRIMARY KEY (post_id, category_id)
            );

            CREATE INDEX idx_post_categories_category ON post_categories(category_id);

            CREATE TABLE comments (
                id          TEXT PRIMARY KEY,
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_comments_post ON comments(post_id, created_at);

            CREATE TABLE reactions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                comment_id  TEXT REFERENCES comments(id) ON DELETE CASCADE,
                type        TEXT NOT NULL CHECK (type IN ('like', 'dislike')),
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- One reaction per user per target. A NULL comment_id targets the post.
            CREATE UNIQUE INDEX idx_reactions_user_post
                ON reactions(user_id, post_id) WHERE comment_id IS NULL;
            CREATE UNIQUE INDEX idx_reactions_user_comment
                ON reactions(user_id, comment_id) WHERE comment_id IS NOT NULL;

            CREATE INDEX idx_reactions_target ON reactions(post_id, comment_id, type);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    seed_categories(conn)?;

    info!("Database migrations complete");
    Ok(())
}

fn seed_categories(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO categories (id, name) VALUES (?1, ?2)")?;
    let mut inserted = 0;
    for name in DEFAULT_CATEGORIES {
        inserted += stmt.execute((Uuid::new_v4().to_string(), name))?;
    }
    if inserted > 0 {
        info!("Seeded {} categories", inserted);
    }
    Ok(())
}
