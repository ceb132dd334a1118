use crate::models::{CategoryRow, CommentRow, PostRow, UserRow};
use crate::{Database, is_unique_violation};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

/// Post columns plus aggregates. `?1` is the viewer's user id (NULL when
/// anonymous) and drives `user_vote`.
const POST_SELECT: &str = "
    SELECT p.id, p.user_id, u.username, p.content, p.image_path, p.created_at,
           (SELECT COUNT(*) FROM reactions r
             WHERE r.post_id = p.id AND r.comment_id IS NULL AND r.type = 'like'),
           (SELECT COUNT(*) FROM reactions r
             WHERE r.post_id = p.id AND r.comment_id IS NULL AND r.type = 'dislike'),
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id),
           COALESCE((SELECT CASE r.type WHEN 'like' THEN 1 ELSE -1 END FROM reactions r
             WHERE r.post_id = p.id AND r.comment_id IS NULL AND r.user_id = ?1), 0)
    FROM posts p
    JOIN users u ON u.id = p.user_id";

impl Database {
    // -- Users --

    /// Returns `false` when the UNIQUE constraint on `username` rejects the row.
    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            match conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            ) {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Posts --

    pub fn create_post(
        &self,
        id: &str,
        user_id: &str,
        content: &str,
        category_ids: &[String],
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO posts (id, user_id, content) VALUES (?1, ?2, ?3)",
                (id, user_id, content),
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO post_categories (post_id, category_id) VALUES (?1, ?2)",
                )?;
                for category_id in category_ids {
                    stmt.execute((id, category_id))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn post_exists(&self, post_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM posts WHERE id = ?1", [post_id], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn get_post(&self, post_id: &str, viewer_id: Option<&str>) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE p.id = ?2", POST_SELECT);
            let row = conn
                .query_row(&sql, rusqlite::params![viewer_id, post_id], map_post)
                .optional()?;
            Ok(row)
        })
    }

    /// Newest first.
    pub fn list_posts(&self, viewer_id: Option<&str>, limit: u32) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} ORDER BY p.created_at DESC, p.rowid DESC LIMIT ?2",
                POST_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![viewer_id, limit], map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_posts_by_category(
        &self,
        category_id: &str,
        viewer_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} JOIN post_categories pc ON pc.post_id = p.id
                 WHERE pc.category_id = ?2
                 ORDER BY p.created_at DESC, p.rowid DESC LIMIT ?3",
                POST_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![viewer_id, category_id, limit], map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch `(post_id, category)` pairs for a set of posts.
    pub fn get_categories_for_posts(
        &self,
        post_ids: &[String],
    ) -> Result<Vec<(String, CategoryRow)>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=post_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT pc.post_id, c.id, c.name
                 FROM post_categories pc
                 JOIN categories c ON c.id = pc.category_id
                 WHERE pc.post_id IN ({})
                 ORDER BY c.name",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(post_ids.iter()), |row| {
                    Ok((
                        row.get(0)?,
                        CategoryRow {
                            id: row.get(1)?,
                            name: row.get(2)?,
                        },
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Comments --

    /// Inserts the comment and returns the post's new comment count.
    pub fn create_comment(
        &self,
        id: &str,
        post_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, user_id, content) VALUES (?1, ?2, ?3, ?4)",
                (id, post_id, user_id, content),
            )?;
            query_comment_count(conn, post_id)
        })
    }

    /// Newest first.
    pub fn get_comments(&self, post_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.created_at
                 FROM comments c
                 JOIN users u ON u.id = c.user_id
                 WHERE c.post_id = ?1
                 ORDER BY c.created_at DESC, c.rowid DESC",
            )?;
            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        user_id: row.get(2)?,
                        username: row.get(3)?,
                        content: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Categories --

    pub fn list_categories(&self) -> Result<Vec<CategoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(CategoryRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// True when every id names an existing category.
    pub fn categories_exist(&self, category_ids: &[String]) -> Result<bool> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT 1 FROM categories WHERE id = ?1")?;
            for id in category_ids {
                if stmt.query_row([id], |_| Ok(())).optional()?.is_none() {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, password, created_at FROM users WHERE {} = ?1",
        column
    );
    let row = conn
        .query_row(&sql, [value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_comment_count(conn: &Connection, post_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
        [post_id],
        |r| r.get(0),
    )?;
    Ok(count)
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        content: row.get(3)?,
        image_path: row.get(4)?,
        created_at: row.get(5)?,
        likes: row.get(6)?,
        dislikes: row.get(7)?,
        comment_count: row.get(8)?,
        user_vote: row.get(9)?,
    })
}
