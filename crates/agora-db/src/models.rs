/// Database row types. These map directly to SQLite rows and are
/// distinct from the agora-types API models.

pub struct UserRow {
    pub id: String,
    pub username: String,
    /// Argon2 PHC string
    pub password: String,
    pub created_at: String,
}

/// A post joined with its author and aggregate counts.
pub struct PostRow {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    pub image_path: Option<String>,
    pub created_at: String,
    pub likes: i64,
    pub dislikes: i64,
    pub comment_count: i64,
    pub user_vote: i8,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    pub created_at: String,
}

pub struct CategoryRow {
    pub id: String,
    pub name: String,
}
