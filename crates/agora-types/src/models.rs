use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public view of a user. The password hash never leaves agora-db.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

/// Categories inserted on every startup (insert-or-ignore).
pub const DEFAULT_CATEGORIES: [&str; 8] = [
    "Technology",
    "Travel",
    "Food",
    "Lifestyle",
    "Sports",
    "Music",
    "Art",
    "Science",
];
