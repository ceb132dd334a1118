use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use agora_db::Database;
use agora_db::models::{CategoryRow, PostRow};
use agora_types::api::{CreatePostRequest, PostResponse};
use agora_types::models::Category;

use crate::auth::AppState;
use crate::error::{ApiError, ApiJson};
use crate::middleware::{AuthUser, optional_viewer};
use crate::run_blocking;

const MAX_CONTENT_CHARS: usize = 10_000;
const MAX_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct PostQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn list_posts(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<PostQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = optional_viewer(&state, &jar).await;
    let limit = query.limit.min(MAX_PAGE);

    let posts = run_blocking(move || {
        let rows = state.db.list_posts(viewer.as_deref(), limit)?;
        load_post_responses(&state.db, rows)
    })
    .await?;

    Ok(Json(posts))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::Validation("Post cannot be empty".into()));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ApiError::Validation(format!(
            "Post cannot exceed {} characters",
            MAX_CONTENT_CHARS
        )));
    }

    let category_ids: Vec<String> = req.category_ids.iter().map(Uuid::to_string).collect();
    let post_id = Uuid::new_v4().to_string();

    let post = run_blocking(move || {
        if !state.db.categories_exist(&category_ids)? {
            return Err(ApiError::Validation("Unknown category".into()));
        }

        state
            .db
            .create_post(&post_id, &auth.user_id, &content, &category_ids)?;

        let row = state
            .db
            .get_post(&post_id, Some(&auth.user_id))?
            .ok_or_else(|| anyhow::anyhow!("Post {} vanished after insert", post_id))?;

        let mut posts = load_post_responses(&state.db, vec![row])?;
        posts
            .pop()
            .ok_or_else(|| ApiError::Storage(anyhow::anyhow!("Post {} not loaded", post_id)))
    })
    .await?;

    info!("Post {} created by {}", post.id, post.username);
    Ok((StatusCode::CREATED, Json(post)))
}

/// Attach categories to post rows and convert them to API responses.
pub(crate) fn load_post_responses(
    db: &Database,
    rows: Vec<PostRow>,
) -> Result<Vec<PostResponse>, ApiError> {
    let post_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let pairs = db.get_categories_for_posts(&post_ids)?;

    let mut category_map: HashMap<String, Vec<Category>> = HashMap::new();
    for (post_id, row) in pairs {
        category_map
            .entry(post_id)
            .or_default()
            .push(category_response(row));
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let categories = category_map.remove(&row.id).unwrap_or_default();
            PostResponse {
                id: parse_id(&row.id, "post id"),
                user_id: parse_id(&row.user_id, "post author"),
                username: row.username,
                content: row.content,
                image_path: row.image_path,
                categories,
                created_at: parse_timestamp(&row.created_at),
                likes: row.likes,
                dislikes: row.dislikes,
                comment_count: row.comment_count,
                user_vote: row.user_vote,
            }
        })
        .collect())
}

pub(crate) fn category_response(row: CategoryRow) -> Category {
    Category {
        id: parse_id(&row.id, "category id"),
        name: row.name,
    }
}

pub(crate) fn parse_id(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone; it is UTC.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
