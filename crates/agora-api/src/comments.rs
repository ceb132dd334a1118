use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use agora_types::api::{CommentCountResponse, CommentResponse, CreateCommentRequest};

use crate::auth::AppState;
use crate::error::{ApiError, ApiJson, ApiPath};
use crate::middleware::AuthUser;
use crate::posts::{parse_id, parse_timestamp};
use crate::run_blocking;

const MAX_COMMENT_CHARS: usize = 2_000;

pub async fn list_comments(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(move || {
        let post_id = post_id.to_string();
        if !state.db.post_exists(&post_id)? {
            return Err(ApiError::NotFound("Post not found"));
        }
        Ok(state.db.get_comments(&post_id)?)
    })
    .await?;

    let comments: Vec<CommentResponse> = rows
        .into_iter()
        .map(|row| CommentResponse {
            id: parse_id(&row.id, "comment id"),
            post_id: parse_id(&row.post_id, "comment post"),
            user_id: parse_id(&row.user_id, "comment author"),
            username: row.username,
            content: row.content,
            created_at: parse_timestamp(&row.created_at),
        })
        .collect();

    Ok(Json(comments))
}

/// Responds with the post's comment count after the insert.
pub async fn create_comment(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::Validation("Comment cannot be empty".into()));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(ApiError::Validation(format!(
            "Comment cannot exceed {} characters",
            MAX_COMMENT_CHARS
        )));
    }

    let comment_count = run_blocking(move || {
        let post_id = post_id.to_string();
        if !state.db.post_exists(&post_id)? {
            return Err(ApiError::NotFound("Post not found"));
        }
        let comment_id = Uuid::new_v4().to_string();
        Ok(state
            .db
            .create_comment(&comment_id, &post_id, &auth.user_id, &content)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(CommentCountResponse { comment_count })))
}
