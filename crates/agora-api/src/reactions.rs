use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use tracing::debug;
use uuid::Uuid;

use agora_db::Database;
use agora_types::api::ReactRequest;
use agora_types::reaction::{ReactionCounts, ReactionKind, ReactionTarget};

use crate::auth::AppState;
use crate::error::{ApiError, ApiJson, ApiPath};
use crate::middleware::AuthUser;
use crate::run_blocking;

/// Applies like/dislike toggles and reports the committed aggregate.
pub struct ReactionEngine {
    db: Arc<Database>,
}

impl ReactionEngine {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Move the user's reaction on `target` towards `desired` ("like" or
    /// "dislike"): same kind clears it, the other kind flips it, no reaction
    /// creates one. Counts are read back from storage after the write.
    pub fn react(
        &self,
        user_id: &str,
        target: &ReactionTarget,
        desired: &str,
    ) -> Result<ReactionCounts, ApiError> {
        let desired = desired
            .parse::<ReactionKind>()
            .map_err(|e| ApiError::Validation(e.to_string()))?;

        if !self.db.target_exists(target)? {
            return Err(ApiError::NotFound(match target.comment_id {
                Some(_) => "Comment not found",
                None => "Post not found",
            }));
        }

        let outcome =
            self.db
                .apply_reaction(&Uuid::new_v4().to_string(), user_id, target, desired)?;

        debug!(
            "Reaction {:?} by {} on post {} (comment {:?}), now {:?}",
            outcome.transition,
            user_id,
            target.post_id,
            target.comment_id,
            outcome.transition.resulting_state()
        );
        Ok(outcome.counts)
    }
}

pub async fn react_to_post(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<ReactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target = ReactionTarget::post(post_id.to_string());
    let counts =
        run_blocking(move || state.reactions.react(&auth.user_id, &target, &req.kind)).await?;

    Ok(Json(counts))
}

pub async fn react_to_comment(
    State(state): State<AppState>,
    ApiPath((post_id, comment_id)): ApiPath<(Uuid, Uuid)>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(req): ApiJson<ReactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target = ReactionTarget::comment(post_id.to_string(), comment_id.to_string());
    let counts =
        run_blocking(move || state.reactions.react(&auth.user_id, &target, &req.kind)).await?;

    Ok(Json(counts))
}
