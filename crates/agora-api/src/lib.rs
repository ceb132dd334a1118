pub mod auth;
pub mod categories;
pub mod comments;
pub mod credentials;
pub mod error;
pub mod middleware;
pub mod posts;
pub mod reactions;
pub mod session;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tracing::error;

use crate::auth::AppState;
use crate::error::ApiError;

/// All `/api` routes. Protected routes go through the session middleware;
/// the rest serve anonymous callers.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/posts", get(posts::list_posts))
        .route("/api/posts/{post_id}/comments", get(comments::list_comments))
        .route("/api/categories", get(categories::list_categories))
        .route(
            "/api/categories/{category_id}/posts",
            get(categories::get_category_posts),
        );

    let protected_routes = Router::new()
        .route("/api/check-auth", get(auth::check_auth))
        .route("/api/posts", post(posts::create_post))
        .route("/api/posts/{post_id}/comments", post(comments::create_comment))
        .route("/api/posts/{post_id}/react", post(reactions::react_to_post))
        .route(
            "/api/posts/{post_id}/comments/{comment_id}/react",
            post(reactions::react_to_comment),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Run blocking store work (SQLite, Argon2) off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Storage(e.into())
    })?
}
