use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use tracing::warn;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;
use crate::session::SESSION_COOKIE;

/// The caller of a protected route, resolved from the session cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Validate the `session_id` cookie against the session store.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(ApiError::NotAuthenticated)?;

    let user_id = run_blocking(move || state.sessions.validate(&token)).await?;

    req.extensions_mut().insert(AuthUser { user_id });
    Ok(next.run(req).await)
}

/// Resolve the session cookie if present, for routes that serve anonymous
/// callers too. Any failure degrades to anonymous.
pub async fn optional_viewer(state: &AppState, jar: &CookieJar) -> Option<String> {
    let token = jar.get(SESSION_COOKIE)?.value().to_string();
    let state = state.clone();

    match run_blocking(move || state.sessions.validate(&token)).await {
        Ok(user_id) => Some(user_id),
        Err(ApiError::NotAuthenticated) => None,
        Err(e) => {
            warn!("Viewer lookup failed: {}", e);
            None
        }
    }
}
