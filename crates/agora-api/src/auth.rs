use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use time::OffsetDateTime;
use tracing::info;

use agora_db::Database;
use agora_types::api::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RegisterResponse};
use agora_types::models::User;

use crate::credentials::CredentialVerifier;
use crate::error::{ApiError, ApiJson};
use crate::middleware::AuthUser;
use crate::reactions::ReactionEngine;
use crate::run_blocking;
use crate::session::{SESSION_COOKIE, SessionStore};

pub type AppState = Arc<AppStateInner>;

/// Explicit handles for every component; there is no global store.
pub struct AppStateInner {
    pub db: Arc<Database>,
    pub sessions: SessionStore,
    pub credentials: CredentialVerifier,
    pub reactions: ReactionEngine,
    /// Adds the `Secure` attribute to the session cookie.
    pub cookie_secure: bool,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, session_ttl: chrono::Duration, cookie_secure: bool) -> anyhow::Result<Self> {
        Ok(Self {
            sessions: SessionStore::new(db.clone(), session_ttl),
            credentials: CredentialVerifier::new(db.clone())?,
            reactions: ReactionEngine::new(db.clone()),
            db,
            cookie_secure,
        })
    }
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Argon2 hashing runs on the blocking pool
    let user_id =
        run_blocking(move || state.credentials.register(&req.username, &req.password)).await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id })))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let secure = state.cookie_secure;

    let (user, token, expires_at) = run_blocking(move || {
        let user = state.credentials.login(&req.username, &req.password)?;
        let (token, expires_at) = state.sessions.create_session(&user.id.to_string())?;
        Ok((user, token, expires_at))
    })
    .await?;

    info!("User {} logged in", user.username);

    let cookie = session_cookie(token, expires_at, secure)?;
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            user_id: user.id,
            username: user.username,
            expires_at,
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let not_logged_in = || ApiError::Validation("Not logged in".into());

    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(not_logged_in)?;

    run_blocking(move || state.sessions.invalidate(&token))
        .await
        .map_err(|e| match e {
            ApiError::NotAuthenticated => not_logged_in(),
            other => other,
        })?;

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((
        jar,
        Json(MessageResponse {
            message: "Logout successful".into(),
        }),
    ))
}

pub async fn check_auth(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_blocking(move || Ok(state.db.get_user_by_id(&auth.user_id)?))
        .await?
        .ok_or(ApiError::NotAuthenticated)?;

    let id: uuid::Uuid = row
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("Corrupt user id '{}': {}", row.id, e))?;

    Ok(Json(User {
        id,
        username: row.username,
    }))
}

fn session_cookie(
    token: String,
    expires_at: DateTime<Utc>,
    secure: bool,
) -> Result<Cookie<'static>, ApiError> {
    let expires = OffsetDateTime::from_unix_timestamp(expires_at.timestamp())
        .map_err(|e| anyhow::anyhow!("Cookie expiry out of range: {}", e))?;

    Ok(Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .expires(expires)
        .build())
}
