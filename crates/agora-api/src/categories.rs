use axum::{
    Json,
    extract::State,
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::auth::AppState;
use crate::error::{ApiError, ApiPath};
use crate::middleware::optional_viewer;
use crate::posts::{category_response, load_post_responses};
use crate::run_blocking;

const CATEGORY_PAGE: u32 = 50;

pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(move || Ok(state.db.list_categories()?)).await?;
    let categories: Vec<_> = rows.into_iter().map(category_response).collect();

    Ok(Json(categories))
}

pub async fn get_category_posts(
    State(state): State<AppState>,
    ApiPath(category_id): ApiPath<Uuid>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = optional_viewer(&state, &jar).await;

    let posts = run_blocking(move || {
        let rows = state.db.get_posts_by_category(
            &category_id.to_string(),
            viewer.as_deref(),
            CATEGORY_PAGE,
        )?;
        load_post_responses(&state.db, rows)
    })
    .await?;

    Ok(Json(posts))
}
