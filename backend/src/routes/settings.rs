use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tracing::instrument;

use crate::errors::AppError;
use crate::models::user_settings::{UpdateUserSettingsRequest, UserSettings};
use crate::routes::extract::AuthenticatedUser;
use crate::services::settings_service;
use crate::state::AppState;

pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/", get(get_settings_handler).put(update_settings_handler))
}

/// Returns the user's settings, creating the row with defaults on first
/// access.
#[instrument(skip(state), err)]
pub async fn get_settings_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UserSettings>, AppError> {
    let settings = settings_service::get_or_create(&state.pool, user.id).await?;
    Ok(Json(settings))
}

/// Applies a partial settings update.
#[instrument(skip(state, payload), err)]
pub async fn update_settings_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<UpdateUserSettingsRequest>,
) -> Result<Json<UserSettings>, AppError> {
    let settings = settings_service::update(&state.pool, user.id, payload).await?;
    Ok(Json(settings))
}
