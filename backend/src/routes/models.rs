use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::errors::AppError;
use crate::llm::model_registry;
use crate::routes::extract::AuthenticatedUser;
use crate::services::chat_service;
use crate::state::AppState;

pub fn model_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_models_handler))
        .route("/update", post(update_model_handler))
}

#[derive(Deserialize, Debug)]
pub struct ModelUpdateRequest {
    pub model_name: String,
}

/// Lists the models the inference deployment serves.
pub async fn list_models_handler(
    AuthenticatedUser(_user): AuthenticatedUser,
) -> Json<serde_json::Value> {
    Json(json!({ "models": model_registry::AVAILABLE_MODELS }))
}

/// Changes the user's preferred model.
#[instrument(skip(state, payload), err)]
pub async fn update_model_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ModelUpdateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    chat_service::update_preferred_model(&state, user.id, payload.model_name).await?;
    Ok(Json(json!({ "status": "success" })))
}
