use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use serde::Deserialize;
use tracing::instrument;

use crate::errors::AppError;
use crate::routes::extract::AuthenticatedUser;
use crate::services::chat_service::{self, ChatTurn};
use crate::state::AppState;

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(send_message_handler))
        .route("/stream", post(stream_message_handler))
}

/// Request body for sending a chat message.
#[derive(Deserialize, Debug)]
pub struct ChatMessageRequest {
    pub message: String,
    pub model: Option<String>,
}

/// One turn-based chat exchange: the reply is returned whole once the model
/// has finished (or the fallback text, if it hasn't answered at all).
#[instrument(skip(state, payload), err)]
pub async fn send_message_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ChatMessageRequest>,
) -> Result<Json<ChatTurn>, AppError> {
    let turn = chat_service::send_message(&state, user.id, payload.message, payload.model).await?;
    Ok(Json(turn))
}

/// Incremental chat: text fragments are relayed to the client as the model
/// produces them, ending when the upstream connection closes.
#[instrument(skip(state, payload), err)]
pub async fn stream_message_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ChatMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let fragments =
        chat_service::stream_message(&state, user.id, payload.message, payload.model).await?;

    let body = Body::from_stream(fragments.map(|fragment| fragment.map(Bytes::from)));
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    ))
}
