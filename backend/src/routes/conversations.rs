use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::conversations::{Conversation, ConversationInfo};
use crate::models::messages::Message;
use crate::routes::extract::AuthenticatedUser;
use crate::services::{chat_service, conversation_service};
use crate::state::AppState;

pub fn conversation_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_conversations_handler))
        .route("/new", post(new_conversation_handler))
        .route("/current/messages", get(current_messages_handler))
        .route(
            "/{conversation_id}/switch",
            post(switch_conversation_handler),
        )
        .route(
            "/{conversation_id}/archive",
            post(archive_conversation_handler),
        )
        .route(
            "/{conversation_id}",
            axum::routing::delete(delete_conversation_handler),
        )
}

/// Lists the user's conversations, newest first.
#[instrument(skip(state), err)]
pub async fn list_conversations_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<ConversationInfo>>, AppError> {
    let conversations = conversation_service::list(&state.pool, user.id).await?;
    Ok(Json(conversations))
}

/// Archives the current conversation and starts a fresh one.
#[instrument(skip(state), err)]
pub async fn new_conversation_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Conversation>, AppError> {
    let conversation = conversation_service::start_new(&state.pool, user.id).await?;
    Ok(Json(conversation))
}

/// Messages of the active conversation, in insertion order.
#[instrument(skip(state), err)]
pub async fn current_messages_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages = chat_service::conversation_history(&state, user.id).await?;
    Ok(Json(messages))
}

/// Makes another conversation the active one.
#[instrument(skip(state), err)]
pub async fn switch_conversation_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    conversation_service::switch(&state.pool, user.id, conversation_id).await?;
    Ok(Json(json!({ "status": "success" })))
}

/// Archives a conversation without hiding its history.
#[instrument(skip(state), err)]
pub async fn archive_conversation_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    conversation_service::archive(&state.pool, user.id, conversation_id).await?;
    Ok(Json(json!({ "status": "success" })))
}

/// Soft-deletes a conversation and drops its retained inference context.
#[instrument(skip(state), err)]
pub async fn delete_conversation_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    conversation_service::soft_delete(&state.pool, user.id, conversation_id).await?;
    state.gateway.forget_context(conversation_id);
    Ok(Json(json!({ "status": "success" })))
}
