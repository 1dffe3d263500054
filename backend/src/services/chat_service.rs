use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    errors::AppError,
    llm::{CompletionStream, model_registry},
    models::conversations::Conversation,
    models::messages::{Message, MessageRole},
    models::user_settings::UpdateUserSettingsRequest,
    prompt_builder,
    services::{conversation_service, message_service, settings_service},
    state::AppState,
};

/// The outcome of one orchestrated chat turn.
#[derive(Serialize, Debug, Clone)]
pub struct ChatTurn {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub latency_ms: i32,
    pub model_used: String,
}

/// One chat turn: resolve conversation → append user message → build context
/// → call gateway → append assistant message.
///
/// Each persistence step is its own commit boundary; the gateway call writes
/// nothing. A gateway failure degrades to the fallback text, so the turn is
/// never lost — the user message is durably saved even when generation
/// fails. Only a ledger failure on the assistant message (conversation
/// deleted concurrently) surfaces as an error, and the user message stays
/// persisted in that case.
#[instrument(skip(state, text), err)]
pub async fn send_message(
    state: &AppState,
    user_id: Uuid,
    text: String,
    model_override: Option<String>,
) -> Result<ChatTurn, AppError> {
    let conversation = conversation_service::resolve(&state.pool, user_id, None).await?;

    message_service::append(
        &state.pool,
        conversation.id,
        Some(user_id),
        MessageRole::User,
        text,
        None,
        None,
    )
    .await?;

    let (model, prompt) = prepare_generation(state, user_id, &conversation, model_override).await?;

    let started = Instant::now();
    let content = state.gateway.generate(&model, &prompt, conversation.id).await;
    let latency_ms = i32::try_from(started.elapsed().as_millis()).unwrap_or(i32::MAX);

    let assistant_message = message_service::append(
        &state.pool,
        conversation.id,
        None,
        MessageRole::Assistant,
        content,
        Some(latency_ms),
        Some(model.clone()),
    )
    .await
    .map_err(|e| {
        error!(
            conversation_id = %conversation.id,
            error = %e,
            "Failed to persist assistant message; the user message remains saved"
        );
        e
    })?;

    info!(
        conversation_id = %conversation.id,
        message_id = %assistant_message.id,
        latency_ms,
        "Chat turn completed"
    );

    Ok(ChatTurn {
        message_id: assistant_message.id,
        conversation_id: conversation.id,
        content: assistant_message.content,
        created_at: assistant_message.created_at,
        latency_ms,
        model_used: model,
    })
}

/// Incremental variant of [`send_message`]: persists the user message, then
/// returns the gateway's fragment stream directly. The assistant reply is
/// not persisted on this path.
#[instrument(skip(state, text), err)]
pub async fn stream_message(
    state: &AppState,
    user_id: Uuid,
    text: String,
    model_override: Option<String>,
) -> Result<CompletionStream, AppError> {
    let conversation = conversation_service::resolve(&state.pool, user_id, None).await?;

    message_service::append(
        &state.pool,
        conversation.id,
        Some(user_id),
        MessageRole::User,
        text,
        None,
        None,
    )
    .await?;

    let (model, prompt) = prepare_generation(state, user_id, &conversation, model_override).await?;
    Ok(state.gateway.generate_stream(&model, &prompt))
}

/// Messages of the user's active conversation, in insertion order.
#[instrument(skip(state), err)]
pub async fn conversation_history(
    state: &AppState,
    user_id: Uuid,
) -> Result<Vec<Message>, AppError> {
    let conversation = conversation_service::resolve(&state.pool, user_id, None).await?;
    message_service::history(&state.pool, user_id, conversation.id).await
}

/// Persists a new preferred model and drops the retained inference context
/// of the active conversation, since the server-side state is model-bound.
#[instrument(skip(state), err)]
pub async fn update_preferred_model(
    state: &AppState,
    user_id: Uuid,
    model_name: String,
) -> Result<(), AppError> {
    settings_service::update(
        &state.pool,
        user_id,
        UpdateUserSettingsRequest {
            theme: None,
            preferred_model: Some(model_name),
            language: None,
            notifications_enabled: None,
        },
    )
    .await?;

    let conversation = conversation_service::resolve(&state.pool, user_id, None).await?;
    state.gateway.forget_context(conversation.id);
    Ok(())
}

/// Model selection plus prompt construction for one generation: the
/// entitlement decides the context window, the settings row supplies the
/// preferred model, and anything unknown falls back through the registry.
async fn prepare_generation(
    state: &AppState,
    user_id: Uuid,
    conversation: &Conversation,
    model_override: Option<String>,
) -> Result<(String, String), AppError> {
    let settings = settings_service::get_or_create(&state.pool, user_id).await?;
    let model = model_registry::resolve(
        model_override
            .as_deref()
            .or(Some(settings.preferred_model.as_str())),
    )
    .to_string();

    let entitlement = state.entitlements.entitlement_for(user_id).await;
    let history = message_service::recent_history(
        &state.pool,
        conversation.id,
        entitlement.context_window,
    )
    .await?;
    let prompt = prompt_builder::build_prompt(&history, entitlement.context_window);

    Ok((model, prompt))
}
