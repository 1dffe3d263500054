use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod chat;
pub mod conversations;
pub mod extract;
pub mod health;
pub mod models;
pub mod settings;
pub mod users;

/// The full /api surface. Protected handlers enforce authentication through
/// the [`extract::AuthenticatedUser`] extractor.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/auth", auth::auth_routes())
        .nest("/users", users::user_routes())
        .nest("/settings", settings::settings_routes())
        .nest("/chat", chat::chat_routes())
        .nest("/conversations", conversations::conversation_routes())
        .nest("/models", models::model_routes())
        .nest("/admin", admin::admin_routes())
}
