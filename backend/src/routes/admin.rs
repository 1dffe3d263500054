use axum::extract::State;
use axum::routing::delete;
use axum::{Json, Router};
use diesel::prelude::*;
use serde_json::json;
use tracing::{info, instrument};

use crate::db;
use crate::errors::AppError;
use crate::models::users::UserRole;
use crate::routes::extract::AuthenticatedUser;
use crate::schema::users;
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/users/delete-regular", delete(delete_regular_users_handler))
}

/// Hard-deletes every account with the plain `user` role. The foreign keys
/// cascade, so conversations, messages, settings, subscriptions and payments
/// owned by those accounts go with them.
#[instrument(skip(state), err)]
pub async fn delete_regular_users_handler(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> Result<Json<serde_json::Value>, AppError> {
    if caller.role != UserRole::Admin {
        return Err(AppError::Forbidden);
    }

    let conn = db::get_conn(&state.pool).await?;
    let deleted = conn
        .interact(move |conn| {
            diesel::delete(users::table.filter(users::role.eq(UserRole::User)))
                .execute(conn)
                .map_err(AppError::from)
        })
        .await??;

    info!(deleted, caller_id = %caller.id, "Bulk-deleted regular users");
    Ok(Json(json!({
        "status": "success",
        "message": format!("Successfully deleted {deleted} regular users"),
        "deleted_count": deleted,
    })))
}
