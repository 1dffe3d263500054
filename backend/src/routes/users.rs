use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use diesel::prelude::*;
use tracing::{instrument, warn};

use crate::db;
use crate::errors::AppError;
use crate::models::auth::{UpdateUserRequest, UserResponse};
use crate::models::users::{User, UserRole};
use crate::routes::extract::AuthenticatedUser;
use crate::schema::users;
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/me", get(me_handler).put(update_me_handler))
}

/// Returns the authenticated user's profile.
pub async fn me_handler(AuthenticatedUser(user): AuthenticatedUser) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Updates the authenticated user's profile. Username and email changes are
/// checked for duplicates; only admins may change roles.
#[instrument(skip(state, payload), err)]
pub async fn update_me_handler(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user_id = user.id;
    let is_admin = user.role == UserRole::Admin;

    let conn = db::get_conn(&state.pool).await?;
    let updated = conn
        .interact(move |conn| {
            conn.transaction(|conn| {
                let current = crate::auth::get_user(conn, user_id).map_err(AppError::from)?;

                let mut username = current.username.clone();
                if let Some(new_username) = payload.username {
                    if new_username != current.username {
                        let taken = users::table
                            .filter(users::username.eq(&new_username))
                            .select(users::id)
                            .first::<uuid::Uuid>(conn)
                            .optional()?;
                        if taken.is_some() {
                            return Err(AppError::UsernameTaken);
                        }
                        username = new_username;
                    }
                }

                let mut email = current.email.clone();
                if let Some(new_email) = payload.email {
                    if new_email != current.email {
                        let taken = users::table
                            .filter(users::email.eq(&new_email))
                            .select(users::id)
                            .first::<uuid::Uuid>(conn)
                            .optional()?;
                        if taken.is_some() {
                            return Err(AppError::EmailTaken);
                        }
                        email = new_email;
                    }
                }

                let mut role = current.role;
                if let Some(new_role) = payload.role {
                    if is_admin {
                        role = new_role;
                    } else {
                        warn!(%user_id, "Non-admin attempted role change, ignoring");
                    }
                }

                diesel::update(users::table.find(user_id))
                    .set((
                        users::username.eq(username),
                        users::email.eq(email),
                        users::role.eq(role),
                        users::updated_at.eq(chrono::Utc::now()),
                    ))
                    .returning(User::as_returning())
                    .get_result::<User>(conn)
                    .map_err(AppError::from)
            })
        })
        .await??;

    Ok(Json(UserResponse::from(updated)))
}
