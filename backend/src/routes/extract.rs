use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::{self, token};
use crate::db;
use crate::errors::AppError;
use crate::models::users::User;
use crate::state::AppState;

/// Extractor for protected handlers: validates the `Authorization: Bearer`
/// header and loads the live user the token was issued for.
pub struct AuthenticatedUser(pub User);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

        let bearer_token = header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthorized("Invalid authentication credentials".to_string())
        })?;

        let secret = state.config.token_secret.as_deref().ok_or_else(|| {
            AppError::ConfigError("TOKEN_SECRET is not configured".to_string())
        })?;
        let algorithm = state.config.token_algorithm()?;
        let user_id = token::verify_access_token(bearer_token, secret, algorithm)?;

        let conn = db::get_conn(&state.pool).await?;
        let user = conn
            .interact(move |conn| auth::get_user(conn, user_id))
            .await
            .map_err(AppError::from)?
            .map_err(|e| match e {
                // A token for a deleted account is just an invalid token.
                auth::AuthError::UserNotFound => {
                    AppError::Unauthorized("Invalid authentication credentials".to_string())
                }
                other => AppError::from(other),
            })?;

        Ok(AuthenticatedUser(user))
    }
}
