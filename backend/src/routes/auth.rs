use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use diesel::prelude::*;
use secrecy::ExposeSecret;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{self, AuthError, token};
use crate::db;
use crate::errors::AppError;
use crate::models::auth::{
    OtpRequestPayload, OtpVerifyPayload, PasswordLoginPayload, RegisterPayload, TokenResponse,
};
use crate::models::billing::NewSubscription;
use crate::schema::subscriptions;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/verify-otp", post(verify_otp_handler))
        .route("/login/password", post(password_login_handler))
}

/// Registers a new account and opens its free-plan subscription.
#[instrument(skip(state, payload), err)]
pub async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse, AppError> {
    validate_registration(&payload)?;

    let password_hash = auth::hash_password(payload.password.clone())
        .await
        .map_err(AppError::from)?;
    let username = payload.username.clone();
    let email = payload.email.clone();

    let conn = db::get_conn(&state.pool).await?;
    let user = conn
        .interact(move |conn| {
            conn.transaction(|conn| {
                let user = auth::create_user(conn, username, email, password_hash)
                    .map_err(AppError::from)?;
                diesel::insert_into(subscriptions::table)
                    .values(&NewSubscription::free(user.id))
                    .execute(conn)?;
                Ok::<_, AppError>(user)
            })
        })
        .await??;

    info!(user_id = %user.id, "User registration successful");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user_id": user.id,
        })),
    ))
}

/// Requests a one-time password for the given email.
#[instrument(skip(state, payload), err)]
pub async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<OtpRequestPayload>,
) -> Result<impl IntoResponse, AppError> {
    let email = payload.email.clone();
    let conn = db::get_conn(&state.pool).await?;
    let user = conn
        .interact(move |conn| auth::get_user_by_email(conn, &email))
        .await?
        .map_err(|e| match e {
            AuthError::UserNotFound => AppError::BadRequest("Email not registered".to_string()),
            other => AppError::from(other),
        })?;

    let code = state.otp_store.issue(&user.email);
    state
        .email
        .send_otp_email(&user.email, &code)
        .await
        .map_err(|e| AppError::EmailError(e.to_string()))?;

    Ok(Json(json!({ "message": "OTP sent successfully" })))
}

/// Verifies an OTP and logs the user in. The response never distinguishes a
/// wrong code from an expired one.
#[instrument(skip(state, payload), err)]
pub async fn verify_otp_handler(
    State(state): State<AppState>,
    Json(payload): Json<OtpVerifyPayload>,
) -> Result<Json<TokenResponse>, AppError> {
    state
        .otp_store
        .verify(&payload.email, &payload.otp)
        .map_err(|e| {
            warn!(error = %e, "OTP verification failed");
            AppError::Unauthorized("Invalid or expired OTP".to_string())
        })?;

    let email = payload.email.clone();
    let conn = db::get_conn(&state.pool).await?;
    let (user, first_login) = conn
        .interact(move |conn| {
            let user = auth::get_user_by_email(conn, &email)?;
            let first_login = user.last_login.is_none();
            let user = auth::touch_last_login(conn, user.id)?;
            Ok::<_, AuthError>((user, first_login))
        })
        .await?
        .map_err(AppError::from)?;

    if first_login {
        if let Err(e) = state
            .email
            .send_welcome_email(&user.email, &user.username)
            .await
        {
            warn!(error = %e, "Failed to send welcome email");
        }
    }

    let access_token = issue_token(&state, user.id)?;
    Ok(Json(TokenResponse::bearer(access_token, &user)))
}

/// Password login, the fallback method next to the OTP flow.
#[instrument(skip(state, payload), err)]
pub async fn password_login_handler(
    State(state): State<AppState>,
    Json(payload): Json<PasswordLoginPayload>,
) -> Result<Json<TokenResponse>, AppError> {
    let email = payload.email.clone();
    let password = payload.password.clone();

    let conn = db::get_conn(&state.pool).await?;
    let user = conn
        .interact(move |conn| auth::verify_credentials(conn, &email, &password))
        .await?
        .map_err(|e| match e {
            AuthError::WrongCredentials | AuthError::UserNotFound => {
                AppError::Unauthorized("Incorrect email or password".to_string())
            }
            other => AppError::from(other),
        })?;

    let access_token = issue_token(&state, user.id)?;
    Ok(Json(TokenResponse::bearer(access_token, &user)))
}

fn issue_token(state: &AppState, user_id: Uuid) -> Result<String, AppError> {
    let secret = state
        .config
        .token_secret
        .as_deref()
        .ok_or_else(|| AppError::ConfigError("TOKEN_SECRET is not configured".to_string()))?;
    token::create_access_token(
        user_id,
        secret,
        state.config.token_algorithm()?,
        state.config.access_token_expire_minutes,
    )
}

fn validate_registration(payload: &RegisterPayload) -> Result<(), AppError> {
    let username_len = payload.username.chars().count();
    if !(3..=50).contains(&username_len) {
        return Err(AppError::InvalidInput(
            "username must be between 3 and 50 characters".to_string(),
        ));
    }
    if !payload.email.contains('@') {
        return Err(AppError::InvalidInput(
            "invalid email address".to_string(),
        ));
    }
    if payload.password.expose_secret().chars().count() < 6 {
        return Err(AppError::InvalidInput(
            "password must be at least 6 characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn payload(username: &str, email: &str, password: &str) -> RegisterPayload {
        RegisterPayload {
            username: username.to_string(),
            email: email.to_string(),
            password: SecretString::from(password),
        }
    }

    #[test]
    fn test_validate_registration_accepts_reasonable_input() {
        assert!(validate_registration(&payload("alice", "alice@example.com", "hunter22")).is_ok());
    }

    #[test]
    fn test_validate_registration_rejects_short_username() {
        let result = validate_registration(&payload("al", "alice@example.com", "hunter22"));
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_registration_rejects_bad_email() {
        let result = validate_registration(&payload("alice", "not-an-email", "hunter22"));
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_registration_rejects_short_password() {
        let result = validate_registration(&payload("alice", "alice@example.com", "12345"));
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
