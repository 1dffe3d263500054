use crate::models::users::{User, UserRole};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for POST /api/auth/register.
#[derive(Deserialize, Debug, Clone)]
pub struct RegisterPayload {
    pub username: String,
    pub email: String,
    pub password: SecretString,
}

/// Request body for POST /api/auth/login — requests an OTP for the email.
#[derive(Deserialize, Debug, Clone)]
pub struct OtpRequestPayload {
    pub email: String,
}

/// Request body for POST /api/auth/verify-otp.
#[derive(Deserialize, Debug, Clone)]
pub struct OtpVerifyPayload {
    pub email: String,
    pub otp: String,
}

/// Request body for POST /api/auth/login/password (fallback method).
#[derive(Deserialize, Debug, Clone)]
pub struct PasswordLoginPayload {
    pub email: String,
    pub password: SecretString,
}

/// Response body for successful logins.
#[derive(Serialize, Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user_id: Uuid,
    pub username: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String, user: &User) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            user_id: user.id,
            username: user.username.clone(),
        }
    }
}

/// Profile representation returned by /api/users/me.
#[derive(Serialize, Debug, Clone)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

/// Request body for PUT /api/users/me. All fields optional.
#[derive(Deserialize, Debug, Clone)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_payload_debug_redacts_password() {
        let payload: RegisterPayload = serde_json::from_str(
            r#"{"username":"alice","email":"alice@example.com","password":"hunter2"}"#,
        )
        .unwrap();
        let debug_output = format!("{payload:?}");
        assert!(!debug_output.contains("hunter2"));
    }

    #[test]
    fn test_token_response_shape() {
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            role: UserRole::User,
            last_login: None,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let response = TokenResponse::bearer("tok".to_string(), &user);
        assert_eq!(response.token_type, "bearer");
        assert_eq!(response.user_id, user.id);
        assert_eq!(response.username, "alice");
    }
}
