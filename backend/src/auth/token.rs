use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// Claims carried by an access token. `sub` is the user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Creates a signed access token for the user.
///
/// # Errors
///
/// Returns an error if encoding fails (e.g. an asymmetric algorithm was
/// configured with a symmetric secret).
pub fn create_access_token(
    user_id: Uuid,
    secret: &str,
    algorithm: Algorithm,
    lifetime_minutes: i64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::minutes(lifetime_minutes)).timestamp(),
    };

    encode(
        &Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(AppError::from)
}

/// Verifies a bearer token and returns the user id it was issued for.
/// Expired, tampered and malformed tokens all map to `Unauthorized`.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` for any invalid token.
pub fn verify_access_token(
    token: &str,
    secret: &str,
    algorithm: Algorithm,
) -> Result<Uuid, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(algorithm),
    )?;

    Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid token subject".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret";

    #[test]
    fn test_token_roundtrip() {
        let user_id = Uuid::new_v4();
        let token = create_access_token(user_id, SECRET, Algorithm::HS256, 30).unwrap();
        let decoded = verify_access_token(&token, SECRET, Algorithm::HS256).unwrap();
        assert_eq!(decoded, user_id);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = create_access_token(Uuid::new_v4(), SECRET, Algorithm::HS256, 30).unwrap();
        let result = verify_access_token(&token, "another-secret", Algorithm::HS256);
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        // Negative lifetime puts exp an hour in the past, beyond the default
        // validation leeway.
        let token = create_access_token(Uuid::new_v4(), SECRET, Algorithm::HS256, -60).unwrap();
        let result = verify_access_token(&token, SECRET, Algorithm::HS256);
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let result = verify_access_token("not-a-jwt", SECRET, Algorithm::HS256);
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }
}
