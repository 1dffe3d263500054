use chrono::Utc;
use diesel::prelude::*;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::models::users::{NewUser, User, UserRole};
use crate::schema::users;

pub mod otp;
pub mod token;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Wrong credentials")]
    WrongCredentials,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Email already taken")]
    EmailTaken,
    #[error("Password hashing failed")]
    HashingError,
    #[error("User not found")]
    UserNotFound,
    #[error("Database error during authentication: {0}")]
    DatabaseError(String),
    #[error("Database pool error: {0}")]
    PoolError(#[from] deadpool_diesel::PoolError),
    #[error("Database interaction error: {0}")]
    InteractError(String),
}

impl From<deadpool_diesel::InteractError> for AuthError {
    fn from(err: deadpool_diesel::InteractError) -> Self {
        Self::InteractError(err.to_string())
    }
}

impl From<diesel::result::Error> for AuthError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => Self::UserNotFound,
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                info,
            ) => {
                if info.constraint_name() == Some("users_username_key") {
                    Self::UsernameTaken
                } else if info.constraint_name() == Some("users_email_key") {
                    Self::EmailTaken
                } else {
                    Self::DatabaseError(format!(
                        "Unique constraint violation: {:?}",
                        info.message()
                    ))
                }
            }
            _ => Self::DatabaseError(err.to_string()),
        }
    }
}

/// Inserts a new user row. Duplicate usernames and emails surface as
/// `UsernameTaken` / `EmailTaken` via the unique-violation mapping above.
///
/// # Errors
///
/// Returns an error if the insert fails.
#[instrument(skip(conn, password_hash), err)]
pub fn create_user(
    conn: &mut PgConnection,
    username: String,
    email: String,
    password_hash: String,
) -> Result<User, AuthError> {
    info!("Attempting to create user");
    let new_user = NewUser {
        username,
        email,
        password_hash,
        role: UserRole::User,
    };

    diesel::insert_into(users::table)
        .values(&new_user)
        .returning(User::as_returning())
        .get_result::<User>(conn)
        .map_err(|e| {
            error!(error = ?e, "Database error creating user");
            AuthError::from(e)
        })
}

/// Finds a non-deleted user by ID.
///
/// # Errors
///
/// Returns `UserNotFound` if no live user matches, or a database error.
#[instrument(skip(conn), err)]
pub fn get_user(conn: &mut PgConnection, user_id: Uuid) -> Result<User, AuthError> {
    users::table
        .find(user_id)
        .filter(users::deleted_at.is_null())
        .select(User::as_select())
        .first::<User>(conn)
        .map_err(AuthError::from)
}

/// Finds a non-deleted user by email.
///
/// # Errors
///
/// Returns `UserNotFound` if no live user matches, or a database error.
#[instrument(skip(conn, email), err)]
pub fn get_user_by_email(conn: &mut PgConnection, email: &str) -> Result<User, AuthError> {
    users::table
        .filter(users::email.eq(email))
        .filter(users::deleted_at.is_null())
        .select(User::as_select())
        .first::<User>(conn)
        .map_err(AuthError::from)
}

/// Verifies email + password and stamps `last_login` on success.
#[instrument(skip(conn, password), err)]
pub fn verify_credentials(
    conn: &mut PgConnection,
    email: &str,
    password: &SecretString,
) -> Result<User, AuthError> {
    info!("Verifying credentials");
    let user = get_user_by_email(conn, email).map_err(|e| match e {
        // Do not reveal whether the email exists.
        AuthError::UserNotFound => AuthError::WrongCredentials,
        other => other,
    })?;

    debug!(user_id = %user.id, "Verifying password hash");
    let is_valid = bcrypt::verify(password.expose_secret(), &user.password_hash).map_err(|e| {
        error!(user_id = %user.id, error = ?e, "Bcrypt verification failed");
        AuthError::HashingError
    })?;

    if is_valid {
        touch_last_login(conn, user.id)
    } else {
        warn!(user_id = %user.id, "Password verification failed");
        Err(AuthError::WrongCredentials)
    }
}

/// Stamps `last_login = now` and returns the updated user.
///
/// # Errors
///
/// Returns `UserNotFound` if the row vanished, or a database error.
pub fn touch_last_login(conn: &mut PgConnection, user_id: Uuid) -> Result<User, AuthError> {
    diesel::update(users::table.find(user_id))
        .set((
            users::last_login.eq(Utc::now()),
            users::updated_at.eq(Utc::now()),
        ))
        .returning(User::as_returning())
        .get_result::<User>(conn)
        .map_err(AuthError::from)
}

/// Hashes a password using bcrypt with the default cost factor.
///
/// # Errors
///
/// Returns `AuthError::HashingError` if the bcrypt hashing operation fails
/// or if the async task spawning fails.
pub async fn hash_password(password: SecretString) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || {
        bcrypt::hash(password.expose_secret(), bcrypt::DEFAULT_COST)
    })
    .await
    .map_err(|_e: JoinError| AuthError::HashingError)?
    .map_err(|_e: bcrypt::BcryptError| AuthError::HashingError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_password_roundtrip() {
        let password = SecretString::from("some_password_to_hash");
        let hash = hash_password(password.clone())
            .await
            .expect("hashing should succeed");
        assert!(bcrypt::verify(password.expose_secret(), &hash).unwrap());
        assert!(!bcrypt::verify("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_auth_error_from_diesel_not_found() {
        let err = AuthError::from(diesel::result::Error::NotFound);
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[test]
    fn test_auth_error_from_diesel_other() {
        let err = AuthError::from(diesel::result::Error::RollbackTransaction);
        assert!(matches!(err, AuthError::DatabaseError(_)));
    }
}
