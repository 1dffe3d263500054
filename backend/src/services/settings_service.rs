use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    db,
    errors::AppError,
    llm::model_registry,
    models::user_settings::{NewUserSettings, UpdateUserSettingsRequest, UserSettings},
    schema::{user_settings, users},
    state::DbPool,
};

const THEMES: &[&str] = &["light", "dark"];

/// Returns the user's settings row, creating it with defaults on first
/// access. Idempotent: a second read returns the same persisted row.
#[instrument(skip(pool), err)]
pub async fn get_or_create(pool: &DbPool, user_id: Uuid) -> Result<UserSettings, AppError> {
    let conn = db::get_conn(pool).await?;
    conn.interact(move |conn| {
        conn.transaction(|conn| get_or_create_internal(conn, user_id))
    })
    .await?
}

/// Applies a partial settings update, creating the row first if needed.
///
/// # Errors
///
/// `BadRequest` for an unknown preferred model or theme.
#[instrument(skip(pool, update), err)]
pub async fn update(
    pool: &DbPool,
    user_id: Uuid,
    update: UpdateUserSettingsRequest,
) -> Result<UserSettings, AppError> {
    if let Some(model) = &update.preferred_model {
        if !model_registry::is_available(model) {
            return Err(AppError::BadRequest(format!(
                "Model not available. Available models: {}",
                model_registry::AVAILABLE_MODELS.join(", ")
            )));
        }
    }
    if let Some(theme) = &update.theme {
        if !THEMES.contains(&theme.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Unknown theme: {theme}"
            )));
        }
    }

    let conn = db::get_conn(pool).await?;
    conn.interact(move |conn| {
        conn.transaction(|conn| {
            let current = get_or_create_internal(conn, user_id)?;

            diesel::update(user_settings::table.filter(user_settings::id.eq(current.id)))
                .set((
                    user_settings::theme.eq(update.theme.unwrap_or(current.theme)),
                    user_settings::preferred_model
                        .eq(update.preferred_model.unwrap_or(current.preferred_model)),
                    user_settings::language.eq(update.language.unwrap_or(current.language)),
                    user_settings::notifications_enabled.eq(update
                        .notifications_enabled
                        .unwrap_or(current.notifications_enabled)),
                    user_settings::updated_at.eq(Utc::now()),
                ))
                .returning(UserSettings::as_returning())
                .get_result::<UserSettings>(conn)
                .map_err(AppError::from)
        })
    })
    .await?
}

fn get_or_create_internal(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<UserSettings, AppError> {
    let live_user = users::table
        .find(user_id)
        .filter(users::deleted_at.is_null())
        .select(users::id)
        .first::<Uuid>(conn)
        .optional()?;
    if live_user.is_none() {
        return Err(AppError::UserNotFound);
    }

    let existing = user_settings::table
        .filter(user_settings::user_id.eq(user_id))
        .select(UserSettings::as_select())
        .first::<UserSettings>(conn)
        .optional()?;

    if let Some(settings) = existing {
        return Ok(settings);
    }

    info!(%user_id, "Creating default settings row");
    let defaults = NewUserSettings::defaults_for(user_id, model_registry::default_model());
    match diesel::insert_into(user_settings::table)
        .values(&defaults)
        .returning(UserSettings::as_returning())
        .get_result::<UserSettings>(conn)
    {
        Ok(settings) => Ok(settings),
        // Lost a creation race; the winner's row is the one we want.
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            warn!(%user_id, "Settings row created concurrently, re-reading");
            user_settings::table
                .filter(user_settings::user_id.eq(user_id))
                .select(UserSettings::as_select())
                .first::<UserSettings>(conn)
                .map_err(AppError::from)
        }
        Err(e) => Err(AppError::from(e)),
    }
}
