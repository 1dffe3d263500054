use crate::schema::user_settings;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_THEME: &str = "light";
pub const DEFAULT_LANGUAGE: &str = "English";

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = user_settings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserSettings {
    pub id: Uuid,
    pub user_id: Uuid,
    pub theme: String,
    pub preferred_model: String,
    pub language: String,
    pub notifications_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = user_settings)]
pub struct NewUserSettings {
    pub user_id: Uuid,
    pub theme: String,
    pub preferred_model: String,
    pub language: String,
    pub notifications_enabled: bool,
}

impl NewUserSettings {
    /// The lazily-created defaults for a user with no settings row yet.
    pub fn defaults_for(user_id: Uuid, default_model: &str) -> Self {
        Self {
            user_id,
            theme: DEFAULT_THEME.to_string(),
            preferred_model: default_model.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            notifications_enabled: true,
        }
    }
}

/// Request body for PUT /api/settings. All fields optional to allow partial
/// updates.
#[derive(Deserialize, Debug, Clone)]
pub struct UpdateUserSettingsRequest {
    pub theme: Option<String>,
    pub preferred_model: Option<String>,
    pub language: Option<String>,
    pub notifications_enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for() {
        let user_id = Uuid::new_v4();
        let settings = NewUserSettings::defaults_for(user_id, "llama3.2:3b");
        assert_eq!(settings.user_id, user_id);
        assert_eq!(settings.theme, "light");
        assert_eq!(settings.preferred_model, "llama3.2:3b");
        assert_eq!(settings.language, "English");
        assert!(settings.notifications_enabled);
    }
}
