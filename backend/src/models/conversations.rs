use crate::models::users::User;
use crate::schema::conversations;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

// Imports for manual enum mapping
use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::{AsExpression, FromSqlRow};
use std::io::Write;

/// Conversation lifecycle state, stored as the `conversation_status`
/// Postgres enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = crate::schema::sql_types::ConversationStatus)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Active,
    Archived,
}

impl ToSql<crate::schema::sql_types::ConversationStatus, Pg> for ConversationStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match *self {
            ConversationStatus::Active => out.write_all(b"active")?,
            ConversationStatus::Archived => out.write_all(b"archived")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::ConversationStatus, Pg> for ConversationStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"active" => Ok(ConversationStatus::Active),
            b"archived" => Ok(ConversationStatus::Archived),
            unrecognized => {
                error!(
                    "Unrecognized conversation_status enum variant from DB: {:?}",
                    String::from_utf8_lossy(unrecognized)
                );
                Err("Unrecognized enum variant from database".into())
            }
        }
    }
}

// Represents a conversation in the database
#[derive(
    Queryable, Selectable, Identifiable, Associations, Debug, Clone, Serialize, Deserialize,
)]
#[diesel(belongs_to(User, foreign_key = user_id))]
#[diesel(table_name = conversations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub status: ConversationStatus,
    pub last_activity: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// For creating a new conversation
#[derive(Insertable, Debug)]
#[diesel(table_name = conversations)]
pub struct NewConversation {
    pub user_id: Uuid,
    pub title: Option<String>,
    pub status: ConversationStatus,
}

/// Listing entry returned by GET /api/conversations.
#[derive(Serialize, Debug, Clone)]
pub struct ConversationInfo {
    pub conversation_id: Uuid,
    pub title: String,
    pub status: ConversationStatus,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_wire_format() {
        assert_eq!(
            serde_json::to_string(&ConversationStatus::Active).unwrap(),
            "\"active\""
        );
        assert_eq!(
            serde_json::to_string(&ConversationStatus::Archived).unwrap(),
            "\"archived\""
        );
        assert_eq!(
            serde_json::from_str::<ConversationStatus>("\"archived\"").unwrap(),
            ConversationStatus::Archived
        );
    }

    #[test]
    fn test_new_conversations_default_to_active() {
        assert_eq!(ConversationStatus::default(), ConversationStatus::Active);
    }
}
