use crate::models::conversations::Conversation;
use crate::schema::messages;
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

/// Message author role, stored as the `message_role` Postgres enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = crate::schema::sql_types::MessageRole)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[default]
    User,
    Assistant,
    System,
}

impl ToSql<crate::schema::sql_types::MessageRole, Pg> for MessageRole {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match *self {
            MessageRole::User => out.write_all(b"user")?,
            MessageRole::Assistant => out.write_all(b"assistant")?,
            MessageRole::System => out.write_all(b"system")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::MessageRole, Pg> for MessageRole {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"user" => Ok(MessageRole::User),
            b"assistant" => Ok(MessageRole::Assistant),
            b"system" => Ok(MessageRole::System),
            unrecognized => {
                error!(
                    "Unrecognized message_role enum variant from DB: {:?}",
                    String::from_utf8_lossy(unrecognized)
                );
                Err("Unrecognized enum variant from database".into())
            }
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "User"),
            MessageRole::Assistant => write!(f, "Assistant"),
            MessageRole::System => write!(f, "System"),
        }
    }
}

// Represents a message in the database. Messages are immutable once created;
// no update path exists anywhere in the crate.
#[derive(
    Queryable, Selectable, Identifiable, Associations, Debug, Clone, Serialize, Deserialize,
)]
#[diesel(belongs_to(Conversation, foreign_key = conversation_id))]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub user_id: Option<Uuid>,
    pub role: MessageRole,
    pub content: String,
    pub model_used: Option<String>,
    pub latency_ms: Option<i32>,
    pub created_at: DateTime<Utc>,
}

// For inserting a new message. `user_id` is None for assistant and system
// messages. `created_at` is set by the ledger once it holds the conversation
// row lock, which keeps timestamps non-decreasing in insertion order.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = messages)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub user_id: Option<Uuid>,
    pub role: MessageRole,
    pub content: String,
    pub model_used: Option<String>,
    pub latency_ms: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serde_wire_format() {
        assert_eq!(serde_json::to_string(&MessageRole::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&MessageRole::Assistant).unwrap(),
            "\"assistant\""
        );
        assert_eq!(
            serde_json::to_string(&MessageRole::System).unwrap(),
            "\"system\""
        );
    }

    #[test]
    fn test_unknown_role_is_rejected_at_deserialization() {
        assert!(serde_json::from_str::<MessageRole>("\"moderator\"").is_err());
    }

    #[test]
    fn test_display_message_role() {
        assert_eq!(MessageRole::User.to_string(), "User");
        assert_eq!(MessageRole::Assistant.to_string(), "Assistant");
    }
}
