use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db,
    errors::AppError,
    models::conversations::{Conversation, ConversationInfo, ConversationStatus, NewConversation},
    schema::{conversations, messages, users},
    state::DbPool,
};

const TITLE_MAX_CHARS: usize = 50;

/// Finds or creates the user's active conversation.
///
/// If `conversation_id` is given and live, it is returned with its
/// `last_activity` bumped. Otherwise the most-recently-active live
/// conversation is used, and if none exists a fresh one is inserted.
/// Exactly one write happens per call: either the activity bump or the
/// insert.
#[instrument(skip(pool), err)]
pub async fn resolve(
    pool: &DbPool,
    user_id: Uuid,
    conversation_id: Option<Uuid>,
) -> Result<Conversation, AppError> {
    let conn = db::get_conn(pool).await?;
    conn.interact(move |conn| {
        conn.transaction(|conn| {
            ensure_live_user(conn, user_id)?;

            if let Some(conversation_id) = conversation_id {
                let existing = conversations::table
                    .filter(conversations::id.eq(conversation_id))
                    .filter(conversations::user_id.eq(user_id))
                    .filter(conversations::deleted_at.is_null())
                    .for_update()
                    .select(Conversation::as_select())
                    .first::<Conversation>(conn)
                    .optional()?;

                if let Some(conversation) = existing {
                    return touch_last_activity(conn, conversation.id);
                }
            }

            let active = conversations::table
                .filter(conversations::user_id.eq(user_id))
                .filter(conversations::status.eq(ConversationStatus::Active))
                .filter(conversations::deleted_at.is_null())
                .order(conversations::last_activity.desc())
                .for_update()
                .select(Conversation::as_select())
                .first::<Conversation>(conn)
                .optional()?;

            match active {
                Some(conversation) => touch_last_activity(conn, conversation.id),
                None => {
                    info!(%user_id, "No active conversation, creating one");
                    insert_active(conn, user_id)
                }
            }
        })
    })
    .await?
}

/// Archives the current active conversation and creates a fresh one, as one
/// transaction. The user row is locked first so two concurrent calls
/// serialize instead of both archiving the same conversation and creating
/// two active ones; the partial unique index on the table backstops this.
#[instrument(skip(pool), err)]
pub async fn start_new(pool: &DbPool, user_id: Uuid) -> Result<Conversation, AppError> {
    let conn = db::get_conn(pool).await?;
    conn.interact(move |conn| {
        conn.transaction(|conn| {
            lock_live_user(conn, user_id)?;
            archive_active(conn, user_id, None)?;
            insert_active(conn, user_id)
        })
    })
    .await?
}

/// Makes the given conversation the active one, archiving whichever was
/// active before. Same locking discipline as [`start_new`].
#[instrument(skip(pool), err)]
pub async fn switch(
    pool: &DbPool,
    user_id: Uuid,
    conversation_id: Uuid,
) -> Result<Conversation, AppError> {
    let conn = db::get_conn(pool).await?;
    conn.interact(move |conn| {
        conn.transaction(|conn| {
            lock_live_user(conn, user_id)?;

            let target: Option<Uuid> = conversations::table
                .filter(conversations::id.eq(conversation_id))
                .filter(conversations::user_id.eq(user_id))
                .filter(conversations::deleted_at.is_null())
                .for_update()
                .select(conversations::id)
                .first::<Uuid>(conn)
                .optional()?;

            let Some(target_id) = target else {
                warn!(%conversation_id, %user_id, "Switch target not found");
                return Err(AppError::NotFound("Conversation not found".into()));
            };

            archive_active(conn, user_id, Some(target_id))?;

            diesel::update(conversations::table.filter(conversations::id.eq(target_id)))
                .set((
                    conversations::status.eq(ConversationStatus::Active),
                    conversations::last_activity.eq(Utc::now()),
                    conversations::updated_at.eq(Utc::now()),
                ))
                .returning(Conversation::as_returning())
                .get_result::<Conversation>(conn)
                .map_err(AppError::from)
        })
    })
    .await?
}

/// Marks a conversation archived without touching its messages.
#[instrument(skip(pool), err)]
pub async fn archive(pool: &DbPool, user_id: Uuid, conversation_id: Uuid) -> Result<(), AppError> {
    let conn = db::get_conn(pool).await?;
    let updated = conn
        .interact(move |conn| {
            diesel::update(
                conversations::table
                    .filter(conversations::id.eq(conversation_id))
                    .filter(conversations::user_id.eq(user_id))
                    .filter(conversations::deleted_at.is_null()),
            )
            .set((
                conversations::status.eq(ConversationStatus::Archived),
                conversations::updated_at.eq(Utc::now()),
            ))
            .execute(conn)
            .map_err(AppError::from)
        })
        .await??;

    if updated == 0 {
        return Err(AppError::NotFound("Conversation not found".into()));
    }
    Ok(())
}

/// Soft-deletes a conversation: flags the row deleted (and archived) without
/// removing it. Soft-deleted conversations are invisible to every other
/// operation.
#[instrument(skip(pool), err)]
pub async fn soft_delete(
    pool: &DbPool,
    user_id: Uuid,
    conversation_id: Uuid,
) -> Result<(), AppError> {
    let conn = db::get_conn(pool).await?;
    let updated = conn
        .interact(move |conn| {
            diesel::update(
                conversations::table
                    .filter(conversations::id.eq(conversation_id))
                    .filter(conversations::user_id.eq(user_id))
                    .filter(conversations::deleted_at.is_null()),
            )
            .set((
                conversations::deleted_at.eq(Utc::now()),
                conversations::status.eq(ConversationStatus::Archived),
                conversations::updated_at.eq(Utc::now()),
            ))
            .execute(conn)
            .map_err(AppError::from)
        })
        .await??;

    if updated == 0 {
        return Err(AppError::NotFound("Conversation not found".into()));
    }
    Ok(())
}

/// Lists the user's live conversations, newest first, with display titles.
#[instrument(skip(pool), err)]
pub async fn list(pool: &DbPool, user_id: Uuid) -> Result<Vec<ConversationInfo>, AppError> {
    let conn = db::get_conn(pool).await?;
    conn.interact(move |conn| {
        let rows = conversations::table
            .filter(conversations::user_id.eq(user_id))
            .filter(conversations::deleted_at.is_null())
            .order(conversations::created_at.desc())
            .select(Conversation::as_select())
            .load::<Conversation>(conn)
            .map_err(|e| {
                error!(%user_id, error = ?e, "Failed to load conversations");
                AppError::from(e)
            })?;

        rows.into_iter()
            .map(|conversation| {
                let title = match &conversation.title {
                    Some(title) => title.clone(),
                    None => derive_title(conn, conversation.id)?,
                };
                Ok(ConversationInfo {
                    conversation_id: conversation.id,
                    title,
                    status: conversation.status,
                    last_activity: conversation.last_activity,
                    created_at: conversation.created_at,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()
    })
    .await?
}

// --- internal helpers (run inside interact/transaction) ---

fn ensure_live_user(conn: &mut PgConnection, user_id: Uuid) -> Result<(), AppError> {
    let exists = users::table
        .find(user_id)
        .filter(users::deleted_at.is_null())
        .select(users::id)
        .first::<Uuid>(conn)
        .optional()?;
    if exists.is_none() {
        return Err(AppError::UserNotFound);
    }
    Ok(())
}

/// Like [`ensure_live_user`] but takes a FOR UPDATE lock on the user row, so
/// conversation state transitions for one user serialize.
fn lock_live_user(conn: &mut PgConnection, user_id: Uuid) -> Result<(), AppError> {
    let exists = users::table
        .find(user_id)
        .filter(users::deleted_at.is_null())
        .for_update()
        .select(users::id)
        .first::<Uuid>(conn)
        .optional()?;
    if exists.is_none() {
        return Err(AppError::UserNotFound);
    }
    Ok(())
}

fn touch_last_activity(conn: &mut PgConnection, id: Uuid) -> Result<Conversation, AppError> {
    diesel::update(conversations::table.filter(conversations::id.eq(id)))
        .set((
            conversations::last_activity.eq(Utc::now()),
            conversations::updated_at.eq(Utc::now()),
        ))
        .returning(Conversation::as_returning())
        .get_result::<Conversation>(conn)
        .map_err(AppError::from)
}

fn insert_active(conn: &mut PgConnection, user_id: Uuid) -> Result<Conversation, AppError> {
    let new_conversation = NewConversation {
        user_id,
        title: None,
        status: ConversationStatus::Active,
    };

    match diesel::insert_into(conversations::table)
        .values(&new_conversation)
        .returning(Conversation::as_returning())
        .get_result::<Conversation>(conn)
    {
        Ok(conversation) => {
            info!(conversation_id = %conversation.id, %user_id, "Conversation created");
            Ok(conversation)
        }
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            warn!(%user_id, "Lost race creating active conversation (UniqueViolation)");
            Err(AppError::Conflict(
                "User already has an active conversation".to_string(),
            ))
        }
        Err(e) => {
            error!(%user_id, error = ?e, "Error inserting conversation");
            Err(AppError::from(e))
        }
    }
}

fn archive_active(
    conn: &mut PgConnection,
    user_id: Uuid,
    except: Option<Uuid>,
) -> Result<usize, AppError> {
    let base = conversations::table
        .filter(conversations::user_id.eq(user_id))
        .filter(conversations::status.eq(ConversationStatus::Active))
        .filter(conversations::deleted_at.is_null());

    let archived = match except {
        Some(except_id) => diesel::update(base.filter(conversations::id.ne(except_id)))
            .set((
                conversations::status.eq(ConversationStatus::Archived),
                conversations::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?,
        None => diesel::update(base)
            .set((
                conversations::status.eq(ConversationStatus::Archived),
                conversations::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?,
    };
    Ok(archived)
}

fn derive_title(conn: &mut PgConnection, conversation_id: Uuid) -> Result<String, AppError> {
    use crate::models::messages::MessageRole;

    let first_user_message: Option<String> = messages::table
        .filter(messages::conversation_id.eq(conversation_id))
        .filter(messages::role.eq(MessageRole::User))
        .order(messages::created_at.asc())
        .select(messages::content)
        .first::<String>(conn)
        .optional()?;

    Ok(match first_user_message {
        Some(content) => truncate_title(&content),
        None => format!("Conversation {conversation_id}"),
    })
}

pub(crate) fn truncate_title(text: &str) -> String {
    if text.chars().count() > TITLE_MAX_CHARS {
        let truncated: String = text.chars().take(TITLE_MAX_CHARS).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_title_short_text_unchanged() {
        assert_eq!(truncate_title("hello"), "hello");
    }

    #[test]
    fn test_truncate_title_exact_limit_unchanged() {
        let text = "a".repeat(50);
        assert_eq!(truncate_title(&text), text);
    }

    #[test]
    fn test_truncate_title_long_text_gets_ellipsis() {
        let text = "a".repeat(60);
        let title = truncate_title(&text);
        assert_eq!(title.len(), 53);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_truncate_title_counts_chars_not_bytes() {
        let text = "é".repeat(60);
        let title = truncate_title(&text);
        assert_eq!(title.chars().count(), 53);
    }
}
