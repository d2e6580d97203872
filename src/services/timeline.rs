use chrono::{DateTime, Utc};

use crate::database::DbPool;
use crate::models::message::{Attachment, Message, MessageWithAuthor};
use crate::utils::error::{AppError, AppResult};
use crate::utils::helpers::{clean_optional, new_id};
use crate::utils::time::{MonotonicClock, format_timestamp, normalize_cursor, now_timestamp};
use crate::utils::validation::validate_message_content;

pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 500;

const MESSAGE_WITH_AUTHOR: &str = "SELECT m.id, m.channel_id, m.author_id, m.content, m.attachment_url,
        m.attachment_content_type, m.sent_at, m.edited_at, m.deleted_at, m.rowid AS seq,
        u.username AS author_username, u.display_name AS author_display_name,
        u.profile_picture AS author_profile_picture
     FROM messages m
     JOIN users u ON u.id = m.author_id";

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT)
}

async fn ensure_channel(pool: &DbPool, channel_id: &str) -> AppResult<()> {
    sqlx::query("SELECT 1 FROM channels WHERE id = ?")
        .bind(channel_id)
        .fetch_optional(pool.as_ref())
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound("Channel not found".to_string()))
}

pub async fn append_message(
    pool: &DbPool,
    clock: &MonotonicClock,
    channel_id: &str,
    author_id: &str,
    content: Option<String>,
    attachment: Option<Attachment>,
) -> AppResult<MessageWithAuthor> {
    let content = content.unwrap_or_default();
    let attachment = attachment.filter(|a| !a.url.trim().is_empty());
    validate_message_content(&content, attachment.is_some())?;

    ensure_channel(pool, channel_id).await?;

    sqlx::query("SELECT 1 FROM users WHERE id = ?")
        .bind(author_id)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Author not found".to_string()))?;

    let id = new_id();
    let (attachment_url, attachment_content_type) = match attachment {
        Some(a) => (Some(a.url.trim().to_string()), clean_optional(a.content_type)),
        None => (None, None),
    };

    let stamp = clock.stamp().await;
    let sent_at = format_timestamp(stamp.at);

    sqlx::query(
        "INSERT INTO messages (id, channel_id, author_id, content, attachment_url, attachment_content_type, sent_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(channel_id)
    .bind(author_id)
    .bind(&content)
    .bind(&attachment_url)
    .bind(&attachment_content_type)
    .bind(&sent_at)
    .execute(pool.as_ref())
    .await?;
    drop(stamp);

    tracing::debug!("Message {} appended to channel {}", id, channel_id);

    fetch_with_author(pool, &id)
        .await?
        .ok_or_else(|| AppError::Internal("Message vanished after insert".to_string()))
}

async fn fetch_with_author(pool: &DbPool, id: &str) -> AppResult<Option<MessageWithAuthor>> {
    let message = sqlx::query_as::<_, MessageWithAuthor>(&format!(
        "{MESSAGE_WITH_AUTHOR} WHERE m.id = ?"
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await?;

    Ok(message)
}

/// Visible messages of a channel in ascending `(sent_at, rowid)` order.
///
/// With a `since` cursor this is the oldest `limit` messages strictly after it,
/// which is what a polling client wants. Without one it is the newest `limit`.
pub async fn list_messages(
    pool: &DbPool,
    channel_id: &str,
    since: Option<DateTime<Utc>>,
    limit: Option<i64>,
) -> AppResult<Vec<MessageWithAuthor>> {
    ensure_channel(pool, channel_id).await?;
    let limit = clamp_limit(limit);

    let messages = match normalize_cursor(since) {
        Some(since) => {
            sqlx::query_as::<_, MessageWithAuthor>(&format!(
                "{MESSAGE_WITH_AUTHOR}
                 WHERE m.channel_id = ? AND m.deleted_at IS NULL AND m.sent_at > ?
                 ORDER BY m.sent_at ASC, m.rowid ASC
                 LIMIT ?"
            ))
            .bind(channel_id)
            .bind(format_timestamp(since))
            .bind(limit)
            .fetch_all(pool.as_ref())
            .await?
        }
        None => {
            sqlx::query_as::<_, MessageWithAuthor>(&format!(
                "SELECT * FROM (
                     {MESSAGE_WITH_AUTHOR}
                     WHERE m.channel_id = ? AND m.deleted_at IS NULL
                     ORDER BY m.sent_at DESC, m.rowid DESC
                     LIMIT ?
                 ) ORDER BY sent_at ASC, seq ASC"
            ))
            .bind(channel_id)
            .bind(limit)
            .fetch_all(pool.as_ref())
            .await?
        }
    };

    Ok(messages)
}

pub async fn get_message(pool: &DbPool, id: &str) -> AppResult<MessageWithAuthor> {
    fetch_with_author(pool, id)
        .await?
        .filter(|m| !m.message.is_deleted())
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))
}

pub async fn edit_message(pool: &DbPool, id: &str, content: String) -> AppResult<MessageWithAuthor> {
    let existing = get_message(pool, id).await?;
    validate_message_content(&content, existing.message.attachment_url.is_some())?;

    let result = sqlx::query(
        "UPDATE messages SET content = ?, edited_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&content)
    .bind(now_timestamp())
    .bind(id)
    .execute(pool.as_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Message not found".to_string()));
    }

    get_message(pool, id).await
}

/// Marks a message deleted. Returns the row and whether this call deleted it;
/// repeating the call is a no-op.
pub async fn soft_delete_message(pool: &DbPool, id: &str) -> AppResult<(Message, bool)> {
    let deleted = sqlx::query_as::<_, Message>(
        "UPDATE messages SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL RETURNING *",
    )
    .bind(now_timestamp())
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await?;

    if let Some(message) = deleted {
        tracing::debug!("Message {} soft-deleted", id);
        return Ok((message, true));
    }

    let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;

    Ok((message, false))
}

/// Every stored row of a channel, soft-deleted ones included.
pub async fn list_including_deleted(pool: &DbPool, channel_id: &str) -> AppResult<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(
        "SELECT * FROM messages WHERE channel_id = ? ORDER BY sent_at ASC, rowid ASC",
    )
    .bind(channel_id)
    .fetch_all(pool.as_ref())
    .await?;

    Ok(messages)
}

/// Hard-deletes every message sent before `cutoff`, deleted or not.
pub async fn purge_messages_before(pool: &DbPool, cutoff: DateTime<Utc>) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM messages WHERE sent_at < ?")
        .bind(format_timestamp(cutoff))
        .execute(pool.as_ref())
        .await?;

    Ok(result.rows_affected())
}
