use std::collections::HashSet;

use sqlx::SqliteConnection;

use crate::database::DbPool;
use crate::models::channel::{Channel, ChannelKind};
use crate::utils::error::{AppError, AppResult, conflict_on_unique, is_foreign_key_violation};
use crate::utils::helpers::clean_optional;
use crate::utils::validation::validate_channel_name;

const DUPLICATE_NAME: &str = "A channel with that name already exists in this server";

#[derive(Debug, Default, Clone)]
pub struct ChannelChanges {
    pub name: Option<String>,
    pub kind: Option<ChannelKind>,
    /// `Some("")` clears the category.
    pub category: Option<String>,
}

pub async fn create_channel(
    pool: &DbPool,
    server_id: &str,
    name: String,
    kind: ChannelKind,
    category: Option<String>,
) -> AppResult<Channel> {
    let name = name.trim().to_string();
    validate_channel_name(&name)?;

    let draft = Channel::new(server_id.to_string(), name, kind, clean_optional(category), 0);

    // One statement, so the position read and the insert share the write lock
    // and concurrent creations queue on busy_timeout instead of failing.
    let channel = sqlx::query_as::<_, Channel>(
        "INSERT INTO channels (id, server_id, name, channel_type, category, position, created_at)
         SELECT ?, ?, ?, ?, ?, COALESCE(MAX(position), -1) + 1, ?
         FROM channels WHERE server_id = ?
         RETURNING *",
    )
    .bind(&draft.id)
    .bind(&draft.server_id)
    .bind(&draft.name)
    .bind(&draft.channel_type)
    .bind(&draft.category)
    .bind(&draft.created_at)
    .bind(server_id)
    .fetch_one(pool.as_ref())
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            AppError::NotFound("Server not found".to_string())
        } else {
            conflict_on_unique(e, DUPLICATE_NAME)
        }
    })?;

    tracing::info!(
        "Channel {} ({}) created in server {}",
        channel.name,
        channel.id,
        server_id
    );

    Ok(channel)
}

pub async fn get_channel(pool: &DbPool, id: &str) -> AppResult<Channel> {
    sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Channel not found".to_string()))
}

pub async fn get_server_channels(pool: &DbPool, server_id: &str) -> AppResult<Vec<Channel>> {
    let mut conn = pool.acquire().await?;
    Ok(channels_in_order(&mut conn, server_id).await?)
}

async fn channels_in_order(
    conn: &mut SqliteConnection,
    server_id: &str,
) -> Result<Vec<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        "SELECT * FROM channels WHERE server_id = ? ORDER BY position ASC, created_at ASC, rowid ASC",
    )
    .bind(server_id)
    .fetch_all(conn)
    .await
}

pub async fn update_channel(pool: &DbPool, id: &str, changes: ChannelChanges) -> AppResult<Channel> {
    let mut channel = get_channel(pool, id).await?;

    if let Some(name) = changes.name {
        let name = name.trim().to_string();
        validate_channel_name(&name)?;
        channel.name = name;
    }
    if let Some(kind) = changes.kind {
        channel.channel_type = kind.as_str().to_string();
    }
    if let Some(category) = changes.category {
        channel.category = clean_optional(Some(category));
    }

    sqlx::query("UPDATE channels SET name = ?, channel_type = ?, category = ? WHERE id = ?")
        .bind(&channel.name)
        .bind(&channel.channel_type)
        .bind(&channel.category)
        .bind(id)
        .execute(pool.as_ref())
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_NAME))?;

    Ok(channel)
}

/// Removes a channel with its messages and streams, then closes the gap it
/// leaves in the server's positions.
pub async fn delete_channel(pool: &DbPool, id: &str) -> AppResult<()> {
    let channel = get_channel(pool, id).await?;
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM messages WHERE channel_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM active_streams WHERE channel_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM channels WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    normalize_positions_with(&mut tx, &channel.server_id).await?;
    tx.commit().await?;

    tracing::info!("Channel {} deleted from server {}", id, channel.server_id);
    Ok(())
}

/// Puts the listed channels first, in list order. Channels left out keep their
/// previous relative order after them, so positions stay dense.
pub async fn reorder_channels(
    pool: &DbPool,
    server_id: &str,
    ordered_ids: &[String],
) -> AppResult<Vec<Channel>> {
    let mut tx = pool.begin().await?;
    lock_server(&mut tx, server_id).await?;

    let current = channels_in_order(&mut tx, server_id).await?;

    let known: HashSet<&str> = current.iter().map(|c| c.id.as_str()).collect();
    let mut seen = HashSet::new();
    for id in ordered_ids {
        if !known.contains(id.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Channel {} does not belong to this server",
                id
            )));
        }
        if !seen.insert(id.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Channel {} is listed more than once",
                id
            )));
        }
    }

    let order = ordered_ids
        .iter()
        .map(String::as_str)
        .chain(
            current
                .iter()
                .map(|c| c.id.as_str())
                .filter(|id| !seen.contains(id)),
        )
        .collect::<Vec<_>>();

    assign_positions(&mut tx, &order).await?;
    let reordered = channels_in_order(&mut tx, server_id).await?;
    tx.commit().await?;

    Ok(reordered)
}

pub async fn normalize_positions(pool: &DbPool, server_id: &str) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    lock_server(&mut tx, server_id).await?;
    normalize_positions_with(&mut tx, server_id).await?;
    tx.commit().await?;
    Ok(())
}

/// Checks the server exists with a no-op write, so the transaction holds the
/// write lock before it reads. A deferred transaction that reads first cannot
/// wait for a concurrent writer; SQLite fails its lock upgrade immediately.
async fn lock_server(conn: &mut SqliteConnection, server_id: &str) -> AppResult<()> {
    let touched = sqlx::query("UPDATE servers SET name = name WHERE id = ?")
        .bind(server_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if touched == 0 {
        return Err(AppError::NotFound("Server not found".to_string()));
    }
    Ok(())
}

/// Rewrites positions to 0..N-1 following the current `(position, created_at)` order.
pub async fn normalize_positions_with(
    conn: &mut SqliteConnection,
    server_id: &str,
) -> Result<(), sqlx::Error> {
    let channels = channels_in_order(conn, server_id).await?;
    let order = channels.iter().map(|c| c.id.as_str()).collect::<Vec<_>>();
    assign_positions(conn, &order).await
}

async fn assign_positions(conn: &mut SqliteConnection, order: &[&str]) -> Result<(), sqlx::Error> {
    for (position, id) in order.iter().enumerate() {
        sqlx::query("UPDATE channels SET position = ? WHERE id = ? AND position != ?")
            .bind(position as i64)
            .bind(id)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
