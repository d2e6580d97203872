use crate::database::DbPool;
use crate::models::active_stream::ActiveStream;
use crate::utils::error::{AppError, AppResult};
use crate::utils::time::now_timestamp;

pub async fn create_stream(pool: &DbPool, channel_id: &str, streamer_id: &str) -> AppResult<ActiveStream> {
    sqlx::query("SELECT 1 FROM channels WHERE id = ?")
        .bind(channel_id)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Channel not found".to_string()))?;

    sqlx::query("SELECT 1 FROM users WHERE id = ?")
        .bind(streamer_id)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Streamer not found".to_string()))?;

    let stream = ActiveStream::new(channel_id.to_string(), streamer_id.to_string());

    sqlx::query(
        "INSERT INTO active_streams (id, channel_id, streamer_id, started_at, ended_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&stream.id)
    .bind(&stream.channel_id)
    .bind(&stream.streamer_id)
    .bind(&stream.started_at)
    .bind(&stream.ended_at)
    .execute(pool.as_ref())
    .await?;

    tracing::info!("Stream {} started in channel {}", stream.id, channel_id);
    Ok(stream)
}

pub async fn list_active_streams(pool: &DbPool) -> AppResult<Vec<ActiveStream>> {
    let streams = sqlx::query_as::<_, ActiveStream>(
        "SELECT * FROM active_streams WHERE ended_at IS NULL ORDER BY started_at DESC",
    )
    .fetch_all(pool.as_ref())
    .await?;

    Ok(streams)
}

pub async fn get_stream(pool: &DbPool, id: &str) -> AppResult<ActiveStream> {
    sqlx::query_as::<_, ActiveStream>("SELECT * FROM active_streams WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Stream not found".to_string()))
}

/// Stamps `ended_at` the first time; later calls leave it alone.
pub async fn end_stream(pool: &DbPool, id: &str) -> AppResult<ActiveStream> {
    sqlx::query("UPDATE active_streams SET ended_at = ? WHERE id = ? AND ended_at IS NULL")
        .bind(now_timestamp())
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    get_stream(pool, id).await
}
