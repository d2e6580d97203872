use chrono::{DateTime, Utc};
use rand::{Rng, rngs::OsRng};
use sqlx::SqliteConnection;
use thiserror::Error;

use crate::database::DbPool;
use crate::models::invite_token::InviteToken;
use crate::utils::error::{AppError, AppResult, conflict_on_unique};
use crate::utils::helpers::new_id;
use crate::utils::time::{format_timestamp, now_timestamp};

/// Letters and digits minus the easily confused `I`, `O`, `0` and `1`.
pub const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const DEFAULT_TOKEN_LENGTH: usize = 20;
const LIST_LIMIT: i64 = 100;

#[derive(Error, Debug)]
pub enum InviteError {
    #[error("Invite token not found")]
    NotFound,

    #[error("Invite token expired")]
    Expired,

    #[error("Invite token already used")]
    Exhausted,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<InviteError> for AppError {
    fn from(err: InviteError) -> Self {
        match err {
            InviteError::NotFound => AppError::NotFound(err.to_string()),
            InviteError::Expired | InviteError::Exhausted => AppError::BadRequest(err.to_string()),
            InviteError::Database(e) => AppError::Database(e),
        }
    }
}

pub fn generate_token(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

pub async fn create_invite(
    pool: &DbPool,
    created_by: Option<String>,
    max_uses: i64,
    expires_at: Option<DateTime<Utc>>,
) -> AppResult<InviteToken> {
    if max_uses < 1 {
        return Err(AppError::Validation(
            "maxUses must be at least 1".to_string(),
        ));
    }

    let invite = InviteToken {
        id: new_id(),
        token: generate_token(DEFAULT_TOKEN_LENGTH),
        created_by,
        used_by: None,
        is_used: false,
        created_at: now_timestamp(),
        expires_at: expires_at.map(format_timestamp),
        max_uses,
    };

    sqlx::query(
        "INSERT INTO invite_tokens (id, token, created_by, used_by, is_used, created_at, expires_at, max_uses)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&invite.id)
    .bind(&invite.token)
    .bind(&invite.created_by)
    .bind(&invite.used_by)
    .bind(invite.is_used)
    .bind(&invite.created_at)
    .bind(&invite.expires_at)
    .bind(invite.max_uses)
    .execute(pool.as_ref())
    .await
    .map_err(|e| conflict_on_unique(e, "Token collision, try again"))?;

    tracing::info!(
        "Invite token {} created (max_uses={}, expires_at={:?})",
        invite.id,
        invite.max_uses,
        invite.expires_at
    );

    Ok(invite)
}

pub async fn consume_invite(
    pool: &DbPool,
    token: &str,
    used_by: Option<&str>,
) -> Result<InviteToken, InviteError> {
    let mut conn = pool.acquire().await?;
    consume_invite_with(&mut conn, token, used_by).await
}

/// Spends one use of `token`. The decrement is a single conditional update, so
/// concurrent callers can never spend more uses than the token has.
pub async fn consume_invite_with(
    conn: &mut SqliteConnection,
    token: &str,
    used_by: Option<&str>,
) -> Result<InviteToken, InviteError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(InviteError::NotFound);
    }

    let now = Utc::now();
    let now_str = format_timestamp(now);

    let consumed = sqlx::query_as::<_, InviteToken>(
        "UPDATE invite_tokens
         SET max_uses = max_uses - 1,
             is_used = CASE WHEN max_uses - 1 <= 0 THEN 1 ELSE is_used END,
             used_by = COALESCE(?, used_by)
         WHERE token = ? AND max_uses > 0 AND (expires_at IS NULL OR expires_at > ?)
         RETURNING *",
    )
    .bind(used_by)
    .bind(token)
    .bind(&now_str)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(invite) = consumed {
        tracing::debug!(
            "Invite token {} consumed, {} uses left",
            invite.id,
            invite.max_uses
        );
        return Ok(invite);
    }

    let existing = sqlx::query_as::<_, InviteToken>("SELECT * FROM invite_tokens WHERE token = ?")
        .bind(token)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(InviteError::NotFound)?;

    if existing.is_expired_at(now) {
        Err(InviteError::Expired)
    } else {
        Err(InviteError::Exhausted)
    }
}

pub async fn revoke_invite(pool: &DbPool, id: &str) -> AppResult<InviteToken> {
    let invite = get_invite(pool, id).await?;
    if invite.max_uses <= 0 {
        return Ok(invite);
    }

    let revoked = sqlx::query_as::<_, InviteToken>(
        "UPDATE invite_tokens SET max_uses = 0, is_used = 1, expires_at = ? WHERE id = ? RETURNING *",
    )
    .bind(now_timestamp())
    .bind(id)
    .fetch_one(pool.as_ref())
    .await?;

    tracing::info!("Invite token {} revoked", id);
    Ok(revoked)
}

pub async fn list_invites(pool: &DbPool) -> AppResult<Vec<InviteToken>> {
    let invites = sqlx::query_as::<_, InviteToken>(
        "SELECT * FROM invite_tokens ORDER BY created_at DESC LIMIT ?",
    )
    .bind(LIST_LIMIT)
    .fetch_all(pool.as_ref())
    .await?;

    Ok(invites)
}

pub async fn get_invite(pool: &DbPool, id: &str) -> AppResult<InviteToken> {
    sqlx::query_as::<_, InviteToken>("SELECT * FROM invite_tokens WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Invite token not found".to_string()))
}

pub async fn update_invite(
    pool: &DbPool,
    id: &str,
    expires_at: Option<DateTime<Utc>>,
    max_uses: i64,
) -> AppResult<InviteToken> {
    if max_uses < 0 {
        return Err(AppError::Validation(
            "maxUses cannot be negative".to_string(),
        ));
    }

    sqlx::query_as::<_, InviteToken>(
        "UPDATE invite_tokens SET expires_at = ?, max_uses = ?, is_used = ? WHERE id = ? RETURNING *",
    )
    .bind(expires_at.map(format_timestamp))
    .bind(max_uses)
    .bind(max_uses == 0)
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await?
    .ok_or_else(|| AppError::NotFound("Invite token not found".to_string()))
}

pub async fn delete_invite(pool: &DbPool, id: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM invite_tokens WHERE id = ?")
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Invite token not found".to_string()));
    }

    Ok(())
}
