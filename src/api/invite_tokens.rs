use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::middleware::auth::AdminUser;
use crate::models::invite_token::InviteTokenResponse;
use crate::services::invite;
use crate::utils::error::{AppError, AppResult};
use crate::utils::helpers::{created, no_content};
use crate::utils::time::parse_timestamp;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateInviteRequest {
    max_uses: Option<i64>,
    expires_at: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateInviteRequest {
    max_uses: i64,
    expires_at: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsumeRequest {
    token: String,
    user_id: Option<String>,
}

fn parse_expiry(raw: Option<&str>) -> AppResult<Option<DateTime<Utc>>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_timestamp(value)
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("Invalid expiresAt: {}", value))),
    }
}

async fn create(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreateInviteRequest>,
) -> AppResult<(StatusCode, Json<InviteTokenResponse>)> {
    let expires_at = parse_expiry(req.expires_at.as_deref())?;
    let invite =
        invite::create_invite(&state.db, Some(admin.id), req.max_uses.unwrap_or(1), expires_at)
            .await?;
    Ok(created(InviteTokenResponse::from(invite)))
}

async fn list(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<InviteTokenResponse>>> {
    let invites = invite::list_invites(&state.db).await?;
    Ok(Json(invites.into_iter().map(InviteTokenResponse::from).collect()))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<InviteTokenResponse>> {
    Ok(Json(invite::get_invite(&state.db, &id).await?.into()))
}

async fn update(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateInviteRequest>,
) -> AppResult<Json<InviteTokenResponse>> {
    let expires_at = parse_expiry(req.expires_at.as_deref())?;
    Ok(Json(
        invite::update_invite(&state.db, &id, expires_at, req.max_uses)
            .await?
            .into(),
    ))
}

async fn revoke(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<InviteTokenResponse>> {
    Ok(Json(invite::revoke_invite(&state.db, &id).await?.into()))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    invite::delete_invite(&state.db, &id).await?;
    Ok(no_content())
}

async fn consume(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConsumeRequest>,
) -> AppResult<StatusCode> {
    if let Some(user_id) = req.user_id.as_deref() {
        crate::services::user::get_user(&state.db, user_id).await?;
    }

    invite::consume_invite(&state.db, &req.token, req.user_id.as_deref()).await?;
    Ok(StatusCode::OK)
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/consume", post(consume))
        .route("/:id", get(get_one).put(update).delete(remove))
        .route("/:id/revoke", post(revoke))
        .with_state(state)
}
