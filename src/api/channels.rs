use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::models::channel::{Channel, ChannelKind};
use crate::services::channel::{self, ChannelChanges};
use crate::utils::error::{AppError, AppResult};
use crate::utils::helpers::{created, no_content};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateChannelRequest {
    server_id: String,
    name: String,
    #[serde(rename = "type")]
    channel_type: Option<String>,
    category: Option<String>,
}

#[derive(Deserialize)]
struct UpdateChannelRequest {
    name: Option<String>,
    #[serde(rename = "type")]
    channel_type: Option<String>,
    category: Option<String>,
}

fn parse_kind(raw: Option<&str>) -> AppResult<Option<ChannelKind>> {
    raw.map(|value| {
        ChannelKind::parse(value).ok_or_else(|| {
            AppError::Validation("Channel type must be 'text' or 'voice'".to_string())
        })
    })
    .transpose()
}

async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateChannelRequest>,
) -> AppResult<(StatusCode, Json<Channel>)> {
    let kind = parse_kind(req.channel_type.as_deref())?.unwrap_or_default();
    let channel =
        channel::create_channel(&state.db, &req.server_id, req.name, kind, req.category).await?;
    Ok(created(channel))
}

async fn list_for_server(
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<String>,
) -> AppResult<Json<Vec<Channel>>> {
    Ok(Json(channel::get_server_channels(&state.db, &server_id).await?))
}

async fn reorder(
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<String>,
    Json(ordered_ids): Json<Vec<String>>,
) -> AppResult<Json<Vec<Channel>>> {
    Ok(Json(
        channel::reorder_channels(&state.db, &server_id, &ordered_ids).await?,
    ))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Channel>> {
    Ok(Json(channel::get_channel(&state.db, &id).await?))
}

async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateChannelRequest>,
) -> AppResult<Json<Channel>> {
    let changes = ChannelChanges {
        name: req.name,
        kind: parse_kind(req.channel_type.as_deref())?,
        category: req.category,
    };
    Ok(Json(channel::update_channel(&state.db, &id, changes).await?))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    channel::delete_channel(&state.db, &id).await?;
    Ok(no_content())
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(create))
        .route("/server/:server_id", get(list_for_server))
        .route("/server/:server_id/reorder", post(reorder))
        .route("/:id", get(get_one).put(update).delete(remove))
        .with_state(state)
}
