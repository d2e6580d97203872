use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::models::active_stream::ActiveStream;
use crate::services::stream;
use crate::utils::error::AppResult;
use crate::utils::helpers::created;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartStreamRequest {
    channel_id: String,
    streamer_id: String,
}

async fn start(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartStreamRequest>,
) -> AppResult<(StatusCode, Json<ActiveStream>)> {
    let stream = stream::create_stream(&state.db, &req.channel_id, &req.streamer_id).await?;
    Ok(created(stream))
}

async fn list_active(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<ActiveStream>>> {
    Ok(Json(stream::list_active_streams(&state.db).await?))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<ActiveStream>> {
    Ok(Json(stream::get_stream(&state.db, &id).await?))
}

async fn end(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<ActiveStream>> {
    Ok(Json(stream::end_stream(&state.db, &id).await?))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list_active).post(start))
        .route("/:id", get(get_one))
        .route("/:id/end", put(end))
        .with_state(state)
}
