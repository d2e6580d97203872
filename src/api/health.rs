use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::api::AppState;
use crate::utils::error::AppResult;

async fn health_check(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    sqlx::query("SELECT 1").execute(state.db.as_ref()).await?;
    Ok(Json(json!({ "status": "ok" })))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new().route("/", get(health_check)).with_state(state)
}
