use axum::{
    extract::{Query, State, ws::WebSocketUpgrade},
    http::{HeaderMap, header},
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;

#[derive(Deserialize)]
pub struct HubQuery {
    token: Option<String>,
}

/// Upgrades `/hubs/chat`. A bearer token (query or header) only labels the
/// connection in logs; joining groups needs no account.
pub async fn hub_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HubQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = query.token.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| t.to_string())
    });

    let user = token
        .and_then(|t| state.jwt_service.extract_user_id(&t).ok())
        .unwrap_or_else(|| "anonymous".to_string());

    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| hub.handle_connection(socket, user))
}
