use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::middleware::auth::AdminUser;
use crate::models::message::{Attachment, Message, MessageWithAuthor};
use crate::services::timeline;
use crate::utils::error::{AppError, AppResult};
use crate::utils::helpers::{created, no_content};
use crate::utils::time::parse_timestamp;
use crate::websocket::events::ServerMessage;

#[derive(Deserialize)]
struct ListQuery {
    since: Option<String>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMessageRequest {
    channel_id: String,
    author_id: String,
    content: Option<String>,
    attachment_url: Option<String>,
    attachment_content_type: Option<String>,
}

#[derive(Deserialize)]
struct EditMessageRequest {
    content: String,
}

async fn list_for_channel(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<MessageWithAuthor>>> {
    let since = match query.since.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| {
            AppError::Validation(format!("Invalid since timestamp: {}", raw))
        })?),
    };

    let messages = timeline::list_messages(&state.db, &channel_id, since, query.limit).await?;
    Ok(Json(messages))
}

async fn list_all_for_channel(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(channel_id): Path<String>,
) -> AppResult<Json<Vec<Message>>> {
    Ok(Json(
        timeline::list_including_deleted(&state.db, &channel_id).await?,
    ))
}

async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateMessageRequest>,
) -> AppResult<(StatusCode, Json<MessageWithAuthor>)> {
    let attachment = req.attachment_url.map(|url| Attachment {
        url,
        content_type: req.attachment_content_type,
    });

    let message = timeline::append_message(
        &state.db,
        &state.clock,
        &req.channel_id,
        &req.author_id,
        req.content,
        attachment,
    )
    .await?;

    let delivered = state
        .hub
        .publish(
            &message.message.channel_id,
            ServerMessage::NewMessage {
                message: message.clone(),
            },
        )
        .await;
    tracing::debug!(
        "Message {} pushed to {} connection(s)",
        message.message.id,
        delivered
    );

    Ok(created(message))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageWithAuthor>> {
    Ok(Json(timeline::get_message(&state.db, &id).await?))
}

async fn edit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<EditMessageRequest>,
) -> AppResult<Json<MessageWithAuthor>> {
    let message = timeline::edit_message(&state.db, &id, req.content).await?;

    state
        .hub
        .publish(
            &message.message.channel_id,
            ServerMessage::MessageEdited {
                message: message.clone(),
            },
        )
        .await;

    Ok(Json(message))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let (message, newly_deleted) = timeline::soft_delete_message(&state.db, &id).await?;

    if newly_deleted {
        state
            .hub
            .publish(
                &message.channel_id,
                ServerMessage::MessageDeleted {
                    channel_id: message.channel_id.clone(),
                    message_id: message.id.clone(),
                },
            )
            .await;
    }

    Ok(no_content())
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(create))
        .route("/channel/:channel_id", get(list_for_channel))
        .route("/channel/:channel_id/all", get(list_all_for_channel))
        .route("/:id", get(get_one).put(edit).delete(remove))
        .with_state(state)
}
