use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::models::server::{Server, ServerDetails};
use crate::models::server_member::ServerMember;
use crate::services::server;
use crate::utils::error::AppResult;
use crate::utils::helpers::{created, no_content};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateServerRequest {
    name: String,
    icon: Option<String>,
    owner_id: String,
}

#[derive(Deserialize)]
struct UpdateServerRequest {
    name: Option<String>,
    icon: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddMemberRequest {
    user_id: String,
    role: Option<String>,
}

async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateServerRequest>,
) -> AppResult<(StatusCode, Json<Server>)> {
    let server = server::create_server(&state.db, req.name, req.icon, &req.owner_id).await?;
    Ok(created(server))
}

async fn list(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<Server>>> {
    Ok(Json(server::list_servers(&state.db).await?))
}

async fn list_for_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<Server>>> {
    Ok(Json(server::list_user_servers(&state.db, &user_id).await?))
}

async fn find_by_invite(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> AppResult<Json<Server>> {
    Ok(Json(server::find_by_invite_code(&state.db, &code).await?))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<ServerDetails>> {
    Ok(Json(server::get_server_details(&state.db, &id).await?))
}

async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateServerRequest>,
) -> AppResult<Json<Server>> {
    Ok(Json(
        server::update_server(&state.db, &id, req.name, req.icon).await?,
    ))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    server::delete_server(&state.db, &id).await?;
    Ok(no_content())
}

async fn list_members(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<ServerMember>>> {
    server::get_server(&state.db, &id).await?;
    Ok(Json(server::list_members(&state.db, &id).await?))
}

async fn add_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> AppResult<(StatusCode, Json<ServerMember>)> {
    let member = server::add_member(&state.db, &id, &req.user_id, req.role).await?;
    Ok(created(member))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/user/:user_id", get(list_for_user))
        .route("/findByInvite/:code", get(find_by_invite))
        .route("/:id", get(get_one).put(update).delete(remove))
        .route("/:id/members", get(list_members).post(add_member))
        .with_state(state)
}
