use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::api::AppState;
use crate::middleware::auth::AdminUser;
use crate::models::user::UserResponse;
use crate::services::user::{self, NewUser, Registration, UserChanges};
use crate::utils::error::AppResult;
use crate::utils::helpers::{created, no_content};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[serde(default)]
    invite_token: String,
    #[serde(default)]
    username: String,
    display_name: Option<String>,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    user: UserResponse,
    token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserRequest {
    username: String,
    display_name: Option<String>,
    password: String,
    profile_picture: Option<String>,
    #[serde(default)]
    is_admin: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    username: Option<String>,
    display_name: Option<String>,
    profile_picture: Option<String>,
    is_admin: Option<bool>,
    password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExistsQuery {
    username: String,
    exclude_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReactivateResponse {
    user: UserResponse,
    temporary_password: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = user::register_user(
        &state.db,
        Registration {
            invite_token: req.invite_token,
            username: req.username,
            display_name: req.display_name,
            password: req.password,
        },
    )
    .await?;

    Ok(Json(user.into()))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = user::login(&state.db, &req.username, &req.password).await?;
    let token = state.jwt_service.generate_token(&user.id, &user.username)?;

    tracing::info!("User {} logged in", user.username);
    Ok(Json(LoginResponse {
        user: user.into(),
        token,
    }))
}

async fn list(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<UserResponse>>> {
    let users = user::list_users(&state.db).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<UserResponse>> {
    Ok(Json(user::get_user(&state.db, &id).await?.into()))
}

async fn exists(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExistsQuery>,
) -> AppResult<Json<Value>> {
    let exists =
        user::username_exists(&state.db, &query.username, query.exclude_id.as_deref()).await?;
    Ok(Json(json!({ "exists": exists })))
}

async fn create(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = user::create_user(
        &state.db,
        NewUser {
            username: req.username,
            display_name: req.display_name,
            password: req.password,
            profile_picture: req.profile_picture,
            is_admin: req.is_admin,
        },
    )
    .await?;

    tracing::info!("Admin {} created user {}", admin.username, user.username);
    Ok(created(user.into()))
}

async fn update(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = user::update_user(
        &state.db,
        &id,
        UserChanges {
            username: req.username,
            display_name: req.display_name,
            profile_picture: req.profile_picture,
            is_admin: req.is_admin,
            password: req.password,
        },
    )
    .await?;

    Ok(Json(user.into()))
}

async fn deactivate(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<UserResponse>> {
    Ok(Json(user::deactivate_user(&state.db, &id).await?.into()))
}

async fn reactivate(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<ReactivateResponse>> {
    let (user, temporary_password) = user::reactivate_user(&state.db, &id).await?;
    Ok(Json(ReactivateResponse {
        user: user.into(),
        temporary_password,
    }))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    user::delete_user(&state.db, &id).await?;
    tracing::info!("Admin {} deleted user {}", admin.username, id);
    Ok(no_content())
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/exists", get(exists))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/:id", get(get_one).put(update).delete(remove))
        .route("/:id/deactivate", post(deactivate))
        .route("/:id/reactivate", post(reactivate))
        .with_state(state)
}
