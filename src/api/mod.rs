pub mod channels;
pub mod health;
pub mod invite_tokens;
pub mod messages;
pub mod servers;
pub mod streams;
pub mod uploads;
pub mod users;

use axum::Router;
use std::sync::Arc;

use crate::config::Config;
use crate::database::DbPool;
use crate::services::upload::UploadPolicy;
use crate::utils::jwt::JwtService;
use crate::utils::time::MonotonicClock;
use crate::websocket::hub::ChatHub;

pub struct AppState {
    pub db: DbPool,
    pub jwt_service: Arc<JwtService>,
    pub hub: Arc<ChatHub>,
    pub clock: MonotonicClock,
    pub uploads: UploadPolicy,
    pub config: Config,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/users", users::routes(state.clone()))
        .nest("/servers", servers::routes(state.clone()))
        .nest("/channels", channels::routes(state.clone()))
        .nest("/messages", messages::routes(state.clone()))
        .nest("/invitetokens", invite_tokens::routes(state.clone()))
        .nest("/streams", streams::routes(state.clone()))
        .nest("/uploads", uploads::routes(state.clone()))
        .nest("/health", health::routes(state))
}
