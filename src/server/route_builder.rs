use axum::{Router, http::StatusCode, routing::get};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api::AppState;
use crate::config::Config;
use crate::database;
use crate::services::bootstrap::ensure_admin;
use crate::services::upload::UploadPolicy;
use crate::utils::jwt::JwtService;
use crate::utils::time::MonotonicClock;
use crate::websocket::hub::ChatHub;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Opens the database, applies migrations and bootstraps the admin account.
pub async fn init_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    let db = database::create_pool(&config.database_url).await?;
    tracing::info!("Database connected and migrations applied");

    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        ensure_admin(&db, username, password).await?;
    }

    let uploads = UploadPolicy::new(config.upload_dir.clone(), config.upload_size_limit_mb);
    tokio::fs::create_dir_all(&uploads.dir).await?;

    Ok(Arc::new(AppState {
        db,
        jwt_service: Arc::new(JwtService::new(&config.secret_key)),
        hub: Arc::new(ChatHub::new()),
        clock: MonotonicClock::new(),
        uploads,
        config,
    }))
}

/// Slow requests are answered with 408 once `limit` passes.
fn request_timeout(limit: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, limit)
}

pub fn register_routes(state: Arc<AppState>) -> Router {
    let http_routes = Router::new()
        .nest("/api", crate::api::routes(state.clone()))
        .nest_service("/uploads", ServeDir::new(&state.uploads.dir))
        .layer(request_timeout(REQUEST_TIMEOUT));

    let hub_route = Router::new()
        .route("/hubs/chat", get(crate::websocket::handlers::hub_handler))
        .with_state(state);

    Router::new()
        .merge(http_routes)
        .merge(hub_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
