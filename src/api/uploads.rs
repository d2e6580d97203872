use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderMap, header},
    routing::post,
};
use std::sync::Arc;

use crate::api::AppState;
use crate::services::upload::{UploadResult, check_declared, public_url, store_stream};
use crate::utils::error::{AppError, AppResult};

/// `scheme://host` as the client addressed us, honouring a proxy's forwarded proto.
fn request_base_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    format!("{}://{}", scheme, host)
}

async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResult>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::File(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let declared = check_declared(field.content_type(), field.file_name())?;
        let stored = store_stream(&state.uploads, &declared, Box::pin(field)).await?;

        let base_url = state
            .config
            .public_base_url
            .clone()
            .unwrap_or_else(|| request_base_url(&headers));

        return Ok(Json(UploadResult {
            url: public_url(&base_url, &stored.file_name),
            content_type: declared.content_type,
        }));
    }

    Err(AppError::File("No file uploaded".to_string()))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(upload))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}
