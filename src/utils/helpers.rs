use axum::{Json, http::StatusCode};
use serde::Serialize;

pub fn created<T: Serialize>(value: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(value))
}

pub fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Trims and drops empty optional text.
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
