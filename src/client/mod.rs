//! Headless client core: everything a desktop front end needs short of drawing.

pub mod api;
pub mod feed;
pub mod hub;
pub mod poller;
pub mod presentation;
pub mod session;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

pub type ClientResult<T> = Result<T, ClientError>;
