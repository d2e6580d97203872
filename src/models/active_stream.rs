use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::time::format_timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActiveStream {
    pub id: String,
    pub channel_id: String,
    pub streamer_id: String,
    pub started_at: String,
    pub ended_at: Option<String>,
}

impl ActiveStream {
    pub fn new(channel_id: String, streamer_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            channel_id,
            streamer_id,
            started_at: format_timestamp(Utc::now()),
            ended_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.ended_at.is_none()
    }
}
