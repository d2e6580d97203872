use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::time::format_timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub server_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub category: Option<String>,
    pub position: i64,
    pub created_at: String,
}

impl Channel {
    pub fn new(
        server_id: String,
        name: String,
        kind: ChannelKind,
        category: Option<String>,
        position: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            server_id,
            name,
            channel_type: kind.as_str().to_string(),
            category,
            position,
            created_at: format_timestamp(Utc::now()),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        ChannelKind::parse(&self.channel_type).unwrap_or(ChannelKind::Text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    #[default]
    Text,
    Voice,
}

impl ChannelKind {
    pub fn as_str(&self) -> &str {
        match self {
            ChannelKind::Text => "text",
            ChannelKind::Voice => "voice",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Some(ChannelKind::Text),
            "voice" => Some(ChannelKind::Voice),
            _ => None,
        }
    }
}
