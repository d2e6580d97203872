use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::time::format_timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServerMember {
    pub server_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: String,
}

impl ServerMember {
    pub fn new(server_id: String, user_id: String, role: &str) -> Self {
        Self {
            server_id,
            user_id,
            role: role.to_string(),
            joined_at: format_timestamp(Utc::now()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerRole {
    Owner,
    Member,
}

impl ServerRole {
    pub fn as_str(&self) -> &str {
        match self {
            ServerRole::Owner => "owner",
            ServerRole::Member => "member",
        }
    }
}
