use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::channel::Channel;
use crate::models::server_member::ServerMember;
use crate::utils::time::format_timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub owner_id: String,
    pub created_at: String,
}

impl Server {
    pub fn new(name: String, icon: Option<String>, owner_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            icon,
            owner_id,
            created_at: format_timestamp(Utc::now()),
        }
    }

    /// Short shareable code: the first eight hex digits of the id, uppercased.
    pub fn invite_code(&self) -> String {
        self.id
            .chars()
            .filter(|c| c.is_ascii_hexdigit())
            .take(8)
            .collect::<String>()
            .to_uppercase()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDetails {
    #[serde(flatten)]
    pub server: Server,
    pub invite_code: String,
    pub channels: Vec<Channel>,
    pub members: Vec<ServerMember>,
}
