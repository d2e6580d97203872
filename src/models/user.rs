use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::time::format_timestamp;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub password_hash: String,
    pub profile_picture: Option<String>,
    pub is_admin: bool,
    pub created_at: String,
}

impl User {
    pub fn new(
        username: String,
        display_name: Option<String>,
        password_hash: String,
        is_admin: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            display_name,
            password_hash,
            profile_picture: None,
            is_admin,
            created_at: format_timestamp(Utc::now()),
        }
    }

    /// An empty hash marks a deactivated account.
    pub fn is_active(&self) -> bool {
        !self.password_hash.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub profile_picture: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let is_active = user.is_active();
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            profile_picture: user.profile_picture,
            is_admin: user.is_admin,
            is_active,
            created_at: user.created_at,
        }
    }
}
