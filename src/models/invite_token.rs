use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::time::parse_timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InviteToken {
    pub id: String,
    pub token: String,
    pub created_by: Option<String>,
    pub used_by: Option<String>,
    pub is_used: bool,
    pub created_at: String,
    pub expires_at: Option<String>,
    /// Uses remaining, not the original budget.
    pub max_uses: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenState {
    Active,
    Consumed,
    Expired,
}

impl InviteToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .as_deref()
            .and_then(parse_timestamp)
            .is_some_and(|expires| expires <= now)
    }

    /// Expiry wins over exhaustion, so a revoked token reads as expired.
    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.is_expired_at(now) {
            TokenState::Expired
        } else if self.max_uses <= 0 {
            TokenState::Consumed
        } else {
            TokenState::Active
        }
    }
}

/// An invite token as the admin API shows it, with its state worked out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteTokenResponse {
    #[serde(flatten)]
    pub token: InviteToken,
    pub state: TokenState,
}

impl From<InviteToken> for InviteTokenResponse {
    fn from(token: InviteToken) -> Self {
        let state = token.state_at(Utc::now());
        Self { token, state }
    }
}
