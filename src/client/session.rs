use crate::models::user::UserResponse;

/// A signed-in identity. Never mutated: signing in produces a new `Session`
/// and signing out consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    user: UserResponse,
    token: String,
}

impl Session {
    pub fn new(user: UserResponse, token: String) -> Self {
        Self { user, token }
    }

    pub fn user(&self) -> &UserResponse {
        &self.user
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }

    pub fn display_name(&self) -> &str {
        self.user
            .display_name
            .as_deref()
            .unwrap_or(&self.user.username)
    }

    pub fn sign_out(self) {
        tracing::debug!("Session for {} ended", self.user.username);
    }
}
