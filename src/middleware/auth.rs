use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use std::sync::Arc;

use crate::api::AppState;
use crate::models::user::User;
use crate::utils::error::AppError;

/// The caller behind a valid bearer token whose account is still active.
pub struct CurrentUser(pub User);

/// Same as [`CurrentUser`], and the account must be an administrator.
pub struct AdminUser(pub User);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AppError::Unauthorized("Missing or invalid authorization header".to_string())
                })?;

        let user_id = state.jwt_service.extract_user_id(bearer.token())?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(&user_id)
            .fetch_optional(state.db.as_ref())
            .await?
            .filter(User::is_active)
            .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

        Ok(CurrentUser(user))
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if !user.is_admin {
            tracing::debug!("Rejected admin request from {}", user.username);
            return Err(AppError::Forbidden("Administrator access required".to_string()));
        }

        Ok(AdminUser(user))
    }
}
