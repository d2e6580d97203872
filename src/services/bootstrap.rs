use crate::database::DbPool;
use crate::services::user::{NewUser, create_user, get_user_by_username};
use crate::utils::error::AppResult;

/// Creates the configured administrator unless an account with that name exists.
pub async fn ensure_admin(pool: &DbPool, username: &str, password: &str) -> AppResult<()> {
    if get_user_by_username(pool, username).await?.is_some() {
        tracing::info!("Admin account {} already exists", username);
        return Ok(());
    }

    tracing::info!("Creating admin account {}", username);

    create_user(
        pool,
        NewUser {
            username: username.to_string(),
            display_name: None,
            password: password.to_string(),
            profile_picture: None,
            is_admin: true,
        },
    )
    .await?;

    Ok(())
}
