use sqlx::Row;

use crate::database::DbPool;
use crate::models::user::User;
use crate::services::invite::{InviteError, consume_invite_with, generate_token};
use crate::services::server::delete_server_with;
use crate::utils::crypto::{hash_password, verify_password};
use crate::utils::error::{AppError, AppResult, conflict_on_unique};
use crate::utils::helpers::clean_optional;
use crate::utils::validation::{validate_password, validate_username};

const DUPLICATE_USERNAME: &str = "Username already exists";
const TEMPORARY_PASSWORD_LENGTH: usize = 12;

#[derive(Debug, Clone)]
pub struct Registration {
    pub invite_token: String,
    pub username: String,
    pub display_name: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub display_name: Option<String>,
    pub password: String,
    pub profile_picture: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub profile_picture: Option<String>,
    pub is_admin: Option<bool>,
    pub password: Option<String>,
}

async fn insert_user<'e, E>(executor: E, user: &User) -> AppResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO users (id, username, display_name, password_hash, profile_picture, is_admin, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.display_name)
    .bind(&user.password_hash)
    .bind(&user.profile_picture)
    .bind(user.is_admin)
    .bind(&user.created_at)
    .execute(executor)
    .await
    .map_err(|e| conflict_on_unique(e, DUPLICATE_USERNAME))?;

    Ok(())
}

/// Creates a user against an invite token. Spending the invite and inserting
/// the user commit together, so a rejected username leaves the invite intact.
pub async fn register_user(pool: &DbPool, registration: Registration) -> AppResult<User> {
    if registration.invite_token.trim().is_empty() {
        return Err(AppError::Validation("Invite token is required".to_string()));
    }
    let username = registration.username.trim().to_string();
    if username.is_empty() || registration.password.is_empty() {
        return Err(AppError::Validation(
            "Username and password are required".to_string(),
        ));
    }
    validate_username(&username)?;
    validate_password(&registration.password)?;

    let display_name = clean_optional(registration.display_name).or_else(|| Some(username.clone()));
    let user = User::new(
        username,
        display_name,
        hash_password(&registration.password),
        false,
    );

    let mut tx = pool.begin().await?;

    consume_invite_with(&mut tx, &registration.invite_token, None)
        .await
        .map_err(|e| match e {
            InviteError::NotFound => AppError::BadRequest("Invalid invite token".to_string()),
            InviteError::Database(e) => AppError::Database(e),
            other => AppError::BadRequest(other.to_string()),
        })?;

    insert_user(&mut *tx, &user).await?;

    sqlx::query("UPDATE invite_tokens SET used_by = ? WHERE token = ?")
        .bind(&user.id)
        .bind(registration.invite_token.trim())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!("User {} registered ({})", user.username, user.id);
    Ok(user)
}

/// Checks credentials. Every failure looks the same to the caller.
pub async fn login(pool: &DbPool, username: &str, password: &str) -> AppResult<User> {
    let invalid = || AppError::Auth("Invalid credentials".to_string());

    if username.trim().is_empty() || password.is_empty() {
        return Err(invalid());
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username.trim())
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(invalid)?;

    if !user.is_active() || !verify_password(&user.password_hash, password) {
        tracing::debug!("Failed login for {}", user.username);
        return Err(invalid());
    }

    Ok(user)
}

pub async fn list_users(pool: &DbPool) -> AppResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username ASC")
        .fetch_all(pool.as_ref())
        .await?;

    Ok(users)
}

pub async fn get_user(pool: &DbPool, id: &str) -> AppResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn get_user_by_username(pool: &DbPool, username: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username.trim())
        .fetch_optional(pool.as_ref())
        .await?;

    Ok(user)
}

pub async fn username_exists(
    pool: &DbPool,
    username: &str,
    exclude_id: Option<&str>,
) -> AppResult<bool> {
    let count = sqlx::query(
        "SELECT COUNT(*) as count FROM users WHERE username = ? AND (? IS NULL OR id != ?)",
    )
    .bind(username.trim())
    .bind(exclude_id)
    .bind(exclude_id)
    .fetch_one(pool.as_ref())
    .await?
    .get::<i64, _>("count");

    Ok(count > 0)
}

pub async fn create_user(pool: &DbPool, new_user: NewUser) -> AppResult<User> {
    let username = new_user.username.trim().to_string();
    validate_username(&username)?;
    validate_password(&new_user.password)?;

    let display_name = clean_optional(new_user.display_name).or_else(|| Some(username.clone()));
    let mut user = User::new(
        username,
        display_name,
        hash_password(&new_user.password),
        new_user.is_admin,
    );
    user.profile_picture = clean_optional(new_user.profile_picture);

    insert_user(pool.as_ref(), &user).await?;

    tracing::info!("User {} created (admin={})", user.username, user.is_admin);
    Ok(user)
}

pub async fn update_user(pool: &DbPool, id: &str, changes: UserChanges) -> AppResult<User> {
    let mut user = get_user(pool, id).await?;

    if let Some(username) = changes.username {
        let username = username.trim().to_string();
        validate_username(&username)?;
        user.username = username;
    }
    if let Some(display_name) = changes.display_name {
        user.display_name = clean_optional(Some(display_name));
    }
    if let Some(profile_picture) = changes.profile_picture {
        user.profile_picture = clean_optional(Some(profile_picture));
    }
    if let Some(is_admin) = changes.is_admin {
        user.is_admin = is_admin;
    }
    if let Some(password) = changes.password {
        validate_password(&password)?;
        user.password_hash = hash_password(&password);
    }

    sqlx::query(
        "UPDATE users SET username = ?, display_name = ?, profile_picture = ?, is_admin = ?, password_hash = ?
         WHERE id = ?",
    )
    .bind(&user.username)
    .bind(&user.display_name)
    .bind(&user.profile_picture)
    .bind(user.is_admin)
    .bind(&user.password_hash)
    .bind(id)
    .execute(pool.as_ref())
    .await
    .map_err(|e| conflict_on_unique(e, DUPLICATE_USERNAME))?;

    Ok(user)
}

/// Locks an account out: memberships and streams go, and the password hash is
/// cleared so no credential matches.
pub async fn deactivate_user(pool: &DbPool, id: &str) -> AppResult<User> {
    let mut user = get_user(pool, id).await?;
    if !user.is_active() {
        return Err(AppError::BadRequest("User is already deactivated".to_string()));
    }

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM server_members WHERE user_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM active_streams WHERE streamer_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE users SET password_hash = '' WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    user.password_hash.clear();
    tracing::info!("User {} deactivated", user.username);
    Ok(user)
}

/// Gives a deactivated account a fresh temporary password and returns it.
pub async fn reactivate_user(pool: &DbPool, id: &str) -> AppResult<(User, String)> {
    let mut user = get_user(pool, id).await?;
    if user.is_active() {
        return Err(AppError::BadRequest("User is already active".to_string()));
    }

    let temporary_password = generate_token(TEMPORARY_PASSWORD_LENGTH);
    user.password_hash = hash_password(&temporary_password);

    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(&user.password_hash)
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    tracing::info!("User {} reactivated", user.username);
    Ok((user, temporary_password))
}

/// Deletes a user and everything hanging off it. Owned servers go entirely,
/// invite references are cleared rather than removed.
pub async fn delete_user(pool: &DbPool, id: &str) -> AppResult<()> {
    let user = get_user(pool, id).await?;
    let mut tx = pool.begin().await?;

    // Writes first: the transaction must hold the write lock before it reads.
    sqlx::query("UPDATE invite_tokens SET created_by = NULL WHERE created_by = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE invite_tokens SET used_by = NULL WHERE used_by = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let owned = sqlx::query("SELECT id FROM servers WHERE owner_id = ?")
        .bind(id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| row.get::<String, _>("id"))
        .collect::<Vec<_>>();

    for server_id in &owned {
        delete_server_with(&mut tx, server_id).await?;
    }

    sqlx::query("DELETE FROM server_members WHERE user_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM messages WHERE author_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM active_streams WHERE streamer_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        "User {} deleted along with {} owned server(s)",
        user.username,
        owned.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_pool;
    use crate::services::invite::create_invite;

    fn new_user(username: &str, password: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: password.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_login_is_case_insensitive_and_generic() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        create_user(&pool, new_user("Alice", "secret")).await.unwrap();

        assert!(login(&pool, "alice", "secret").await.is_ok());

        let wrong_password = login(&pool, "alice", "nope").await.unwrap_err();
        let unknown_user = login(&pool, "bob", "secret").await.unwrap_err();
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn test_deactivate_then_reactivate() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let user = create_user(&pool, new_user("carol", "pw")).await.unwrap();

        deactivate_user(&pool, &user.id).await.unwrap();
        assert!(login(&pool, "carol", "pw").await.is_err());
        assert!(matches!(
            deactivate_user(&pool, &user.id).await,
            Err(AppError::BadRequest(_))
        ));

        let (_, temporary) = reactivate_user(&pool, &user.id).await.unwrap();
        assert_eq!(temporary.len(), TEMPORARY_PASSWORD_LENGTH);
        assert!(login(&pool, "carol", &temporary).await.is_ok());
        assert!(matches!(
            reactivate_user(&pool, &user.id).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_username_keeps_invite() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        create_user(&pool, new_user("dave", "pw")).await.unwrap();
        let invite = create_invite(&pool, None, 1, None).await.unwrap();

        let result = register_user(
            &pool,
            Registration {
                invite_token: invite.token.clone(),
                username: "DAVE".to_string(),
                display_name: None,
                password: "pw".to_string(),
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let stored = crate::services::invite::get_invite(&pool, &invite.id)
            .await
            .unwrap();
        assert_eq!(stored.max_uses, 1);
        assert!(!stored.is_used);
    }

    #[tokio::test]
    async fn test_username_exists_with_exclusion() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let user = create_user(&pool, new_user("erin", "pw")).await.unwrap();

        assert!(username_exists(&pool, "ERIN", None).await.unwrap());
        assert!(!username_exists(&pool, "erin", Some(&user.id)).await.unwrap());
        assert!(!username_exists(&pool, "frank", None).await.unwrap());
    }
}
