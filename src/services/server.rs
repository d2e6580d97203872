use sqlx::SqliteConnection;

use crate::database::DbPool;
use crate::models::server::{Server, ServerDetails};
use crate::models::server_member::{ServerMember, ServerRole};
use crate::services::channel::get_server_channels;
use crate::utils::error::{AppError, AppResult, conflict_on_unique, is_foreign_key_violation};
use crate::utils::helpers::clean_optional;
use crate::utils::validation::validate_server_name;

pub async fn create_server(
    pool: &DbPool,
    name: String,
    icon: Option<String>,
    owner_id: &str,
) -> AppResult<Server> {
    let name = name.trim().to_string();
    validate_server_name(&name)?;

    let server = Server::new(name, clean_optional(icon), owner_id.to_string());

    // The insert comes first so the transaction starts out holding the write lock.
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO servers (id, name, icon, owner_id, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&server.id)
        .bind(&server.name)
        .bind(&server.icon)
        .bind(&server.owner_id)
        .bind(&server.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::Validation("Owner user not found".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

    let owner = ServerMember::new(
        server.id.clone(),
        owner_id.to_string(),
        ServerRole::Owner.as_str(),
    );
    insert_member(&mut tx, &owner).await?;

    tx.commit().await?;

    tracing::info!("Server {} ({}) created by {}", server.name, server.id, owner_id);
    Ok(server)
}

pub async fn list_servers(pool: &DbPool) -> AppResult<Vec<Server>> {
    let servers = sqlx::query_as::<_, Server>("SELECT * FROM servers ORDER BY name ASC")
        .fetch_all(pool.as_ref())
        .await?;

    Ok(servers)
}

pub async fn list_user_servers(pool: &DbPool, user_id: &str) -> AppResult<Vec<Server>> {
    let servers = sqlx::query_as::<_, Server>(
        "SELECT s.* FROM servers s
         JOIN server_members sm ON sm.server_id = s.id
         WHERE sm.user_id = ?
         ORDER BY s.name ASC",
    )
    .bind(user_id)
    .fetch_all(pool.as_ref())
    .await?;

    Ok(servers)
}

pub async fn get_server(pool: &DbPool, id: &str) -> AppResult<Server> {
    sqlx::query_as::<_, Server>("SELECT * FROM servers WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Server not found".to_string()))
}

pub async fn get_server_details(pool: &DbPool, id: &str) -> AppResult<ServerDetails> {
    let server = get_server(pool, id).await?;
    let channels = get_server_channels(pool, id).await?;
    let members = list_members(pool, id).await?;

    Ok(ServerDetails {
        invite_code: server.invite_code(),
        server,
        channels,
        members,
    })
}

pub async fn update_server(
    pool: &DbPool,
    id: &str,
    name: Option<String>,
    icon: Option<String>,
) -> AppResult<Server> {
    let mut server = get_server(pool, id).await?;

    if let Some(name) = name {
        let name = name.trim().to_string();
        validate_server_name(&name)?;
        server.name = name;
    }
    if let Some(icon) = icon {
        server.icon = clean_optional(Some(icon));
    }

    sqlx::query("UPDATE servers SET name = ?, icon = ? WHERE id = ?")
        .bind(&server.name)
        .bind(&server.icon)
        .bind(id)
        .execute(pool.as_ref())
        .await?;

    Ok(server)
}

pub async fn delete_server(pool: &DbPool, id: &str) -> AppResult<()> {
    get_server(pool, id).await?;

    let mut tx = pool.begin().await?;
    delete_server_with(&mut tx, id).await?;
    tx.commit().await?;

    tracing::info!("Server {} deleted", id);
    Ok(())
}

/// Removes a server and everything under it, children first.
pub async fn delete_server_with(conn: &mut SqliteConnection, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "DELETE FROM messages WHERE channel_id IN (SELECT id FROM channels WHERE server_id = ?)",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "DELETE FROM active_streams WHERE channel_id IN (SELECT id FROM channels WHERE server_id = ?)",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    for table in ["channels", "server_members"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE server_id = ?"))
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query("DELETE FROM servers WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn insert_member(conn: &mut SqliteConnection, member: &ServerMember) -> AppResult<()> {
    sqlx::query("INSERT INTO server_members (server_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)")
        .bind(&member.server_id)
        .bind(&member.user_id)
        .bind(&member.role)
        .bind(&member.joined_at)
        .execute(conn)
        .await
        .map_err(|e| conflict_on_unique(e, "User is already a member of this server"))?;

    Ok(())
}

pub async fn add_member(
    pool: &DbPool,
    server_id: &str,
    user_id: &str,
    role: Option<String>,
) -> AppResult<ServerMember> {
    get_server(pool, server_id).await?;

    sqlx::query("SELECT 1 FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let role = clean_optional(role).unwrap_or_else(|| ServerRole::Member.as_str().to_string());
    let member = ServerMember::new(server_id.to_string(), user_id.to_string(), &role);

    let mut conn = pool.acquire().await?;
    insert_member(&mut conn, &member).await?;

    tracing::debug!("User {} joined server {} as {}", user_id, server_id, role);
    Ok(member)
}

pub async fn list_members(pool: &DbPool, server_id: &str) -> AppResult<Vec<ServerMember>> {
    let members = sqlx::query_as::<_, ServerMember>(
        "SELECT * FROM server_members WHERE server_id = ? ORDER BY joined_at ASC",
    )
    .bind(server_id)
    .fetch_all(pool.as_ref())
    .await?;

    Ok(members)
}

/// Looks a server up by its eight-character invite code, ignoring case.
pub async fn find_by_invite_code(pool: &DbPool, code: &str) -> AppResult<Server> {
    let code = code.trim();
    if code.len() != 8 || !code.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::NotFound("Server not found".to_string()));
    }

    sqlx::query_as::<_, Server>("SELECT * FROM servers WHERE upper(substr(id, 1, 8)) = upper(?)")
        .bind(code)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Server not found".to_string()))
}
