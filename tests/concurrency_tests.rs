use huddle::database::{DbPool, create_pool};
use huddle::services::invite::{InviteError, consume_invite, create_invite};
use huddle::services::{channel, server, timeline, user};
use huddle::utils::error::AppError;
use huddle::utils::time::MonotonicClock;
use std::path::PathBuf;
use std::sync::Arc;

/// A file-backed database so the pool really hands out several connections.
struct TempDb {
    path: PathBuf,
    pool: DbPool,
}

impl TempDb {
    async fn new() -> Self {
        let path = std::env::temp_dir().join(format!("huddle-{}.db", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = create_pool(&url).await.expect("Failed to open test database");
        Self { path, pool }
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path.display(), suffix));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_consumers_never_overspend() {
    let db = TempDb::new().await;
    let invite = create_invite(&db.pool, None, 5, None).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let pool = db.pool.clone();
        let token = invite.token.clone();
        handles.push(tokio::spawn(async move {
            consume_invite(&pool, &token, None).await
        }));
    }

    let mut succeeded = 0;
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(InviteError::Exhausted) => exhausted += 1,
            Err(e) => panic!("unexpected consume failure: {e}"),
        }
    }

    assert_eq!(succeeded, 5);
    assert_eq!(exhausted, 15);

    let (max_uses, is_used): (i64, bool) =
        sqlx::query_as("SELECT max_uses, is_used FROM invite_tokens WHERE id = ?")
            .bind(&invite.id)
            .fetch_one(db.pool.as_ref())
            .await
            .unwrap();
    assert_eq!(max_uses, 0);
    assert!(is_used);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_keep_a_stable_order() {
    let db = TempDb::new().await;
    let clock = Arc::new(MonotonicClock::new());

    let author = user::create_user(
        &db.pool,
        user::NewUser {
            username: "writer".to_string(),
            display_name: None,
            password: "password".to_string(),
            profile_picture: None,
            is_admin: false,
        },
    )
    .await
    .unwrap();
    let guild = server::create_server(&db.pool, "Guild".to_string(), None, &author.id).await.unwrap();
    let general = channel::create_channel(&db.pool, &guild.id, "general".to_string(), Default::default(), None)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..40 {
        let pool = db.pool.clone();
        let clock = clock.clone();
        let channel_id = general.id.clone();
        let author_id = author.id.clone();
        handles.push(tokio::spawn(async move {
            timeline::append_message(
                &pool,
                &clock,
                &channel_id,
                &author_id,
                Some(format!("message {i}")),
                None,
            )
            .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let full = timeline::list_messages(&db.pool, &general.id, None, Some(500))
        .await
        .unwrap();
    assert_eq!(full.len(), 40);

    let stamps = full.iter().map(|m| m.message.sent_at.clone()).collect::<Vec<_>>();
    let mut sorted = stamps.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(stamps, sorted, "timestamps must be unique and ascending");

    // any cursor taken from the list yields exactly the remaining suffix
    for (i, message) in full.iter().enumerate() {
        let since = huddle::utils::time::parse_timestamp(&message.message.sent_at);
        let suffix = timeline::list_messages(&db.pool, &general.id, since, Some(500))
            .await
            .unwrap();
        assert_eq!(suffix, full[i + 1..].to_vec());
    }
}

async fn seed_server(pool: &DbPool) -> (String, String) {
    let owner = user::create_user(
        pool,
        user::NewUser {
            username: "owner".to_string(),
            display_name: None,
            password: "password".to_string(),
            profile_picture: None,
            is_admin: false,
        },
    )
    .await
    .unwrap();
    let guild = server::create_server(pool, "Guild".to_string(), None, &owner.id)
        .await
        .unwrap();
    (owner.id, guild.id)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_name_channels_conflict() {
    let db = TempDb::new().await;
    let (_, server_id) = seed_server(&db.pool).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = db.pool.clone();
        let server_id = server_id.clone();
        handles.push(tokio::spawn(async move {
            channel::create_channel(&pool, &server_id, "general".to_string(), Default::default(), None)
                .await
        }));
    }

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(AppError::Conflict(_)) => conflicts += 1,
            Err(e) => panic!("unexpected create failure: {e}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_directory_writes_all_succeed() {
    let db = TempDb::new().await;
    let (owner_id, server_id) = seed_server(&db.pool).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let pool = db.pool.clone();
        let server_id = server_id.clone();
        let owner_id = owner_id.clone();
        handles.push(tokio::spawn(async move {
            channel::create_channel(&pool, &server_id, format!("room-{i}"), Default::default(), None)
                .await?;
            channel::reorder_channels(&pool, &server_id, &[]).await?;
            server::create_server(&pool, format!("Side {i}"), None, &owner_id).await?;
            Ok::<_, AppError>(())
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let positions = channel::get_server_channels(&db.pool, &server_id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.position)
        .collect::<Vec<_>>();
    assert_eq!(positions, (0..8).collect::<Vec<i64>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_polling_during_concurrent_sends_misses_nothing() {
    let db = TempDb::new().await;
    let clock = Arc::new(MonotonicClock::new());
    let (author_id, server_id) = seed_server(&db.pool).await;
    let general = channel::create_channel(&db.pool, &server_id, "general".to_string(), Default::default(), None)
        .await
        .unwrap();

    let mut writers = Vec::new();
    for i in 0..60 {
        let pool = db.pool.clone();
        let clock = clock.clone();
        let channel_id = general.id.clone();
        let author_id = author_id.clone();
        writers.push(tokio::spawn(async move {
            timeline::append_message(&pool, &clock, &channel_id, &author_id, Some(format!("m{i}")), None)
                .await
                .unwrap()
        }));
    }

    let mut seen = Vec::new();
    let mut cursor = None;
    let mut done = false;
    while !done {
        done = writers.iter().all(|w| w.is_finished());
        let batch = timeline::list_messages(&db.pool, &general.id, cursor, Some(500))
            .await
            .unwrap();
        if let Some(last) = batch.last() {
            cursor = huddle::utils::time::parse_timestamp(&last.message.sent_at);
        }
        seen.extend(batch.into_iter().map(|m| m.message.id));
    }

    let mut expected = Vec::new();
    for writer in writers {
        expected.push(writer.await.unwrap().message.id);
    }

    let mut seen_sorted = seen.clone();
    seen_sorted.sort();
    seen_sorted.dedup();
    assert_eq!(seen_sorted.len(), seen.len(), "a message was fetched twice");

    expected.sort();
    assert_eq!(seen_sorted, expected);
}
