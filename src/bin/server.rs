use tokio_util::sync::CancellationToken;

use huddle::config::Config;
use huddle::server::route_builder::{init_state, register_routes};
use huddle::tasks::retention::start_retention_task;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle=debug,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let bind_addr = config.bind_addr;
    let retention_interval = config.retention_interval;
    let message_max_age = config.message_max_age;

    let state = init_state(config).await?;

    let shutdown = CancellationToken::new();
    let retention = start_retention_task(
        state.db.clone(),
        retention_interval,
        message_max_age,
        shutdown.clone(),
    );
    tracing::info!(
        "Retention task started (every {:?}, max age {:?})",
        retention_interval,
        message_max_age
    );

    let app = register_routes(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Huddle server listening on {}", listener.local_addr()?);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    retention.await?;
    Ok(())
}
