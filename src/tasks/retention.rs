use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::database::DbPool;
use crate::services::timeline::purge_messages_before;

pub async fn purge_old_messages(db: &DbPool, max_age: Duration) -> anyhow::Result<u64> {
    let cutoff = Utc::now() - chrono::Duration::from_std(max_age)?;

    tracing::info!("Purging messages sent before {}", cutoff);
    let count = purge_messages_before(db, cutoff).await?;

    tracing::info!("Retention sweep completed: {} messages deleted", count);
    Ok(count)
}

/// Sweeps once per `interval`, sleeping first. A failed sweep is logged and
/// retried at the next tick; only `shutdown` stops the loop.
pub fn start_retention_task(
    db: DbPool,
    interval: Duration,
    max_age: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Retention task stopping");
                    break;
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = purge_old_messages(&db, max_age).await {
                tracing::error!("Retention sweep failed: {}", e);
            }
        }
    })
}
