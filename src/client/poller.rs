use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::ClientResult;
use super::feed::ChannelFeed;
use crate::models::message::MessageWithAuthor;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Where the poller reads a channel's timeline from.
pub trait MessageSource: Send + Sync + 'static {
    fn fetch_since(
        &self,
        channel_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = ClientResult<Vec<MessageWithAuthor>>> + Send;
}

/// Fetches everything after the feed's cursor and merges it. Returns the
/// number of messages that were new to the feed.
pub async fn poll_once<S: MessageSource>(source: &S, feed: &Mutex<ChannelFeed>) -> ClientResult<usize> {
    let (channel_id, cursor) = {
        let feed = feed.lock().await;
        (feed.channel_id().to_string(), feed.cursor())
    };

    let fetched = source.fetch_since(&channel_id, cursor).await?;
    Ok(feed.lock().await.merge_polled(fetched))
}

/// Polls every `period` until `cancel` fires. Each tick runs to completion
/// before the next one is considered, and ticks missed meanwhile are dropped,
/// so two fetches never overlap.
pub fn spawn_poller<S: MessageSource>(
    source: Arc<S>,
    feed: Arc<Mutex<ChannelFeed>>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = poll_once(source.as_ref(), &feed) => result,
            };

            match result {
                Ok(0) => {}
                Ok(added) => tracing::debug!("Poll picked up {} message(s)", added),
                Err(e) => tracing::warn!("Poll failed: {}", e),
            }
        }

        tracing::debug!("Poller stopped");
    })
}
