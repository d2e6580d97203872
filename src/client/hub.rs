use futures_util::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::feed::ChannelFeed;
use super::presentation::ConnectionStatus;
use crate::websocket::events::{ClientMessage, ServerMessage};

pub const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
pub const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Reconnect delays: doubling from `initial`, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_BACKOFF, MAX_BACKOFF)
    }
}

enum Command {
    Join(String),
    Leave(String),
}

/// A self-healing connection to `/hubs/chat`. Joined channels survive
/// reconnects; events go out on the channel handed to [`HubClient::connect`].
pub struct HubClient {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl HubClient {
    pub fn connect(
        url: impl Into<String>,
        events: mpsc::UnboundedSender<ServerMessage>,
        backoff: Backoff,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(ConnectionStatus::Disconnected);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            url.into(),
            events,
            command_rx,
            status_tx,
            backoff,
            cancel.clone(),
        ));

        Self {
            commands,
            status,
            cancel,
            task,
        }
    }

    pub fn join(&self, channel_id: &str) {
        let _ = self.commands.send(Command::Join(channel_id.to_string()));
    }

    pub fn leave(&self, channel_id: &str) {
        let _ = self.commands.send(Command::Leave(channel_id.to_string()));
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

async fn run(
    url: String,
    events: mpsc::UnboundedSender<ServerMessage>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<ConnectionStatus>,
    mut backoff: Backoff,
    cancel: CancellationToken,
) {
    let mut joined: HashSet<String> = HashSet::new();

    loop {
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = tokio_tungstenite::connect_async(url.as_str()) => result,
        };

        match connected {
            Ok((socket, _)) => {
                backoff.reset();
                let _ = status.send(ConnectionStatus::Connected);
                tracing::debug!("Hub connected to {}", url);

                let (mut sink, mut stream) = socket.split();
                let mut healthy = true;

                for channel_id in &joined {
                    if send(&mut sink, ClientMessage::JoinChannel {
                        channel_id: channel_id.clone(),
                    })
                    .await
                    .is_err()
                    {
                        healthy = false;
                        break;
                    }
                }

                while healthy {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            let _ = sink.close().await;
                            let _ = status.send(ConnectionStatus::Disconnected);
                            return;
                        }
                        command = commands.recv() => {
                            let message = match command {
                                Some(Command::Join(channel_id)) => {
                                    joined.insert(channel_id.clone());
                                    ClientMessage::JoinChannel { channel_id }
                                }
                                Some(Command::Leave(channel_id)) => {
                                    joined.remove(&channel_id);
                                    ClientMessage::LeaveChannel { channel_id }
                                }
                                None => {
                                    let _ = sink.close().await;
                                    let _ = status.send(ConnectionStatus::Disconnected);
                                    return;
                                }
                            };
                            healthy = send(&mut sink, message).await.is_ok();
                        }
                        incoming = stream.next() => {
                            match incoming {
                                Some(Ok(Message::Text(text))) => {
                                    match serde_json::from_str::<ServerMessage>(&text) {
                                        Ok(event) => {
                                            let _ = events.send(event);
                                        }
                                        Err(e) => tracing::warn!("Ignoring hub frame: {}", e),
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => healthy = false,
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    tracing::debug!("Hub connection error: {}", e);
                                    healthy = false;
                                }
                            }
                        }
                    }
                }
            }
            Err(e) => tracing::debug!("Hub connect to {} failed: {}", url, e),
        }

        let _ = status.send(ConnectionStatus::Reconnecting);
        let delay = backoff.next_delay();
        tracing::debug!("Reconnecting to hub in {:?}", delay);

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    let _ = status.send(ConnectionStatus::Disconnected);
}

async fn send<S>(sink: &mut S, message: ClientMessage) -> Result<(), ()>
where
    S: futures_util::Sink<Message> + Unpin,
{
    let json = serde_json::to_string(&message).map_err(|_| ())?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}

/// Applies hub events to `feed` until the event channel closes.
pub fn forward_to_feed(
    mut events: mpsc::UnboundedReceiver<ServerMessage>,
    feed: Arc<Mutex<ChannelFeed>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            feed.lock().await.apply(&event);
        }
    })
}
