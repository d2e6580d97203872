use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use super::events::{ClientMessage, ServerMessage};

#[derive(Default)]
struct HubState {
    connections: HashMap<String, mpsc::UnboundedSender<ServerMessage>>,
    groups: HashMap<String, HashSet<String>>,
    memberships: HashMap<String, HashSet<String>>,
}

/// Fan-out of chat events to WebSocket connections, grouped by channel id.
/// Delivery is best effort: a connection whose outbox is gone is skipped.
#[derive(Default)]
pub struct ChatHub {
    state: RwLock<HubState>,
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self) -> (String, mpsc::UnboundedReceiver<ServerMessage>) {
        let connection_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        self.state
            .write()
            .await
            .connections
            .insert(connection_id.clone(), tx);

        (connection_id, rx)
    }

    pub async fn join(&self, connection_id: &str, group: &str) {
        let mut state = self.state.write().await;
        if !state.connections.contains_key(connection_id) {
            return;
        }

        state
            .groups
            .entry(group.to_string())
            .or_default()
            .insert(connection_id.to_string());
        state
            .memberships
            .entry(connection_id.to_string())
            .or_default()
            .insert(group.to_string());
    }

    pub async fn leave(&self, connection_id: &str, group: &str) {
        let mut state = self.state.write().await;
        remove_from_group(&mut state.groups, group, connection_id);
        if let Some(groups) = state.memberships.get_mut(connection_id) {
            groups.remove(group);
        }
    }

    pub async fn disconnect(&self, connection_id: &str) {
        let mut state = self.state.write().await;
        state.connections.remove(connection_id);

        let groups = state.memberships.remove(connection_id).unwrap_or_default();
        for group in groups {
            remove_from_group(&mut state.groups, &group, connection_id);
        }
    }

    /// Sends `event` to every connection in `group` and returns how many
    /// outboxes accepted it.
    pub async fn publish(&self, group: &str, event: ServerMessage) -> usize {
        let state = self.state.read().await;
        let Some(members) = state.groups.get(group) else {
            return 0;
        };

        members
            .iter()
            .filter_map(|id| state.connections.get(id))
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    pub async fn send_to(&self, connection_id: &str, event: ServerMessage) {
        if let Some(tx) = self.state.read().await.connections.get(connection_id) {
            let _ = tx.send(event);
        }
    }

    pub async fn group_size(&self, group: &str) -> usize {
        self.state
            .read()
            .await
            .groups
            .get(group)
            .map_or(0, HashSet::len)
    }

    pub async fn handle_connection(self: Arc<Self>, socket: WebSocket, user: String) {
        let (mut sender, mut receiver) = socket.split();
        let (connection_id, mut outbox) = self.register().await;

        tracing::debug!("Hub connection {} opened by {}", connection_id, user);

        self.send_to(
            &connection_id,
            ServerMessage::Connected {
                connection_id: connection_id.clone(),
            },
        )
        .await;

        let mut send_task = tokio::spawn(async move {
            while let Some(event) = outbox.recv().await {
                let Ok(json) = serde_json::to_string(&event) else {
                    continue;
                };
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        });

        let hub = self.clone();
        let recv_id = connection_id.clone();
        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => hub.handle_command(&recv_id, &text).await,
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        self.disconnect(&connection_id).await;
        tracing::debug!("Hub connection {} closed", connection_id);
    }

    async fn handle_command(&self, connection_id: &str, text: &str) {
        let reply = match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::JoinChannel { channel_id }) => {
                self.join(connection_id, &channel_id).await;
                ServerMessage::Joined { channel_id }
            }
            Ok(ClientMessage::LeaveChannel { channel_id }) => {
                self.leave(connection_id, &channel_id).await;
                ServerMessage::Left { channel_id }
            }
            Ok(ClientMessage::Heartbeat) => ServerMessage::Pong,
            Err(e) => ServerMessage::Error {
                message: format!("Unrecognised command: {}", e),
            },
        };

        self.send_to(connection_id, reply).await;
    }
}

fn remove_from_group(groups: &mut HashMap<String, HashSet<String>>, group: &str, connection_id: &str) {
    if let Some(members) = groups.get_mut(group) {
        members.remove(connection_id);
        if members.is_empty() {
            groups.remove(group);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pong() -> ServerMessage {
        ServerMessage::Pong
    }

    #[tokio::test]
    async fn test_publish_reaches_only_group_members() {
        let hub = ChatHub::new();
        let (a, mut rx_a) = hub.register().await;
        let (b, mut rx_b) = hub.register().await;

        hub.join(&a, "general").await;
        hub.join(&b, "random").await;

        assert_eq!(hub.publish("general", pong()).await, 1);
        assert_eq!(rx_a.recv().await, Some(pong()));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_leave_and_disconnect_clean_groups() {
        let hub = ChatHub::new();
        let (a, _rx_a) = hub.register().await;
        let (b, _rx_b) = hub.register().await;

        hub.join(&a, "general").await;
        hub.join(&b, "general").await;
        assert_eq!(hub.group_size("general").await, 2);

        hub.leave(&a, "general").await;
        assert_eq!(hub.group_size("general").await, 1);

        hub.disconnect(&b).await;
        assert_eq!(hub.group_size("general").await, 0);
        assert_eq!(hub.publish("general", pong()).await, 0);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_skipped() {
        let hub = ChatHub::new();
        let (a, rx_a) = hub.register().await;
        let (b, mut rx_b) = hub.register().await;
        hub.join(&a, "general").await;
        hub.join(&b, "general").await;
        drop(rx_a);

        assert_eq!(hub.publish("general", pong()).await, 1);
        assert_eq!(rx_b.recv().await, Some(pong()));
    }

    #[tokio::test]
    async fn test_unknown_connection_cannot_join() {
        let hub = ChatHub::new();
        hub.join("ghost", "general").await;
        assert_eq!(hub.group_size("general").await, 0);
    }
}
