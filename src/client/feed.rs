use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::models::message::MessageWithAuthor;
use crate::utils::time::parse_timestamp;
use crate::websocket::events::ServerMessage;

/// The local view of one channel. Pushes and polls both land here, and a
/// message id is only ever shown once however many times it arrives.
#[derive(Debug, Clone)]
pub struct ChannelFeed {
    channel_id: String,
    messages: Vec<MessageWithAuthor>,
    seen: HashSet<String>,
    cursor: Option<DateTime<Utc>>,
}

impl ChannelFeed {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            messages: Vec::new(),
            seen: HashSet::new(),
            cursor: None,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn messages(&self) -> &[MessageWithAuthor] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Highest `sent_at` returned by a poll; the next poll asks for anything
    /// after it. Pushed messages never move it, so a lost push with an earlier
    /// timestamp is still fetched by the next poll.
    pub fn cursor(&self) -> Option<DateTime<Utc>> {
        self.cursor
    }

    /// Merges a batch fetched from the server and advances the cursor past it.
    pub fn merge_polled(&mut self, batch: Vec<MessageWithAuthor>) -> usize {
        let newest = batch
            .iter()
            .filter(|m| m.message.channel_id == self.channel_id)
            .filter_map(|m| parse_timestamp(&m.message.sent_at))
            .max();
        self.cursor = self.cursor.max(newest);
        self.merge(batch)
    }

    /// Adds the messages not yet seen and returns how many were new.
    pub fn merge<I>(&mut self, incoming: I) -> usize
    where
        I: IntoIterator<Item = MessageWithAuthor>,
    {
        let mut added = 0;

        for message in incoming {
            if message.message.channel_id != self.channel_id {
                continue;
            }
            if !self.seen.insert(message.message.id.clone()) {
                continue;
            }
            self.messages.push(message);
            added += 1;
        }

        if added > 0 {
            self.messages.sort_by(|a, b| {
                (&a.message.sent_at, &a.message.id).cmp(&(&b.message.sent_at, &b.message.id))
            });
        }

        added
    }

    /// Applies a hub event. Events for other channels are ignored.
    pub fn apply(&mut self, event: &ServerMessage) -> bool {
        match event {
            ServerMessage::NewMessage { message } => self.merge([message.clone()]) > 0,
            ServerMessage::MessageEdited { message } => {
                match self
                    .messages
                    .iter_mut()
                    .find(|m| m.message.id == message.message.id)
                {
                    Some(existing) => {
                        *existing = message.clone();
                        true
                    }
                    None => false,
                }
            }
            ServerMessage::MessageDeleted {
                channel_id,
                message_id,
            } if *channel_id == self.channel_id => {
                self.seen.insert(message_id.clone());
                let before = self.messages.len();
                self.messages.retain(|m| m.message.id != *message_id);
                before != self.messages.len()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::message::Message;

    pub fn message(id: &str, channel_id: &str, sent_at: &str) -> MessageWithAuthor {
        MessageWithAuthor {
            message: Message {
                id: id.to_string(),
                channel_id: channel_id.to_string(),
                author_id: "u1".to_string(),
                content: format!("content of {}", id),
                attachment_url: None,
                attachment_content_type: None,
                sent_at: sent_at.to_string(),
                edited_at: None,
                deleted_at: None,
            },
            author_username: "alice".to_string(),
            author_display_name: None,
            author_profile_picture: None,
        }
    }

    const T1: &str = "2026-01-01T00:00:01.000000Z";
    const T2: &str = "2026-01-01T00:00:02.000000Z";
    const T3: &str = "2026-01-01T00:00:03.000000Z";

    #[test]
    fn test_merge_is_idempotent_and_ordered() {
        let mut feed = ChannelFeed::new("c");

        assert_eq!(feed.merge_polled(vec![message("b", "c", T2), message("a", "c", T1)]), 2);
        assert_eq!(feed.merge_polled(vec![message("a", "c", T1), message("c", "c", T3)]), 1);
        assert_eq!(feed.merge_polled(vec![message("c", "c", T3)]), 0);

        let ids = feed
            .messages()
            .iter()
            .map(|m| m.message.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(feed.cursor(), parse_timestamp(T3));
    }

    #[test]
    fn test_other_channels_ignored() {
        let mut feed = ChannelFeed::new("c");
        assert_eq!(feed.merge_polled(vec![message("x", "other", T1)]), 0);
        assert!(feed.is_empty());
        assert_eq!(feed.cursor(), None);
    }

    #[test]
    fn test_apply_events() {
        let mut feed = ChannelFeed::new("c");
        assert!(feed.apply(&ServerMessage::NewMessage {
            message: message("a", "c", T1)
        }));
        assert_eq!(feed.cursor(), None);
        assert!(!feed.apply(&ServerMessage::NewMessage {
            message: message("a", "c", T1)
        }));

        let mut edited = message("a", "c", T1);
        edited.message.content = "edited".to_string();
        assert!(feed.apply(&ServerMessage::MessageEdited { message: edited }));
        assert_eq!(feed.messages()[0].message.content, "edited");

        assert!(feed.apply(&ServerMessage::MessageDeleted {
            channel_id: "c".to_string(),
            message_id: "a".to_string(),
        }));
        assert!(feed.is_empty());

        // a late push of a deleted message stays hidden
        assert!(!feed.apply(&ServerMessage::NewMessage {
            message: message("a", "c", T1)
        }));
    }
}
