use serde::{Deserialize, Serialize};

use crate::models::message::MessageWithAuthor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinChannel { channel_id: String },
    LeaveChannel { channel_id: String },
    Heartbeat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        connection_id: String,
    },
    Joined {
        channel_id: String,
    },
    Left {
        channel_id: String,
    },
    NewMessage {
        message: MessageWithAuthor,
    },
    MessageEdited {
        message: MessageWithAuthor,
    },
    MessageDeleted {
        channel_id: String,
        message_id: String,
    },
    Pong,
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_format() {
        let join: ClientMessage =
            serde_json::from_str(r#"{"type":"join_channel","channel_id":"c1"}"#).unwrap();
        assert_eq!(
            join,
            ClientMessage::JoinChannel {
                channel_id: "c1".to_string()
            }
        );

        let heartbeat: ClientMessage = serde_json::from_str(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(heartbeat, ClientMessage::Heartbeat);
    }

    #[test]
    fn test_server_message_is_tagged() {
        let json = serde_json::to_value(ServerMessage::MessageDeleted {
            channel_id: "c".to_string(),
            message_id: "m".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "message_deleted");
        assert_eq!(json["message_id"], "m");

        let pong = serde_json::to_string(&ServerMessage::Pong).unwrap();
        assert_eq!(pong, r#"{"type":"pong"}"#);
    }
}
