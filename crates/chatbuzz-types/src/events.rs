use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MessagePayload;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A direct message pushed to the receiver's topic
    Message { topic: String, payload: MessagePayload },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Send a direct message to the user named `to`
    SendMessage { to: String, payload: MessagePayload },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_message_command_parses_camel_case_payload() {
        let raw = r#"{"type":"SendMessage","data":{"to":"bob","payload":{"content":"hi","mediaUrl":"https://cdn/x.png","mediaType":"image/png"}}}"#;

        let GatewayCommand::SendMessage { to, payload } = serde_json::from_str(raw).unwrap() else {
            panic!("expected SendMessage");
        };
        assert_eq!(to, "bob");
        assert_eq!(payload.content.as_deref(), Some("hi"));
        assert_eq!(payload.media_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn message_event_omits_absent_media() {
        let event = GatewayEvent::Message {
            topic: "/topic/messages/bob".into(),
            payload: MessagePayload::text("hi"),
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "Message");
        assert_eq!(json["data"]["payload"]["content"], "hi");
        assert!(json["data"]["payload"].get("mediaUrl").is_none());
    }
}
