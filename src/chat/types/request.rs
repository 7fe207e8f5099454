use serde_json::json;

use super::MessageKind;
use crate::ws::OutboundPayload;

/// A chat message on its way to the server.
///
/// Not retained after it has been handed to the transport.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// `{ "type": "reply", "content", "user_id" }`
    Reply { content: String, user_id: String },
    /// `{ "type": "help", "content", "sender_id" }`
    Help { content: String, sender_id: String },
    /// `{ "type": "direct", "content", "sender_id", "receiver_id" }`
    Direct {
        content: String,
        sender_id: String,
        receiver_id: String,
    },
}

impl OutboundMessage {
    #[must_use]
    pub fn reply<C: Into<String>, U: Into<String>>(content: C, user_id: U) -> Self {
        Self::Reply {
            content: content.into(),
            user_id: user_id.into(),
        }
    }

    #[must_use]
    pub fn help<C: Into<String>, S: Into<String>>(content: C, sender_id: S) -> Self {
        Self::Help {
            content: content.into(),
            sender_id: sender_id.into(),
        }
    }

    #[must_use]
    pub fn direct<C: Into<String>, S: Into<String>, R: Into<String>>(
        content: C,
        sender_id: S,
        receiver_id: R,
    ) -> Self {
        Self::Direct {
            content: content.into(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Reply { .. } => MessageKind::Reply,
            Self::Help { .. } => MessageKind::Help,
            Self::Direct { .. } => MessageKind::Direct,
        }
    }
}

impl OutboundPayload for OutboundMessage {
    fn content(&self) -> &str {
        match self {
            Self::Reply { content, .. }
            | Self::Help { content, .. }
            | Self::Direct { content, .. } => content,
        }
    }

    fn to_frame(&self) -> String {
        let kind = self.kind();
        let content = self.content().trim();

        let frame = match self {
            Self::Reply { user_id, .. } => json!({
                "type": kind,
                "content": content,
                "user_id": user_id,
            }),
            Self::Help { sender_id, .. } => json!({
                "type": kind,
                "content": content,
                "sender_id": sender_id,
            }),
            Self::Direct {
                sender_id,
                receiver_id,
                ..
            } => json!({
                "type": kind,
                "content": content,
                "sender_id": sender_id,
                "receiver_id": receiver_id,
            }),
        };

        frame.to_string()
    }
}
