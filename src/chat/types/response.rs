use bon::Builder;
use serde::Deserialize;

use super::MessageKind;
use crate::Result;
use crate::ws::WsError;

/// A chat message pushed by the server.
///
/// The connection layer forwards frames untouched; this type is a convenience for consumers
/// that want the chat payload decoded.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Builder)]
#[builder(on(String, into))]
pub struct ChatEvent {
    pub id: String,
    pub sender_id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub created_at: String,
    #[serde(default)]
    #[builder(default)]
    pub is_seen: bool,
    #[serde(default)]
    pub receiver_id: Option<String>,
}

impl ChatEvent {
    /// Decode a text frame received from the chat socket.
    pub fn from_frame(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).map_err(|e| WsError::MessageParse(e).into())
    }
}
