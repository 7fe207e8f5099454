//! Core traits for the generic WebSocket infrastructure.

/// A message that can be handed to [`MessageSender`](super::MessageSender).
///
/// The sender only inspects [`content`](Self::content) to reject blank payloads; everything
/// else about the wire shape belongs to the implementor.
///
/// # Example
///
/// ```
/// use careline_realtime::ws::OutboundPayload;
///
/// struct Note(String);
///
/// impl OutboundPayload for Note {
///     fn content(&self) -> &str {
///         &self.0
///     }
///
///     fn to_frame(&self) -> String {
///         serde_json::json!({ "note": self.0.trim() }).to_string()
///     }
/// }
///
/// assert_eq!(Note(" hi ".to_owned()).to_frame(), r#"{"note":"hi"}"#);
/// ```
pub trait OutboundPayload {
    /// User-entered text carried by the payload.
    fn content(&self) -> &str;

    /// Serialize the payload into a text frame, with [`content`](Self::content) trimmed.
    fn to_frame(&self) -> String;

    /// Whether the payload carries anything but whitespace.
    fn has_content(&self) -> bool {
        !self.content().trim().is_empty()
    }
}
