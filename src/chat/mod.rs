//! Live support chat on top of the [`ws`](crate::ws) connection layer.
//!
//! [`ChatChannel`] is the entry point: it opens one of the Careline chat sockets, frames typed
//! text as [`OutboundMessage`]s for its [`Conversation`] and decodes inbound frames into
//! [`ChatEvent`]s.

pub mod client;
pub mod endpoint;
pub mod types;

pub use client::{ChatChannel, Conversation};
pub use types::MessageKind;
pub use types::request::OutboundMessage;
pub use types::response::ChatEvent;
