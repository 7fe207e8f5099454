use std::fmt;
use std::sync::{Arc, Mutex};

use super::connection::{Session, lock};
use super::traits::OutboundPayload;

/// Result of handing a payload to a [`MessageSender`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SendOutcome {
    /// The frame was handed to the live transport
    Sent,
    /// The connection is not open; nothing was sent
    NotConnected,
    /// The payload content is empty after trimming; nothing was sent
    EmptyPayload,
}

impl SendOutcome {
    #[must_use]
    pub const fn is_sent(self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Gate that forwards payloads to the live transport only while the connection is open.
///
/// The sender holds no state of its own. Rejected sends never touch the transport, never
/// panic and never change the connection state.
#[derive(Clone)]
pub struct MessageSender {
    session: Arc<Mutex<Session>>,
}

impl fmt::Debug for MessageSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageSender").finish_non_exhaustive()
    }
}

impl MessageSender {
    pub(crate) const fn new(session: Arc<Mutex<Session>>) -> Self {
        Self { session }
    }

    /// Send `payload`, returning whether it was actually handed to the transport.
    pub fn send<P: OutboundPayload>(&self, payload: &P) -> bool {
        self.try_send(payload).is_sent()
    }

    /// Send `payload` and report why it was not sent, if it was not.
    pub fn try_send<P: OutboundPayload>(&self, payload: &P) -> SendOutcome {
        if !payload.has_content() {
            return SendOutcome::EmptyPayload;
        }

        let session = lock(&self.session);
        if !session.snapshot.is_connected() {
            return SendOutcome::NotConnected;
        }
        let Some(outbound) = session.outbound.as_ref() else {
            return SendOutcome::NotConnected;
        };

        // The receiver is gone once the transport has dropped, even if the driver has not yet
        // published the transition out of Open.
        if outbound.send(payload.to_frame()).is_err() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Dropping outbound frame, transport already closed");
            return SendOutcome::NotConnected;
        }

        SendOutcome::Sent
    }

    /// Whether a send issued now would reach the transport, content aside.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        let session = lock(&self.session);
        session.snapshot.is_connected()
            && session
                .outbound
                .as_ref()
                .is_some_and(|outbound| !outbound.is_closed())
    }
}
