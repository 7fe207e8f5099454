use async_stream::stream;
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use url::Url;

use super::endpoint;
use super::types::request::OutboundMessage;
use super::types::response::ChatEvent;
use crate::Result;
use crate::ws::config::Config;
use crate::ws::{
    ConnectionManager, ConnectionState, MessageSender, ObserverHandle, SendOutcome, Snapshot,
    WsError,
};

/// Who the local participant is talking to, and therefore how typed text is framed.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversation {
    /// Help-desk staff replying to `user_id`
    HelpDesk { user_id: String },
    /// A user asking the help desk for support
    Help { sender_id: String },
    /// A user writing to another user
    Direct {
        sender_id: String,
        receiver_id: String,
    },
}

impl Conversation {
    /// Frame `text` for this conversation.
    #[must_use]
    pub fn message<S: Into<String>>(&self, text: S) -> OutboundMessage {
        match self {
            Self::HelpDesk { user_id } => OutboundMessage::reply(text, user_id.as_str()),
            Self::Help { sender_id } => OutboundMessage::help(text, sender_id.as_str()),
            Self::Direct {
                sender_id,
                receiver_id,
            } => OutboundMessage::direct(text, sender_id.as_str(), receiver_id.as_str()),
        }
    }
}

/// A live support chat: one managed connection plus the conversation it sends for.
///
/// This is what a chat screen holds. It exposes the connection state to render
/// (`is_connected`, `is_reconnecting`, [`Snapshot::retry_in`] for a countdown), a `send` that
/// reports whether the text actually went out, and the inbound messages. Dropping the channel
/// closes the connection and cancels any pending retry.
///
/// # Example
///
/// ```no_run
/// use careline_realtime::chat::ChatChannel;
/// use careline_realtime::ws::config::Config;
/// use futures::StreamExt as _;
///
/// # async fn example() -> careline_realtime::Result<()> {
/// let chat = ChatChannel::admin_help("http://localhost:8000", "patient-7", Config::default())?;
///
/// if !chat.send("We are looking into it") {
///     println!("Not connected, message not sent");
/// }
///
/// let events = chat.events();
/// futures::pin_mut!(events);
/// while let Some(event) = events.next().await {
///     println!("{:?}", event?);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ChatChannel {
    connection: ConnectionManager,
    sender: MessageSender,
    conversation: Conversation,
}

impl ChatChannel {
    /// Connect to `address` and frame outbound text for `conversation`.
    pub fn open(address: Url, conversation: Conversation, config: Config) -> Result<Self> {
        let connection = ConnectionManager::new(config);
        connection.open_url(address)?;

        Ok(Self {
            sender: connection.sender(),
            connection,
            conversation,
        })
    }

    /// Join the help-desk channel under `base`, replying to `user_id`.
    pub fn admin_help(base: &str, user_id: &str, config: Config) -> Result<Self> {
        let conversation = Conversation::HelpDesk {
            user_id: user_id.to_owned(),
        };
        Self::open(endpoint::admin_help(base)?, conversation, config)
    }

    /// Join the personal channel of `user_id` under `base`.
    ///
    /// Messages go to `receiver_id` when given, otherwise to the help desk.
    pub fn user_chat(
        base: &str,
        user_id: &str,
        receiver_id: Option<&str>,
        config: Config,
    ) -> Result<Self> {
        let sender_id = user_id.to_owned();
        let conversation = match receiver_id {
            Some(receiver_id) => Conversation::Direct {
                sender_id,
                receiver_id: receiver_id.to_owned(),
            },
            None => Conversation::Help { sender_id },
        };
        Self::open(endpoint::user_chats(base, user_id)?, conversation, config)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.state().is_connected()
    }

    #[must_use]
    pub fn is_reconnecting(&self) -> bool {
        self.connection.state().is_reconnecting()
    }

    /// Send `text` to the other side of the conversation.
    ///
    /// Returns `false` when the text is blank or the connection is not open; the text is not
    /// queued for later.
    pub fn send(&self, text: &str) -> bool {
        self.try_send(text).is_sent()
    }

    /// Like [`send`](Self::send), reporting why nothing was sent.
    pub fn try_send(&self, text: &str) -> SendOutcome {
        self.sender.try_send(&self.conversation.message(text))
    }

    /// Start over from a fresh attempt counter, typically after [`ConnectionState::Failed`].
    pub fn retry(&self) -> Result<()> {
        self.connection.retry()
    }

    /// Close the connection for good.
    pub fn close(&self) {
        self.connection.close();
    }

    #[must_use]
    pub fn state(&self) -> Snapshot {
        self.connection.state()
    }

    /// Call `observer` with every state published from now on.
    #[must_use]
    pub fn observe<F>(&self, observer: F) -> ObserverHandle
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.connection.store().subscribe(observer)
    }

    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<Snapshot> {
        self.connection.state_receiver()
    }

    /// Raw inbound text frames.
    #[must_use]
    pub fn frames(&self) -> broadcast::Receiver<String> {
        self.connection.subscribe()
    }

    /// Inbound frames decoded as [`ChatEvent`]s.
    ///
    /// A frame that is not a chat message yields an error item and the stream carries on. The
    /// stream ends once the channel has been dropped.
    pub fn events(&self) -> impl Stream<Item = Result<ChatEvent>> + use<> {
        let mut rx = self.connection.subscribe();

        stream! {
            loop {
                match rx.recv().await {
                    Ok(frame) => yield ChatEvent::from_frame(&frame),
                    Err(RecvError::Lagged(count)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Chat stream lagged, missed {count} messages");
                        yield Err(WsError::Lagged { count }.into());
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Whether the channel has stopped on its own and needs [`retry`](Self::retry).
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.connection.state().state == ConnectionState::Failed
    }
}
