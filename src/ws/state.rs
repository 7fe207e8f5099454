#![expect(
    clippy::module_name_repetitions,
    reason = "State types expose their domain in the name for clarity"
)]

use std::time::Duration;

/// Connection lifecycle states.
///
/// `Idle → Connecting → Open`, `Open → Reconnecting → Connecting → Open` after an unexpected
/// closure, any state `→ Closed` on teardown and `Reconnecting → Failed` once the retry cap is
/// reached.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum ConnectionState {
    /// Nothing has been opened yet
    #[default]
    Idle,
    /// A connection attempt is in flight
    Connecting,
    /// The transport is open and accepts frames
    Open,
    /// Waiting for the retry timer after an unexpected closure
    Reconnecting,
    /// Torn down on purpose
    Closed,
    /// The retry cap was reached; only a manual retry leaves this state
    Failed,
}

impl ConnectionState {
    /// No automatic transition leaves a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// Immutable view of a connection handed to observers.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Current lifecycle state
    pub state: ConnectionState,
    /// Consecutive failed attempts since the last successful open
    pub attempt: u32,
    /// Description of the most recent transport failure, cleared on open
    pub last_error: Option<String>,
    /// Delay scheduled before the next attempt while [`ConnectionState::Reconnecting`], `None`
    /// when the retry cap is exhausted
    pub retry_in: Option<Duration>,
}

impl Snapshot {
    pub(crate) fn connecting(attempt: u32, last_error: Option<String>) -> Self {
        Self {
            state: ConnectionState::Connecting,
            attempt,
            last_error,
            retry_in: None,
        }
    }

    pub(crate) fn open() -> Self {
        Self {
            state: ConnectionState::Open,
            ..Self::default()
        }
    }

    /// `retry_in` is `None` when the retry cap has been reached and `Failed` follows.
    pub(crate) fn reconnecting(
        attempt: u32,
        last_error: Option<String>,
        retry_in: Option<Duration>,
    ) -> Self {
        Self {
            state: ConnectionState::Reconnecting,
            attempt,
            last_error,
            retry_in,
        }
    }

    pub(crate) fn closed(&self) -> Self {
        Self {
            state: ConnectionState::Closed,
            attempt: self.attempt,
            last_error: self.last_error.clone(),
            retry_in: None,
        }
    }

    pub(crate) fn failed(attempt: u32, last_error: Option<String>) -> Self {
        Self {
            state: ConnectionState::Failed,
            attempt,
            last_error,
            retry_in: None,
        }
    }

    /// `true` iff the state is [`ConnectionState::Open`].
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Open)
    }

    /// `true` while recovering from a failure: [`ConnectionState::Reconnecting`], or
    /// [`ConnectionState::Connecting`] after at least one failed attempt.
    #[must_use]
    pub const fn is_reconnecting(&self) -> bool {
        match self.state {
            ConnectionState::Reconnecting => true,
            ConnectionState::Connecting => self.attempt > 0,
            _ => false,
        }
    }
}
