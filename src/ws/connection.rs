#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{MissedTickBehavior, interval, sleep, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::Config;
use super::error::WsError;
use super::policy::ReconnectionPolicy;
use super::sender::MessageSender;
use super::state::{ConnectionState, Snapshot};
use super::store::ConnectionStateStore;
use crate::error::{Error, Kind};
use crate::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Broadcast channel capacity for inbound frames.
const BROADCAST_CAPACITY: usize = 1024;

/// Lower bound for the PING cadence; `tokio::time::interval` rejects a zero period.
const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10);

/// How long a graceful close may take before the socket is simply dropped.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything that a transition reads or swaps. Guarded by a single mutex so that a
/// transition and its side effects (timer cancellation, handle swap) complete together.
#[derive(Default)]
pub(crate) struct Session {
    /// Bumped by every `open` and `close`; a driver only applies transitions for its own value.
    generation: u64,
    address: Option<Url>,
    /// Present only while [`ConnectionState::Open`]; the writer half of the live transport.
    pub(crate) outbound: Option<mpsc::UnboundedSender<String>>,
    cancel: Option<CancellationToken>,
    pub(crate) snapshot: Snapshot,
}

impl Session {
    fn teardown(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.outbound = None;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Owns a single WebSocket session and keeps it alive.
///
/// The manager:
/// - opens the transport and publishes every lifecycle transition to its
///   [`ConnectionStateStore`]
/// - reconnects after unexpected closures, waiting according to its [`ReconnectionPolicy`]
/// - checks liveness with PING frames while open
/// - broadcasts inbound text frames, unparsed, to [`subscribe`](Self::subscribe)rs
///
/// The transport itself never leaves the manager; consumers read [`Snapshot`]s and send through
/// a [`MessageSender`]. Dropping the manager closes it.
///
/// # Example
///
/// ```no_run
/// use careline_realtime::ws::ConnectionManager;
/// use careline_realtime::ws::config::Config;
///
/// # async fn example() -> careline_realtime::Result<()> {
/// let connection = ConnectionManager::new(Config::default());
/// connection.open("wss://careline.example/api/v1/ws/admin/help")?;
///
/// let mut frames = connection.subscribe();
/// while let Ok(frame) = frames.recv().await {
///     println!("Received: {frame}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager {
    config: Config,
    policy: ReconnectionPolicy,
    store: ConnectionStateStore,
    inbound_tx: broadcast::Sender<String>,
    session: Arc<Mutex<Session>>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create an idle manager. Nothing is connected until [`open`](Self::open) is called.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let (inbound_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        Self {
            policy: ReconnectionPolicy::new(config.reconnect),
            config,
            store: ConnectionStateStore::new(),
            inbound_tx,
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    /// Connect to `address`, replacing any existing transport and pending retry.
    ///
    /// Must be called from within a tokio runtime; the connection is driven by a spawned task.
    pub fn open(&self, address: &str) -> Result<()> {
        self.open_url(Url::parse(address)?)
    }

    /// Same as [`open`](Self::open) with an already parsed address.
    pub fn open_url(&self, address: Url) -> Result<()> {
        if !matches!(address.scheme(), "ws" | "wss") {
            return Err(Error::unsupported_scheme(&address));
        }
        let runtime = Handle::try_current().map_err(|e| Error::with_source(Kind::Internal, e))?;

        let cancel = CancellationToken::new();
        let generation = {
            let mut session = lock(&self.session);
            session.teardown();
            session.address = Some(address.clone());
            session.cancel = Some(cancel.clone());
            session.snapshot = Snapshot::connecting(0, None);
            self.store.stage(session.snapshot.clone());
            session.generation
        };
        self.store.flush();

        #[cfg(feature = "tracing")]
        tracing::debug!(%address, generation, "Opening WebSocket connection");

        let driver = Driver {
            address,
            generation,
            config: self.config.clone(),
            policy: self.policy,
            store: self.store.clone(),
            session: Arc::clone(&self.session),
            inbound_tx: self.inbound_tx.clone(),
            cancel,
        };
        runtime.spawn(driver.run());

        Ok(())
    }

    /// Reopen the last address with a fresh attempt counter, e.g. after
    /// [`ConnectionState::Failed`].
    pub fn retry(&self) -> Result<()> {
        let address = lock(&self.session).address.clone();
        let address = address.ok_or_else(|| Error::validation("no address has been opened"))?;
        self.open_url(address)
    }

    /// Tear the connection down and stop reconnecting.
    ///
    /// Idempotent and safe to call from an observer. Once it returns the pending retry timer, if
    /// any, has been cancelled and the session stages no further transition. `Closed` is
    /// delivered to observers before this returns unless another thread is in the middle of a
    /// notification round, in which case that round delivers it.
    pub fn close(&self) {
        let staged = {
            let mut session = lock(&self.session);
            let was_live = session.cancel.is_some();
            session.teardown();
            if session.snapshot.state == ConnectionState::Closed {
                false
            } else {
                #[cfg(feature = "tracing")]
                tracing::debug!(state = %session.snapshot.state, was_live, "Closing WebSocket connection");
                #[cfg(not(feature = "tracing"))]
                let _ = was_live;

                session.snapshot = session.snapshot.closed();
                self.store.stage(session.snapshot.clone());
                true
            }
        };

        if staged {
            self.store.flush();
        }
    }

    /// Current connection snapshot.
    #[must_use]
    pub fn state(&self) -> Snapshot {
        lock(&self.session).snapshot.clone()
    }

    /// The store this manager publishes to.
    #[must_use]
    pub fn store(&self) -> &ConnectionStateStore {
        &self.store
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<Snapshot> {
        self.store.receiver()
    }

    /// Subscribe to inbound text frames.
    ///
    /// Each call returns a new independent receiver. Frames are delivered exactly as received.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.inbound_tx.subscribe()
    }

    /// A send gate bound to this manager's session.
    #[must_use]
    pub fn sender(&self) -> MessageSender {
        MessageSender::new(Arc::clone(&self.session))
    }

    /// Last address passed to [`open`](Self::open).
    #[must_use]
    pub fn address(&self) -> Option<Url> {
        lock(&self.session).address.clone()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

/// Background task driving one session generation.
struct Driver {
    address: Url,
    generation: u64,
    config: Config,
    policy: ReconnectionPolicy,
    store: ConnectionStateStore,
    session: Arc<Mutex<Session>>,
    inbound_tx: broadcast::Sender<String>,
    cancel: CancellationToken,
}

impl Driver {
    /// Main connection loop with automatic reconnection.
    async fn run(self) {
        let mut attempt = 0_u32;

        loop {
            let connect = timeout(
                self.config.connect_timeout,
                connect_async(self.address.as_str()),
            );
            let failure = match self.cancel.run_until_cancelled(connect).await {
                None => return,
                Some(Ok(Ok((ws_stream, _)))) => {
                    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                    if !self.transition(Snapshot::open(), Some(outbound_tx)) {
                        return;
                    }
                    attempt = 0;

                    #[cfg(feature = "tracing")]
                    tracing::info!(address = %self.address, "WebSocket connected");

                    match self.handle_connection(ws_stream, outbound_rx).await {
                        Some(error) => error,
                        None => return,
                    }
                }
                Some(Ok(Err(e))) => Error::from(e),
                Some(Err(_elapsed)) => WsError::ConnectTimeout(self.config.connect_timeout).into(),
            };

            attempt = attempt.saturating_add(1);
            let last_error = Some(failure.to_string());
            let delay = (!self.policy.is_exhausted(attempt)).then(|| self.policy.delay(attempt));

            if !self.transition(
                Snapshot::reconnecting(attempt, last_error.clone(), delay),
                None,
            ) {
                return;
            }

            let Some(delay) = delay else {
                #[cfg(feature = "tracing")]
                tracing::error!(attempt, error = %failure, "Giving up on WebSocket connection");

                self.transition(Snapshot::failed(attempt, last_error), None);
                return;
            };

            #[cfg(feature = "tracing")]
            tracing::warn!(attempt, ?delay, error = %failure, "WebSocket dropped, scheduling reconnect");
            #[cfg(not(feature = "tracing"))]
            let _ = &failure;

            if self.cancel.run_until_cancelled(sleep(delay)).await.is_none() {
                return;
            }

            if !self.transition(Snapshot::connecting(attempt, last_error), None) {
                return;
            }
        }
    }

    /// Apply `snapshot` unless this driver has been superseded by `open` or `close`.
    fn transition(
        &self,
        snapshot: Snapshot,
        outbound: Option<mpsc::UnboundedSender<String>>,
    ) -> bool {
        {
            let mut session = lock(&self.session);
            if session.generation != self.generation {
                return false;
            }
            session.outbound = outbound;
            session.snapshot = snapshot.clone();
            self.store.stage(snapshot);
        }

        self.store.flush();
        true
    }

    /// Pump an open WebSocket until it fails or the session is cancelled.
    ///
    /// Returns the reason the transport stopped, or `None` after an intentional teardown.
    async fn handle_connection(
        &self,
        ws_stream: WsStream,
        mut outbound_rx: mpsc::UnboundedReceiver<String>,
    ) -> Option<Error> {
        let (mut write, mut read) = ws_stream.split();

        let mut heartbeat = interval(self.config.heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL));
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        heartbeat.tick().await;
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    _ = timeout(CLOSE_GRACE, write.send(Message::Close(None))).await;
                    return None;
                }

                // Handle incoming frames
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            last_seen = Instant::now();

                            #[cfg(feature = "tracing")]
                            tracing::trace!(%text, "Received WebSocket text message");

                            _ = self.inbound_tx.send(text.as_str().to_owned());
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Some(WsError::ConnectionClosed.into());
                        }
                        Some(Ok(_)) => {
                            // PONG replies, server PINGs and binary frames only prove liveness.
                            last_seen = Instant::now();
                        }
                        Some(Err(e)) => return Some(e.into()),
                    }
                }

                // Handle outgoing frames handed over by the MessageSender
                Some(frame) = outbound_rx.recv() => {
                    if let Err(e) = write.send(Message::Text(frame.into())).await {
                        return Some(e.into());
                    }
                }

                _ = heartbeat.tick() => {
                    if last_seen.elapsed() > self.config.heartbeat_timeout {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            "Heartbeat timeout: no PONG received within {:?}",
                            self.config.heartbeat_timeout
                        );
                        return Some(WsError::HeartbeatTimeout(self.config.heartbeat_timeout).into());
                    }
                    if let Err(e) = write.send(Message::Ping(Vec::new().into())).await {
                        return Some(e.into());
                    }
                }
            }
        }
    }
}
