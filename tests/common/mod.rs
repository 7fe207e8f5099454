#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Not every test binary uses every helper"
)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use careline_realtime::ws::config::Config;
use careline_realtime::ws::{ConnectionStateStore, ObserverHandle, Snapshot};
use futures_util::{SinkExt as _, StreamExt as _};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

pub const WAIT: Duration = Duration::from_secs(5);

/// Mock chat server that can drop, refuse or stall connections on demand.
pub struct MockChatServer {
    addr: SocketAddr,
    /// Broadcast frames to every connected client
    message_tx: broadcast::Sender<String>,
    /// Text frames received from clients
    received_rx: mpsc::UnboundedReceiver<String>,
    /// Request paths of completed handshakes
    paths: Arc<Mutex<Vec<String>>>,
    /// TCP connections accepted, including refused handshakes
    accepts: Arc<AtomicUsize>,
    /// WebSocket sessions that completed the handshake
    sessions: Arc<AtomicUsize>,
    disconnect: Arc<AtomicBool>,
    refuse: Arc<AtomicBool>,
    stall: Arc<AtomicBool>,
    listener_task: JoinHandle<()>,
}

impl MockChatServer {
    /// Start a mock server on a random port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (message_tx, _) = broadcast::channel::<String>(100);
        let (received_tx, received_rx) = mpsc::unbounded_channel::<String>();
        let paths = Arc::new(Mutex::new(Vec::new()));
        let accepts = Arc::new(AtomicUsize::new(0));
        let sessions = Arc::new(AtomicUsize::new(0));
        let disconnect = Arc::new(AtomicBool::new(false));
        let refuse = Arc::new(AtomicBool::new(false));
        let stall = Arc::new(AtomicBool::new(false));

        let broadcast_tx = message_tx.clone();
        let task_paths = Arc::clone(&paths);
        let task_accepts = Arc::clone(&accepts);
        let task_sessions = Arc::clone(&sessions);
        let task_disconnect = Arc::clone(&disconnect);
        let task_refuse = Arc::clone(&refuse);
        let task_stall = Arc::clone(&stall);

        let listener_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                task_accepts.fetch_add(1, Ordering::SeqCst);

                // Dropping the socket before the upgrade fails the client's handshake
                if task_refuse.load(Ordering::SeqCst) {
                    drop(stream);
                    continue;
                }

                let handshake_paths = Arc::clone(&task_paths);
                let record_path =
                    move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                        handshake_paths
                            .lock()
                            .unwrap()
                            .push(request.uri().path().to_owned());
                        Ok(response)
                    };

                let Ok(ws_stream) = tokio_tungstenite::accept_hdr_async(stream, record_path).await
                else {
                    continue;
                };

                if task_stall.load(Ordering::SeqCst) {
                    // Hold the socket without ever reading it, so PINGs go unanswered
                    tokio::spawn(async move {
                        let _held = ws_stream;
                        tokio::time::sleep(Duration::from_secs(60)).await;
                    });
                    task_sessions.fetch_add(1, Ordering::SeqCst);
                    continue;
                }

                let (mut write, mut read) = ws_stream.split();
                let received_tx = received_tx.clone();
                let mut msg_rx = broadcast_tx.subscribe();
                let disconnect = Arc::clone(&task_disconnect);
                task_sessions.fetch_add(1, Ordering::SeqCst);

                tokio::spawn(async move {
                    loop {
                        if disconnect.load(Ordering::SeqCst) {
                            break;
                        }

                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        drop(received_tx.send(text.to_string()));
                                    }
                                    Some(Ok(_)) => {}
                                    _ => break,
                                }
                            }
                            msg = msg_rx.recv() => {
                                match msg {
                                    Ok(text) => {
                                        if write.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(_) => break,
                                }
                            }
                            () = tokio::time::sleep(Duration::from_millis(20)) => {}
                        }
                    }
                });
            }
        });

        Self {
            addr,
            message_tx,
            received_rx,
            paths,
            accepts,
            sessions,
            disconnect,
            refuse,
            stall,
            listener_task,
        }
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn http_base(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Send a text frame to every connected client.
    pub fn send(&self, frame: &str) {
        drop(self.message_tx.send(frame.to_owned()));
    }

    /// Next text frame received from a client.
    pub async fn recv(&mut self) -> Option<String> {
        timeout(WAIT, self.received_rx.recv()).await.ok().flatten()
    }

    /// A frame received within `within`, if any.
    pub async fn recv_within(&mut self, within: Duration) -> Option<String> {
        timeout(within, self.received_rx.recv()).await.ok().flatten()
    }

    /// Drop every live connection, and every new one until [`allow_reconnect`](Self::allow_reconnect).
    pub fn disconnect_all(&self) {
        self.disconnect.store(true, Ordering::SeqCst);
    }

    pub fn allow_reconnect(&self) {
        self.disconnect.store(false, Ordering::SeqCst);
    }

    /// Fail every WebSocket handshake while `refuse` is set.
    pub fn refuse_handshakes(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Complete handshakes but never read from the socket afterwards.
    pub fn stall_sessions(&self, stall: bool) {
        self.stall.store(stall, Ordering::SeqCst);
    }

    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    /// Wait until at least `count` sessions have completed the handshake.
    pub async fn wait_for_sessions(&self, count: usize) {
        timeout(WAIT, async {
            while self.sessions() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}

impl Drop for MockChatServer {
    fn drop(&mut self) {
        self.listener_task.abort();
    }
}

/// An address nothing listens on.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}/api/v1/ws/admin/help")
}

/// Fast, deterministic timings for tests.
pub fn config(initial_backoff: Duration, max_attempts: Option<u32>) -> Config {
    let mut config = Config::default();
    config.heartbeat_interval = Duration::from_secs(5);
    config.heartbeat_timeout = Duration::from_secs(15);
    config.connect_timeout = Duration::from_secs(2);
    config.reconnect.initial_backoff = initial_backoff;
    config.reconnect.max_backoff = Duration::from_secs(30);
    config.reconnect.backoff_multiplier = 2.0;
    config.reconnect.jitter = 0.0;
    config.reconnect.max_attempts = max_attempts;
    config
}

/// Record every snapshot published by `store`.
pub fn record(store: &ConnectionStateStore) -> (Arc<Mutex<Vec<Snapshot>>>, ObserverHandle) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let handle = store.subscribe(move |snapshot| {
        seen_clone.lock().unwrap().push(snapshot.clone());
    });
    (seen, handle)
}

/// Wait for a snapshot matching `predicate`.
pub async fn wait_for<F>(rx: &mut watch::Receiver<Snapshot>, predicate: F) -> Snapshot
where
    F: FnMut(&Snapshot) -> bool,
{
    timeout(WAIT, rx.wait_for(predicate))
        .await
        .unwrap()
        .unwrap()
        .clone()
}
