//! Core WebSocket infrastructure.
//!
//! This module provides the connection lifecycle that the chat features are built on.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: owns the WebSocket, reconnects with backoff, checks liveness
//! - [`ReconnectionPolicy`]: pure mapping from attempt number to retry delay
//! - [`ConnectionStateStore`]: publishes [`Snapshot`]s to observers in order
//! - [`MessageSender`]: forwards [`OutboundPayload`]s only while the connection is open
//!
//! # Example
//!
//! ```no_run
//! use careline_realtime::ws::ConnectionManager;
//! use careline_realtime::ws::config::Config;
//!
//! # async fn example() -> careline_realtime::Result<()> {
//! let connection = ConnectionManager::new(Config::default());
//! let _observer = connection.store().subscribe(|snapshot| {
//!     println!("{} (attempt {})", snapshot.state, snapshot.attempt);
//! });
//!
//! connection.open("ws://localhost:8000/api/v1/ws/admin/help")?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod policy;
pub mod sender;
pub mod state;
pub mod store;
pub mod traits;

pub use connection::ConnectionManager;
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use policy::ReconnectionPolicy;
pub use sender::{MessageSender, SendOutcome};
pub use state::{ConnectionState, Snapshot};
pub use store::{ConnectionStateStore, ObserverHandle};
pub use traits::*;
