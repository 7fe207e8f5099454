//! Help-desk console for the Careline live support chat.
//!
//! This demo:
//! 1. Joins the admin help channel and logs every connection state change
//! 2. Replies to the user given on the command line once the channel is open
//! 3. Prints incoming chat events until interrupted, offering a retry after giving up
//!
//! Run against a local backend:
//! ```sh
//! RUST_LOG=info,careline_realtime=debug cargo run --example admin_help --features tracing -- http://localhost:8000 <user_id>
//! ```

use std::time::Duration;

use careline_realtime::chat::ChatChannel;
use careline_realtime::ws::ConnectionState;
use careline_realtime::ws::config::{Config, ReconnectConfig};
use futures::StreamExt as _;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let base = args.next().unwrap_or_else(|| "http://localhost:8000".to_owned());
    let user_id = args.next().unwrap_or_else(|| "demo-user".to_owned());

    let mut reconnect = ReconnectConfig::default();
    reconnect.max_attempts = Some(5);
    reconnect.initial_backoff = Duration::from_secs(3);

    let mut config = Config::default();
    config.reconnect = reconnect;

    let chat = ChatChannel::admin_help(&base, &user_id, config)?;
    let _observer = chat.observe(|snapshot| {
        info!(
            state = %snapshot.state,
            attempt = snapshot.attempt,
            retry_in = ?snapshot.retry_in,
            last_error = ?snapshot.last_error,
            "Connection state"
        );
    });

    let mut states = chat.state_receiver();
    while !states.borrow_and_update().is_connected() {
        if states.borrow().state == ConnectionState::Failed {
            warn!("Reconnection gave up, retrying from scratch");
            chat.retry()?;
        }
        states.changed().await?;
    }

    if chat.send("Hello from the help desk, how can we help?") {
        info!(%user_id, "Greeting sent");
    } else {
        warn!(outcome = %chat.try_send("Hello"), "Greeting not sent");
    }

    let events = chat.events();
    futures::pin_mut!(events);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.next() => match event {
                Some(Ok(event)) => info!(
                    id = %event.id,
                    from = %event.sender_id,
                    kind = %event.kind,
                    content = %event.content,
                    "Chat message"
                ),
                Some(Err(e)) => debug!(error = %e, "Skipping frame"),
                None => break,
            },
        }
    }

    chat.close();
    Ok(())
}
