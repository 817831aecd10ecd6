//! # Basic Sync Example
//!
//! Demonstrates a complete Matrix client lifecycle:
//!
//! 1. Build an HTTP transport for a homeserver
//! 2. Log in with a password (which runs the initial sync)
//! 3. List the rooms and their names
//! 4. Print every incoming message from a background poller
//! 5. Shut down gracefully on Ctrl+C or poller failure
//!
//! ## Running
//!
//! ```sh
//! MATRIX_USER=alice MATRIX_PASSWORD=secret cargo run --example basic_sync
//!
//! # Override the homeserver:
//! MATRIX_HOMESERVER=https://matrix.example.org cargo run --example basic_sync
//! ```

use matrix_sync_client::protocol::ROOM_MESSAGE;
use matrix_sync_client::{ClientConfig, HttpTransport, HttpTransportConfig, MatrixClient};

/// Default homeserver when `MATRIX_HOMESERVER` is not set.
const DEFAULT_HOMESERVER: &str = "http://localhost:8008";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let homeserver =
        std::env::var("MATRIX_HOMESERVER").unwrap_or_else(|_| DEFAULT_HOMESERVER.to_string());
    let user = std::env::var("MATRIX_USER")?;
    let password = std::env::var("MATRIX_PASSWORD")?;
    tracing::info!("Connecting to {homeserver}");

    let transport = HttpTransport::new(HttpTransportConfig::new(&homeserver))?;
    let config = ClientConfig::new(&homeserver).with_initial_sync_limit(5);
    let client = MatrixClient::new(transport, config);

    // ── Login + initial sync ────────────────────────────────────────
    client.login_with_password(&user, &password).await?;
    tracing::info!("Logged in as {:?}", client.user_id().await);

    for (room_id, room) in client.rooms().await {
        tracing::info!(
            "{room_id}: {} ({} recent event(s))",
            room.name().await.as_deref().unwrap_or("<unnamed>"),
            room.event_count().await
        );
    }

    // ── Listeners ───────────────────────────────────────────────────
    client
        .add_listener(|event| {
            if event.kind() == Some(ROOM_MESSAGE) {
                let body = event
                    .content_field("body")
                    .and_then(|b| b.as_str())
                    .unwrap_or_default();
                println!(
                    "[{}] {}: {body}",
                    event.room_id.as_deref().unwrap_or("?"),
                    event.sender().unwrap_or("?")
                );
            }
            Ok(())
        })
        .await;

    // ── Poll until Ctrl+C ───────────────────────────────────────────
    let mut poller = client.start_listener(client.config().poll_timeout);

    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, shutting down…");
            None
        }
        result = poller.join() => Some(result),
    };
    let result = match finished {
        Some(result) => result,
        None => poller.stop().await,
    };

    // ── Cleanup ─────────────────────────────────────────────────────
    match result {
        Ok(()) => tracing::info!("Poller stopped. Goodbye!"),
        Err(e) => tracing::error!("Poller failed: {e}"),
    }
    Ok(())
}
