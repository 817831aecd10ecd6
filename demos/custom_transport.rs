//! # Custom Transport Example
//!
//! Shows how to implement the [`Transport`] trait with a tiny in-process
//! homeserver. This is useful for:
//!
//! - **Testing**: exercise your bot or UI logic without a real homeserver
//! - **Custom backends**: adapt any request/response layer to the client
//!
//! ## Running
//!
//! ```sh
//! cargo run --example custom_transport
//! ```

use std::time::Duration;

use async_trait::async_trait;
use matrix_sync_client::protocol::{
    Chunk, CreateRoomRequest, CreateRoomResponse, Event, EventStreamResponse,
    InitialSyncResponse, JoinRoomResponse, LoginRequest, LoginResponse, RoomNameContent,
    RoomSnapshot, RoomTopicContent, SendEventResponse, ROOM_MESSAGE, ROOM_NAME,
};
use matrix_sync_client::{ClientConfig, MatrixClient, MatrixError, Transport};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

const ROOM: &str = "!demo:localhost";

// ─────────────────────────────────────────────────────────────────────
// Step 1: Define an in-process "homeserver"
// ─────────────────────────────────────────────────────────────────────

/// A loopback transport: every event the client sends is echoed back through
/// the event stream, and the server half can inject events of its own.
pub struct LoopbackTransport {
    /// Events waiting to be delivered by the next long-poll.
    inbox: Mutex<mpsc::UnboundedReceiver<Event>>,
    /// Sender used to echo the client's own messages.
    echo: mpsc::UnboundedSender<Event>,
    /// Stream position, bumped on every delivered batch.
    position: Mutex<u64>,
}

/// Create a `(transport, injector)` pair.
fn loopback() -> (LoopbackTransport, mpsc::UnboundedSender<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = LoopbackTransport {
        inbox: Mutex::new(rx),
        echo: tx.clone(),
        position: Mutex::new(0),
    };
    (transport, tx)
}

fn not_supported(what: &str) -> MatrixError {
    MatrixError::request(400, Some("M_UNRECOGNIZED"), format!("{what} is not supported"))
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Implement the Transport trait
// ─────────────────────────────────────────────────────────────────────

#[async_trait]
impl Transport for LoopbackTransport {
    async fn set_access_token(&self, _token: Option<String>) {}

    async fn login(&self, request: LoginRequest) -> Result<LoginResponse, MatrixError> {
        Ok(LoginResponse {
            user_id: format!("@{}:localhost", request.user),
            access_token: "loopback-token".into(),
            home_server: "localhost".into(),
        })
    }

    async fn register(&self, request: LoginRequest) -> Result<LoginResponse, MatrixError> {
        self.login(request).await
    }

    async fn create_room(
        &self,
        _request: CreateRoomRequest,
    ) -> Result<CreateRoomResponse, MatrixError> {
        Err(not_supported("createRoom"))
    }

    async fn join_room(&self, _room_id_or_alias: &str) -> Result<JoinRoomResponse, MatrixError> {
        Ok(JoinRoomResponse {
            room_id: Some(ROOM.into()),
        })
    }

    async fn leave_room(&self, _room_id: &str) -> Result<(), MatrixError> {
        Ok(())
    }

    async fn invite_user(&self, _room_id: &str, _user_id: &str) -> Result<(), MatrixError> {
        Err(not_supported("invite"))
    }

    async fn kick_user(
        &self,
        _room_id: &str,
        _user_id: &str,
        _reason: Option<&str>,
    ) -> Result<(), MatrixError> {
        Err(not_supported("kick"))
    }

    async fn ban_user(
        &self,
        _room_id: &str,
        _user_id: &str,
        _reason: &str,
    ) -> Result<(), MatrixError> {
        Err(not_supported("ban"))
    }

    async fn send_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: Value,
        txn_id: &str,
    ) -> Result<SendEventResponse, MatrixError> {
        let event = Event::new(event_type, content).in_room(room_id);
        self.echo
            .send(event)
            .map_err(|e| MatrixError::Http(e.to_string()))?;
        Ok(SendEventResponse {
            event_id: Some(format!("${txn_id}")),
        })
    }

    async fn initial_sync(&self, _limit: u32) -> Result<InitialSyncResponse, MatrixError> {
        Ok(InitialSyncResponse {
            end: Some("s0".into()),
            rooms: Some(vec![RoomSnapshot {
                room_id: Some(ROOM.into()),
                membership: Some("join".into()),
                messages: Some(Chunk {
                    chunk: Some(vec![]),
                    start: None,
                    end: None,
                }),
                state: Some(vec![Event::new(ROOM_NAME, json!({ "name": "Loopback" }))]),
            }]),
            presence: vec![],
        })
    }

    /// Waits for injected or echoed events, up to `timeout`.
    ///
    /// Cancel-safe: `mpsc::UnboundedReceiver::recv` is cancel-safe and the
    /// position only moves once a batch is returned.
    async fn event_stream(
        &self,
        _from: &str,
        timeout: Duration,
    ) -> Result<EventStreamResponse, MatrixError> {
        let mut inbox = self.inbox.lock().await;
        let mut chunk = Vec::new();
        if let Ok(Some(first)) = tokio::time::timeout(timeout, inbox.recv()).await {
            chunk.push(first);
            while let Ok(more) = inbox.try_recv() {
                chunk.push(more);
            }
        }

        let mut position = self.position.lock().await;
        *position += 1;
        Ok(EventStreamResponse {
            start: None,
            end: format!("s{position}"),
            chunk,
        })
    }

    async fn room_name(&self, _room_id: &str) -> Result<RoomNameContent, MatrixError> {
        Ok(RoomNameContent {
            name: Some("Loopback".into()),
        })
    }

    async fn room_topic(&self, _room_id: &str) -> Result<RoomTopicContent, MatrixError> {
        Ok(RoomTopicContent::default())
    }

    async fn room_state(&self, _room_id: &str) -> Result<Vec<Event>, MatrixError> {
        Ok(vec![])
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Wire together the client and the fake homeserver
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for readable output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (transport, injector) = loopback();
    let client = MatrixClient::new(transport, ClientConfig::new("loopback://localhost"));

    client.login_with_password("demo", "unused").await?;
    let room = client.room(ROOM).await.ok_or("initial sync did not seed the room")?;
    tracing::info!("Synced room {ROOM} named {:?}", room.name().await);

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<String>();
    room.add_listener(move |event| {
        if event.kind() == Some(ROOM_MESSAGE) {
            let body = event.content_field("body").and_then(|b| b.as_str());
            let _ = seen_tx.send(body.unwrap_or_default().to_string());
        }
        Ok(())
    })
    .await;

    let mut poller = client.start_listener(Duration::from_secs(5));

    // Our own message comes back through the stream...
    room.send_text("hello from the client").await?;
    // ...and so does one injected by the "server".
    injector.send(
        Event::new(ROOM_MESSAGE, json!({ "msgtype": "m.text", "body": "hello from the server" }))
            .in_room(ROOM),
    )?;

    for _ in 0..2 {
        if let Some(body) = seen_rx.recv().await {
            tracing::info!("Room listener saw: {body}");
        }
    }

    poller.stop().await?;
    tracing::info!(
        "History now holds {} event(s); cursor {:?}",
        room.event_count().await,
        client.session().await.cursor
    );
    Ok(())
}
