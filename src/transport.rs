//! Transport abstraction for the Matrix client-server API.
//!
//! The [`Transport`] trait performs one named protocol operation per method and
//! returns the decoded response. Request signing, HTTP-level retries and JSON
//! (de)serialization are the transport's business; the sync engine only sees
//! typed responses and [`MatrixError`]s.
//!
//! # Connection Setup
//!
//! Construction is intentionally NOT part of this trait. Build a transport
//! externally (for example [`HttpTransport`](crate::HttpTransport) with the
//! default `transport-http` feature) and pass it to
//! [`MatrixClient::new`](crate::MatrixClient::new).
//!
//! # Implementing a Custom Transport
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use matrix_sync_client::protocol::*;
//! use matrix_sync_client::{MatrixError, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn initial_sync(&self, limit: u32) -> Result<InitialSyncResponse, MatrixError> {
//!         // GET /initialSync?limit=... and decode the body
//!         # unimplemented!()
//!     }
//!     // ...one method per protocol operation
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::MatrixError;
use crate::protocol::{
    CreateRoomRequest, CreateRoomResponse, Event, EventStreamResponse, InitialSyncResponse,
    JoinRoomResponse, LoginRequest, LoginResponse, RoomNameContent, RoomTopicContent,
    SendEventResponse,
};

/// A request/response transport for the Matrix client-server API.
///
/// Every method takes `&self`: one transport is shared through an
/// `Arc<dyn Transport>` by the caller and the background poller, so
/// implementations keep any mutable state (the access token) behind interior
/// mutability.
///
/// # Errors
///
/// Every operation fails with [`MatrixError::Request`] when the homeserver
/// answers with a non-success status, and with [`MatrixError::Http`] or
/// [`MatrixError::Timeout`] when no answer arrives.
///
/// # Cancel Safety
///
/// [`event_stream`](Transport::event_stream) **MUST** be cancel-safe: the
/// poller drops an in-flight long-poll when it is asked to stop, and the cursor
/// is only advanced after the call returns.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Install (or clear) the access token used to sign subsequent requests.
    async fn set_access_token(&self, token: Option<String>);

    /// Authenticate an existing account.
    async fn login(&self, request: LoginRequest) -> Result<LoginResponse, MatrixError>;

    /// Register a new account.
    async fn register(&self, request: LoginRequest) -> Result<LoginResponse, MatrixError>;

    /// Create a room.
    async fn create_room(
        &self,
        request: CreateRoomRequest,
    ) -> Result<CreateRoomResponse, MatrixError>;

    /// Join a room by identifier or alias.
    async fn join_room(&self, room_id_or_alias: &str) -> Result<JoinRoomResponse, MatrixError>;

    /// Leave a room.
    async fn leave_room(&self, room_id: &str) -> Result<(), MatrixError>;

    /// Invite a user into a room.
    async fn invite_user(&self, room_id: &str, user_id: &str) -> Result<(), MatrixError>;

    /// Kick a user out of a room.
    async fn kick_user(
        &self,
        room_id: &str,
        user_id: &str,
        reason: Option<&str>,
    ) -> Result<(), MatrixError>;

    /// Ban a user from a room.
    async fn ban_user(&self, room_id: &str, user_id: &str, reason: &str)
        -> Result<(), MatrixError>;

    /// Send a timeline event into a room.
    async fn send_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: Value,
        txn_id: &str,
    ) -> Result<SendEventResponse, MatrixError>;

    /// Fetch the full state of every joined room with up to `limit` recent
    /// messages per room.
    async fn initial_sync(&self, limit: u32) -> Result<InitialSyncResponse, MatrixError>;

    /// Long-poll the event stream from `from`, waiting at most `timeout` for
    /// new events.
    async fn event_stream(
        &self,
        from: &str,
        timeout: Duration,
    ) -> Result<EventStreamResponse, MatrixError>;

    /// Fetch the current `m.room.name` content.
    async fn room_name(&self, room_id: &str) -> Result<RoomNameContent, MatrixError>;

    /// Fetch the current `m.room.topic` content.
    async fn room_topic(&self, room_id: &str) -> Result<RoomTopicContent, MatrixError>;

    /// Fetch every current state event of a room.
    async fn room_state(&self, room_id: &str) -> Result<Vec<Event>, MatrixError>;
}
