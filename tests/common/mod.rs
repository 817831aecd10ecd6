#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Matrix sync client integration tests.
//!
//! Provides a scripted [`MockTransport`] and helper functions for building
//! homeserver response bodies as JSON.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use matrix_sync_client::protocol::{
    CreateRoomRequest, CreateRoomResponse, Event, EventStreamResponse, InitialSyncResponse,
    JoinRoomResponse, LoginRequest, LoginResponse, RoomNameContent, RoomTopicContent,
    SendEventResponse,
};
use matrix_sync_client::{MatrixError, Transport};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::Notify;

// ── MockTransport ───────────────────────────────────────────────────

/// One call the client made, with its interesting arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: &'static str,
    pub args: Vec<String>,
    pub body: Value,
}

/// Shared handle for scripting a [`MockTransport`] and inspecting its calls.
#[derive(Default)]
pub struct Script {
    responses: StdMutex<HashMap<&'static str, VecDeque<Result<Value, MatrixError>>>>,
    calls: StdMutex<Vec<Call>>,
    token: StdMutex<Option<String>>,
    gates: StdMutex<HashMap<&'static str, Arc<Notify>>>,
}

impl Script {
    /// Queue a successful JSON body for the next `op` call.
    pub fn respond(&self, op: &'static str, body: Value) {
        self.push(op, Ok(body));
    }

    /// Queue an error for the next `op` call.
    pub fn fail(&self, op: &'static str, error: MatrixError) {
        self.push(op, Err(error));
    }

    fn push(&self, op: &'static str, item: Result<Value, MatrixError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(item);
    }

    fn next(&self, op: &'static str) -> Option<Result<Value, MatrixError>> {
        self.responses
            .lock()
            .unwrap()
            .get_mut(op)
            .and_then(VecDeque::pop_front)
    }

    /// Hold the next `op` call after it is recorded until the returned
    /// notifier fires. Only `event_stream` honours gates.
    pub fn gate(&self, op: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(op, Arc::clone(&gate));
        gate
    }

    fn take_gate(&self, op: &'static str) -> Option<Arc<Notify>> {
        self.gates.lock().unwrap().remove(op)
    }

    /// Every recorded call, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls of one kind.
    pub fn calls_to(&self, op: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    /// The access token currently installed on the transport.
    pub fn token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }
}

/// A scripted transport for integration testing.
///
/// Each operation records a [`Call`] and decodes the next scripted JSON body
/// for its kind into the typed response, so fixtures exercise the same serde
/// path the HTTP transport uses. With nothing scripted, `event_stream` hangs
/// forever (an idle long-poll) and other operations fail with 404.
pub struct MockTransport {
    script: Arc<Script>,
}

impl MockTransport {
    /// Create a mock transport plus the shared handle used to script it.
    pub fn new() -> (Self, Arc<Script>) {
        let script = Arc::new(Script::default());
        (
            Self {
                script: Arc::clone(&script),
            },
            script,
        )
    }

    fn record(&self, op: &'static str, args: &[&str], body: Value) {
        self.script.calls.lock().unwrap().push(Call {
            op,
            args: args.iter().map(ToString::to_string).collect(),
            body,
        });
    }

    fn answer<T: DeserializeOwned>(&self, op: &'static str) -> Result<T, MatrixError> {
        match self.script.next(op) {
            Some(Ok(body)) => Ok(serde_json::from_value(body)?),
            Some(Err(e)) => Err(e),
            None => Err(not_found(&format!("nothing scripted for {op}"))),
        }
    }

    fn answer_unit(&self, op: &'static str) -> Result<(), MatrixError> {
        self.answer::<Value>(op).map(|_| ())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn set_access_token(&self, token: Option<String>) {
        *self.script.token.lock().unwrap() = token;
    }

    async fn login(&self, request: LoginRequest) -> Result<LoginResponse, MatrixError> {
        self.record("login", &[], serde_json::to_value(&request)?);
        self.answer("login")
    }

    async fn register(&self, request: LoginRequest) -> Result<LoginResponse, MatrixError> {
        self.record("register", &[], serde_json::to_value(&request)?);
        self.answer("register")
    }

    async fn create_room(
        &self,
        request: CreateRoomRequest,
    ) -> Result<CreateRoomResponse, MatrixError> {
        self.record("create_room", &[], serde_json::to_value(&request)?);
        self.answer("create_room")
    }

    async fn join_room(&self, room_id_or_alias: &str) -> Result<JoinRoomResponse, MatrixError> {
        self.record("join_room", &[room_id_or_alias], Value::Null);
        self.answer("join_room")
    }

    async fn leave_room(&self, room_id: &str) -> Result<(), MatrixError> {
        self.record("leave_room", &[room_id], Value::Null);
        self.answer_unit("leave_room")
    }

    async fn invite_user(&self, room_id: &str, user_id: &str) -> Result<(), MatrixError> {
        self.record("invite_user", &[room_id, user_id], Value::Null);
        self.answer_unit("invite_user")
    }

    async fn kick_user(
        &self,
        room_id: &str,
        user_id: &str,
        reason: Option<&str>,
    ) -> Result<(), MatrixError> {
        self.record("kick_user", &[room_id, user_id], json!({ "reason": reason }));
        self.answer_unit("kick_user")
    }

    async fn ban_user(&self, room_id: &str, user_id: &str, reason: &str) -> Result<(), MatrixError> {
        self.record("ban_user", &[room_id, user_id], json!({ "reason": reason }));
        self.answer_unit("ban_user")
    }

    async fn send_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: Value,
        txn_id: &str,
    ) -> Result<SendEventResponse, MatrixError> {
        self.record("send_event", &[room_id, event_type, txn_id], content);
        match self.script.next("send_event") {
            Some(Ok(body)) => Ok(serde_json::from_value(body)?),
            Some(Err(e)) => Err(e),
            None => Ok(SendEventResponse {
                event_id: Some(format!("$txn-{txn_id}")),
            }),
        }
    }

    async fn initial_sync(&self, limit: u32) -> Result<InitialSyncResponse, MatrixError> {
        self.record("initial_sync", &[&limit.to_string()], Value::Null);
        self.answer("initial_sync")
    }

    async fn event_stream(
        &self,
        from: &str,
        timeout: Duration,
    ) -> Result<EventStreamResponse, MatrixError> {
        self.record(
            "event_stream",
            &[from, &timeout.as_millis().to_string()],
            Value::Null,
        );
        if let Some(gate) = self.script.take_gate("event_stream") {
            gate.notified().await;
        }
        match self.script.next("event_stream") {
            Some(Ok(body)) => Ok(serde_json::from_value(body)?),
            Some(Err(e)) => Err(e),
            // Nothing scripted: behave like an idle long-poll until cancelled.
            None => std::future::pending().await,
        }
    }

    async fn room_name(&self, room_id: &str) -> Result<RoomNameContent, MatrixError> {
        self.record("room_name", &[room_id], Value::Null);
        self.answer("room_name")
    }

    async fn room_topic(&self, room_id: &str) -> Result<RoomTopicContent, MatrixError> {
        self.record("room_topic", &[room_id], Value::Null);
        self.answer("room_topic")
    }

    async fn room_state(&self, room_id: &str) -> Result<Vec<Event>, MatrixError> {
        self.record("room_state", &[room_id], Value::Null);
        self.answer("room_state")
    }
}

// ── Error helpers ───────────────────────────────────────────────────

pub fn not_found(message: &str) -> MatrixError {
    MatrixError::request(404, Some("M_NOT_FOUND"), message)
}

pub fn forbidden(message: &str) -> MatrixError {
    MatrixError::request(403, Some("M_FORBIDDEN"), message)
}

// ── JSON helper functions ───────────────────────────────────────────

/// Body of a successful `/login` or `/register`.
pub fn login_json() -> Value {
    json!({
        "user_id": "@alice:example.org",
        "access_token": "syt_alice_token",
        "home_server": "example.org"
    })
}

/// A state event body.
pub fn state_event_json(event_type: &str, content: Value) -> Value {
    json!({
        "type": event_type,
        "state_key": "",
        "sender": "@alice:example.org",
        "content": content
    })
}

/// A message event body in a room.
pub fn message_json(room_id: &str, body: &str) -> Value {
    json!({
        "type": "m.room.message",
        "room_id": room_id,
        "event_id": format!("$msg-{body}"),
        "sender": "@bob:example.org",
        "content": { "msgtype": "m.text", "body": body }
    })
}

/// One room of an initial sync response.
pub fn room_snapshot_json(room_id: &str, messages: Vec<Value>, state: Vec<Value>) -> Value {
    json!({
        "room_id": room_id,
        "membership": "join",
        "messages": { "chunk": messages, "start": "t0", "end": "t1" },
        "state": state
    })
}

/// An initial sync response with the given rooms.
pub fn initial_sync_json(end: &str, rooms: Vec<Value>) -> Value {
    json!({ "end": end, "rooms": rooms, "presence": [] })
}

/// The single-room "Lobby" initial sync used across tests.
pub fn lobby_sync_json(end: &str) -> Value {
    initial_sync_json(
        end,
        vec![room_snapshot_json(
            "!abc",
            vec![],
            vec![state_event_json("m.room.name", json!({ "name": "Lobby" }))],
        )],
    )
}

/// An event stream response.
pub fn stream_json(start: &str, end: &str, chunk: Vec<Value>) -> Value {
    json!({ "start": start, "end": end, "chunk": chunk })
}
