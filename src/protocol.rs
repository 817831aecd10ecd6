//! Protocol types for the Matrix client-server API (v1 surface).
//!
//! Response types are deliberately lenient: any field the sync engine must
//! survive losing is an `Option`, so a partially formed response still decodes
//! and the engine decides how far it can get (see [`crate::sync`]).
//!
//! Events are kept close to the wire. The handful of fields the engine reads
//! (`type`, `room_id`, `content`) are typed; everything else (`event_id`,
//! `sender`, `origin_server_ts`, ...) is preserved in [`Event::extra`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Type aliases ────────────────────────────────────────────────────

/// Room identifier, e.g. `!abc:example.org`.
pub type RoomId = String;

/// User identifier, e.g. `@alice:example.org`.
pub type UserId = String;

// ── Event type constants ────────────────────────────────────────────

/// State event carrying the room display name.
pub const ROOM_NAME: &str = "m.room.name";
/// State event carrying the room topic.
pub const ROOM_TOPIC: &str = "m.room.topic";
/// State event carrying the room alias list.
pub const ROOM_ALIASES: &str = "m.room.aliases";
/// State event carrying one user's membership.
pub const ROOM_MEMBER: &str = "m.room.member";
/// Timeline message event.
pub const ROOM_MESSAGE: &str = "m.room.message";

/// Login type for user/password authentication.
pub const LOGIN_PASSWORD: &str = "m.login.password";

// ── Events ──────────────────────────────────────────────────────────

/// A protocol event as received from the homeserver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type, e.g. `m.room.message`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Room the event belongs to. Absent for presence, typing and similar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Event content. `Null` when the event carried none.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub content: Value,
    /// Every other field of the event, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// Create an event of the given type with the given content.
    pub fn new(event_type: impl Into<String>, content: Value) -> Self {
        Self {
            event_type: Some(event_type.into()),
            room_id: None,
            content,
            extra: Map::new(),
        }
    }

    /// Attach a room identifier.
    #[must_use]
    pub fn in_room(mut self, room_id: impl Into<RoomId>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    /// The event type, if present.
    pub fn kind(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    /// The `event_id` field, if present.
    pub fn event_id(&self) -> Option<&str> {
        self.extra.get("event_id").and_then(Value::as_str)
    }

    /// The `sender` field, if present.
    pub fn sender(&self) -> Option<&str> {
        self.extra.get("sender").and_then(Value::as_str)
    }

    /// Look up a field of `content`.
    pub fn content_field(&self, key: &str) -> Option<&Value> {
        self.content.get(key)
    }
}

// ── Authentication ──────────────────────────────────────────────────

/// Body of a `/login` or `/register` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Login type, e.g. [`LOGIN_PASSWORD`].
    #[serde(rename = "type")]
    pub login_type: String,
    pub user: String,
    pub password: String,
}

impl LoginRequest {
    /// A `m.login.password` request.
    pub fn password(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login_type: LOGIN_PASSWORD.to_string(),
            user: user.into(),
            password: password.into(),
        }
    }
}

/// Successful `/login` or `/register` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: UserId,
    pub access_token: String,
    pub home_server: String,
}

// ── Rooms ───────────────────────────────────────────────────────────

/// Room visibility for `/createRoom`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

/// Body of a `/createRoom` request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_alias_name: Option<String>,
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invite: Vec<UserId>,
}

/// Successful `/createRoom` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub room_id: RoomId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_alias: Option<String>,
}

/// Successful `/join` response. Older homeservers omit `room_id`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JoinRoomResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
}

/// Successful `/send` response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SendEventResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// Content of an `m.room.name` state event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomNameContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Content of an `m.room.topic` state event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomTopicContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

// ── Sync ────────────────────────────────────────────────────────────

/// A page of events.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<Vec<Event>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// One room in an `/initialSync` response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoomSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Chunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Vec<Event>>,
}

/// `/initialSync` response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InitialSyncResponse {
    /// Stream token to resume from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<Vec<RoomSnapshot>>,
    /// Presence events. Not projected, kept for callers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presence: Vec<Event>,
}

/// `/events` long-poll response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStreamResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// New stream token. Replaces the cursor.
    pub end: String,
    /// Events in arrival order. Empty when the long-poll timed out.
    #[serde(default)]
    pub chunk: Vec<Event>,
}

/// Standard error body returned by the homeserver.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
