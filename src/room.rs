//! Local projection of a single room.
//!
//! [`RoomState`] is the pure part: name, topic and aliases, updated by one entry
//! point, [`RoomState::apply_event`], with last-write-wins per field.
//! [`Room`] is the shared handle the client hands out: it owns a `RoomState`,
//! the room's event history and its listeners, and carries the room-scoped
//! one-shot operations (send, invite, kick, ban, leave, refresh).

use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{ListenerError, MatrixError, Result};
use crate::listener::{ListenerId, ListenerSet};
use crate::protocol::{
    Event, RoomId, SendEventResponse, ROOM_ALIASES, ROOM_MESSAGE, ROOM_NAME, ROOM_TOPIC,
};
use crate::registry::RoomMap;
use crate::transport::Transport;

/// Default dimensions advertised for images without explicit ones.
const DEFAULT_IMAGE_DIMENSIONS: (u32, u32) = (500, 500);

/// Default dimensions advertised for videos without explicit ones.
const DEFAULT_VIDEO_DIMENSIONS: (u32, u32) = (640, 480);

// ── State projection ────────────────────────────────────────────────

/// A recognised state event was missing the content field it must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("missing field `{0}`")]
pub struct MissingField(pub &'static str);

/// Which derived field a state event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    Name,
    Topic,
    Aliases,
}

/// Derived room state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomState {
    pub name: Option<String>,
    pub topic: Option<String>,
    /// Aliases as last received, order and duplicates preserved.
    pub aliases: Vec<String>,
}

impl RoomState {
    /// Apply one event to the projection.
    ///
    /// `m.room.name`, `m.room.topic` and `m.room.aliases` replace the matching
    /// field; every other event (and one without a `type`) is ignored, as is a
    /// recognised event whose content field has the wrong JSON type.
    /// Returns the field that changed, or `None` if nothing observable did.
    ///
    /// # Errors
    ///
    /// Returns [`MissingField`] when a recognised state event lacks its content
    /// field. The projection is left untouched in that case.
    pub fn apply_event(&mut self, event: &Event) -> std::result::Result<Option<StateField>, MissingField> {
        let changed = match event.kind() {
            Some(ROOM_NAME) => string_update(event, "name")?
                .and_then(|name| self.set_name(name).then_some(StateField::Name)),
            Some(ROOM_TOPIC) => string_update(event, "topic")?
                .and_then(|topic| self.set_topic(topic).then_some(StateField::Topic)),
            Some(ROOM_ALIASES) => {
                let value = event
                    .content_field("aliases")
                    .ok_or(MissingField("aliases"))?;
                match alias_list(value) {
                    Some(aliases) => self.set_aliases(aliases).then_some(StateField::Aliases),
                    None => {
                        warn!(value = %value, "ignoring non-list room aliases");
                        None
                    }
                }
            }
            _ => None,
        };
        Ok(changed)
    }

    /// Replace the name if different. Returns whether it changed.
    pub fn set_name(&mut self, name: Option<String>) -> bool {
        replace_if_changed(&mut self.name, name)
    }

    /// Replace the topic if different. Returns whether it changed.
    pub fn set_topic(&mut self, topic: Option<String>) -> bool {
        replace_if_changed(&mut self.topic, topic)
    }

    /// Replace the alias list if different. Returns whether it changed.
    pub fn set_aliases(&mut self, aliases: Vec<String>) -> bool {
        replace_if_changed(&mut self.aliases, aliases)
    }
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

/// `content.<key>` as a nullable string update.
///
/// `Some(None)` for an explicit `null`, which clears the field. `None` when
/// the value is neither a string nor `null`.
fn string_update(
    event: &Event,
    key: &'static str,
) -> std::result::Result<Option<Option<String>>, MissingField> {
    match event.content_field(key) {
        Some(Value::String(s)) => Ok(Some(Some(s.clone()))),
        Some(Value::Null) => Ok(Some(None)),
        Some(other) => {
            warn!(field = key, value = %other, "ignoring non-string state field");
            Ok(None)
        }
        None => Err(MissingField(key)),
    }
}

/// Strings of a JSON array, skipping non-string entries.
fn alias_list(value: &Value) -> Option<Vec<String>> {
    let entries = value.as_array()?;
    Some(
        entries
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

// ── Outcomes ────────────────────────────────────────────────────────

/// Result of a best-effort refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The stored value was replaced.
    Changed,
    /// The value was equal, absent from the response, or the request failed.
    Unchanged,
}

impl RefreshOutcome {
    /// `true` for [`RefreshOutcome::Changed`].
    pub fn is_changed(self) -> bool {
        self == Self::Changed
    }
}

impl From<bool> for RefreshOutcome {
    fn from(changed: bool) -> Self {
        if changed {
            Self::Changed
        } else {
            Self::Unchanged
        }
    }
}

/// Result of a membership or moderation operation.
#[derive(Debug)]
pub enum MembershipOutcome {
    /// The homeserver accepted the request.
    Done,
    /// The homeserver refused for lack of permission (403 / `M_FORBIDDEN`).
    NotAuthorized {
        errcode: Option<String>,
        message: String,
    },
    /// Any other failure.
    Failed(MatrixError),
}

impl MembershipOutcome {
    pub(crate) fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(e) if e.is_forbidden() => match e {
                MatrixError::Request {
                    errcode, message, ..
                } => Self::NotAuthorized { errcode, message },
                other => Self::Failed(other),
            },
            Err(e) => Self::Failed(e),
        }
    }

    /// Collapse to a boolean: `true` only for [`MembershipOutcome::Done`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }
}

// ── Media ───────────────────────────────────────────────────────────

/// Metadata advertised alongside an image or video message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub size: u64,
    pub mimetype: String,
    /// Width and height. Defaults per media kind when `None`.
    pub dimensions: Option<(u32, u32)>,
}

impl MediaInfo {
    pub fn new(size: u64, mimetype: impl Into<String>) -> Self {
        Self {
            size,
            mimetype: mimetype.into(),
            dimensions: None,
        }
    }

    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }

    fn content(&self, msgtype: &str, url: &str, default_dimensions: (u32, u32)) -> Value {
        let (w, h) = self.dimensions.unwrap_or(default_dimensions);
        json!({
            "msgtype": msgtype,
            "body": url,
            "url": url,
            "info": {
                "size": self.size,
                "mimetype": self.mimetype,
                "w": w,
                "h": h,
            },
        })
    }
}

// ── Room handle ─────────────────────────────────────────────────────

/// A room known to the client.
///
/// Shared as `Arc<Room>` between the caller and the background poller. Every
/// mutable part sits behind its own lock; no lock is held while listeners run.
pub struct Room {
    room_id: RoomId,
    transport: Arc<dyn Transport>,
    registry: Weak<RoomMap>,
    state: RwLock<RoomState>,
    events: RwLock<Vec<Event>>,
    listeners: ListenerSet,
}

impl Room {
    pub(crate) fn new(room_id: RoomId, transport: Arc<dyn Transport>, registry: Weak<RoomMap>) -> Self {
        Self {
            room_id,
            transport,
            registry,
            state: RwLock::new(RoomState::default()),
            events: RwLock::new(Vec::new()),
            listeners: ListenerSet::new(),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub async fn name(&self) -> Option<String> {
        self.state.read().await.name.clone()
    }

    pub async fn topic(&self) -> Option<String> {
        self.state.read().await.topic.clone()
    }

    pub async fn aliases(&self) -> Vec<String> {
        self.state.read().await.aliases.clone()
    }

    /// Snapshot of the derived state.
    pub async fn state(&self) -> RoomState {
        self.state.read().await.clone()
    }

    /// Snapshot of the event history, in arrival order.
    pub async fn events(&self) -> Vec<Event> {
        self.events.read().await.clone()
    }

    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    // ── Projection ──────────────────────────────────────────────────

    /// Apply a state event to this room's projection.
    ///
    /// # Errors
    ///
    /// See [`RoomState::apply_event`].
    pub async fn apply_state_event(
        &self,
        event: &Event,
    ) -> std::result::Result<Option<StateField>, MissingField> {
        let changed = self.state.write().await.apply_event(event)?;
        if let Some(field) = changed {
            debug!(room_id = %self.room_id, ?field, "room state changed");
        }
        Ok(changed)
    }

    /// Append an event to the history without notifying listeners.
    pub(crate) async fn push_event(&self, event: Event) {
        self.events.write().await.push(event);
    }

    // ── Listeners ───────────────────────────────────────────────────

    /// Register a listener for events arriving in this room.
    pub async fn add_listener<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&Event) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.listeners.add(callback).await
    }

    /// Remove a room listener. Returns `false` if it was not registered.
    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id).await
    }

    pub(crate) fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    // ── Refresh ─────────────────────────────────────────────────────

    /// Re-read the room name from the homeserver.
    pub async fn refresh_name(&self) -> RefreshOutcome {
        match self.transport.room_name(&self.room_id).await {
            Ok(content) => match content.name {
                Some(name) => self.state.write().await.set_name(Some(name)).into(),
                None => RefreshOutcome::Unchanged,
            },
            Err(e) => {
                warn!(room_id = %self.room_id, "failed to refresh room name: {e}");
                RefreshOutcome::Unchanged
            }
        }
    }

    /// Re-read the room topic from the homeserver.
    pub async fn refresh_topic(&self) -> RefreshOutcome {
        match self.transport.room_topic(&self.room_id).await {
            Ok(content) => match content.topic {
                Some(topic) => self.state.write().await.set_topic(Some(topic)).into(),
                None => RefreshOutcome::Unchanged,
            },
            Err(e) => {
                warn!(room_id = %self.room_id, "failed to refresh room topic: {e}");
                RefreshOutcome::Unchanged
            }
        }
    }

    /// Re-read the alias list from the room's full state.
    ///
    /// Only the first state event whose content has an `aliases` field is
    /// considered; lists from other alias events are not merged in.
    pub async fn refresh_aliases(&self) -> RefreshOutcome {
        let fragments = match self.transport.room_state(&self.room_id).await {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!(room_id = %self.room_id, "failed to refresh room aliases: {e}");
                return RefreshOutcome::Unchanged;
            }
        };

        let Some(aliases) = fragments
            .iter()
            .find_map(|fragment| fragment.content_field("aliases"))
        else {
            return RefreshOutcome::Unchanged;
        };

        match alias_list(aliases) {
            Some(aliases) => self.state.write().await.set_aliases(aliases).into(),
            None => RefreshOutcome::Unchanged,
        }
    }

    // ── Messages ────────────────────────────────────────────────────

    /// Send an `m.room.message` event with arbitrary content.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    pub async fn send_message(&self, content: Value) -> Result<SendEventResponse> {
        let txn_id = uuid::Uuid::new_v4().simple().to_string();
        self.transport
            .send_event(&self.room_id, ROOM_MESSAGE, content, &txn_id)
            .await
    }

    /// Send a plain text message.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    pub async fn send_text(&self, text: &str) -> Result<SendEventResponse> {
        self.send_message(json!({ "msgtype": "m.text", "body": text }))
            .await
    }

    /// Send an emote (`/me`) message.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    pub async fn send_emote(&self, text: &str) -> Result<SendEventResponse> {
        self.send_message(json!({ "msgtype": "m.emote", "body": text }))
            .await
    }

    /// Send an image already uploaded to `url`.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    pub async fn send_image(&self, url: &str, info: &MediaInfo) -> Result<SendEventResponse> {
        self.send_message(info.content("m.image", url, DEFAULT_IMAGE_DIMENSIONS))
            .await
    }

    /// Send a video already uploaded to `url`.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    pub async fn send_video(&self, url: &str, info: &MediaInfo) -> Result<SendEventResponse> {
        self.send_message(info.content("m.video", url, DEFAULT_VIDEO_DIMENSIONS))
            .await
    }

    // ── Membership ──────────────────────────────────────────────────

    pub async fn invite_user(&self, user_id: &str) -> MembershipOutcome {
        MembershipOutcome::from_result(self.transport.invite_user(&self.room_id, user_id).await)
    }

    pub async fn kick_user(&self, user_id: &str, reason: Option<&str>) -> MembershipOutcome {
        MembershipOutcome::from_result(
            self.transport
                .kick_user(&self.room_id, user_id, reason)
                .await,
        )
    }

    pub async fn ban_user(&self, user_id: &str, reason: &str) -> MembershipOutcome {
        MembershipOutcome::from_result(
            self.transport
                .ban_user(&self.room_id, user_id, reason)
                .await,
        )
    }

    /// Leave the room. On success the room is dropped from the client's registry.
    pub async fn leave(&self) -> MembershipOutcome {
        let outcome = MembershipOutcome::from_result(self.transport.leave_room(&self.room_id).await);
        if outcome.is_success() {
            if let Some(rooms) = self.registry.upgrade() {
                rooms.write().await.remove(&self.room_id);
                debug!(room_id = %self.room_id, "left room");
            }
        }
        outcome
    }
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("room_id", &self.room_id)
            .finish_non_exhaustive()
    }
}
