//! Sync engine: initial full-state sync and incremental long-poll sync.
//!
//! The engine owns the streaming cursor. It sits behind a mutex that is held
//! for an entire poll cycle (request, cursor update, event routing), so two
//! polls never run against the same cursor at once. Whoever drives the engine,
//! caller or background poller, gets serialized cycles. Readers observe the
//! cursor through a `watch` channel and never wait on a poll in flight.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::error::{ListenerError, MatrixError, Result};
use crate::listener::{ListenerId, ListenerSet};
use crate::protocol::{Event, EventStreamResponse, InitialSyncResponse};
use crate::registry::RoomRegistry;
use crate::room::MissingField;
use crate::transport::Transport;

/// What an initial sync managed to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Rooms seeded into the registry.
    pub rooms: usize,
    /// History events appended across all rooms.
    pub events: usize,
    /// `false` if processing stopped early on a missing field.
    pub complete: bool,
}

/// Drives initial and incremental sync against a [`Transport`].
pub struct SyncEngine {
    transport: Arc<dyn Transport>,
    registry: Arc<RoomRegistry>,
    listeners: ListenerSet,
    cursor: Mutex<Option<String>>,
    published: watch::Sender<Option<String>>,
}

impl SyncEngine {
    pub fn new(transport: Arc<dyn Transport>, registry: Arc<RoomRegistry>) -> Self {
        Self {
            transport,
            registry,
            listeners: ListenerSet::new(),
            cursor: Mutex::new(None),
            published: watch::Sender::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// The current stream cursor, `None` before the first sync.
    pub fn cursor(&self) -> Option<String> {
        self.published.borrow().clone()
    }

    /// Subscribe to cursor changes.
    pub fn subscribe_cursor(&self) -> watch::Receiver<Option<String>> {
        self.published.subscribe()
    }

    fn advance(&self, slot: &mut Option<String>, end: String) {
        *slot = Some(end);
        self.published.send_replace(slot.clone());
    }

    // ── Listeners ───────────────────────────────────────────────────

    /// Register a listener invoked for every stream event.
    pub async fn add_listener<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&Event) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.listeners.add(callback).await
    }

    /// Remove a global listener. Returns `false` if it was not registered.
    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id).await
    }

    // ── Initial sync ────────────────────────────────────────────────

    /// Fetch the full state of every room and seed the registry.
    ///
    /// Runs as one cursor cycle: it waits for a poll in flight to finish and
    /// holds off new polls until the snapshot's cursor is installed.
    ///
    /// History is appended without notifying listeners. State events update
    /// each room's name, topic and aliases. A response with missing fields is
    /// applied as far as it goes; the rest is skipped with a warning and the
    /// returned summary has `complete == false`.
    ///
    /// # Errors
    ///
    /// Propagates any transport error. Nothing is applied in that case.
    pub async fn initial_sync(&self, limit: u32) -> Result<SyncSummary> {
        let mut cursor = self.cursor.lock().await;
        let response = self.transport.initial_sync(limit).await?;
        let mut summary = SyncSummary::default();

        match self.seed(&mut cursor, response, &mut summary).await {
            Ok(()) => summary.complete = true,
            Err(MissingField(field)) => {
                warn!(field, rooms = summary.rooms, "initial sync response incomplete, stopped early");
            }
        }

        debug!(
            rooms = summary.rooms,
            events = summary.events,
            cursor = ?cursor.as_deref(),
            "initial sync applied"
        );
        Ok(summary)
    }

    async fn seed(
        &self,
        cursor: &mut Option<String>,
        response: InitialSyncResponse,
        summary: &mut SyncSummary,
    ) -> std::result::Result<(), MissingField> {
        self.advance(cursor, response.end.ok_or(MissingField("end"))?);

        for snapshot in response.rooms.ok_or(MissingField("rooms"))? {
            let room_id = snapshot.room_id.ok_or(MissingField("room_id"))?;
            let room = self.registry.ensure(&room_id).await;
            summary.rooms += 1;

            let history = snapshot
                .messages
                .ok_or(MissingField("messages"))?
                .chunk
                .ok_or(MissingField("chunk"))?;
            for event in history {
                room.push_event(event).await;
                summary.events += 1;
            }

            for event in snapshot.state.ok_or(MissingField("state"))? {
                room.apply_state_event(&event).await?;
            }
        }
        Ok(())
    }

    // ── Incremental sync ────────────────────────────────────────────

    /// Run one long-poll cycle and route the returned events.
    ///
    /// Returns the number of events processed.
    ///
    /// # Errors
    ///
    /// - [`MatrixError::NotSynced`] if no initial sync has produced a cursor.
    /// - [`MatrixError::StaleCursor`] if the homeserver rejected the cursor.
    /// - Any other transport error, with the cursor unchanged.
    /// - [`MatrixError::Listener`] if a listener failed; the cursor has already
    ///   advanced and the rest of the batch is dropped.
    pub async fn poll_once(&self, timeout: Duration) -> Result<usize> {
        let mut cursor = self.cursor.lock().await;
        let response = self.fetch(cursor.as_deref(), timeout).await?;
        self.apply_stream(&mut cursor, response).await
    }

    /// Poll until an error occurs or `shutdown` resolves.
    ///
    /// Shutdown is observed while waiting for the cursor or the homeserver: a
    /// batch that has been received is always routed completely before the
    /// loop checks again. There is no retry or backoff; the first error ends the loop.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the loop. Returns `Ok(())` on shutdown.
    pub async fn poll_forever<F>(&self, timeout: Duration, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        debug!("poll loop started");

        loop {
            let (mut cursor, response) = tokio::select! {
                biased;
                () = &mut shutdown => {
                    debug!("poll loop shutdown requested");
                    return Ok(());
                }
                cycle = async {
                    let cursor = self.cursor.lock().await;
                    let response = self.fetch(cursor.as_deref(), timeout).await;
                    (cursor, response)
                } => cycle,
            };
            let applied = match response {
                Ok(response) => self.apply_stream(&mut cursor, response).await,
                Err(e) => Err(e),
            };
            if let Err(e) = applied {
                warn!("poll loop exiting: {e}");
                return Err(e);
            }
        }
    }

    async fn fetch(
        &self,
        cursor: Option<&str>,
        timeout: Duration,
    ) -> Result<EventStreamResponse> {
        let from = cursor.ok_or(MatrixError::NotSynced)?;
        match self.transport.event_stream(from, timeout).await {
            Err(e) if e.is_stale_cursor() => {
                warn!(cursor = %from, "homeserver rejected stream cursor");
                Err(MatrixError::StaleCursor {
                    cursor: from.to_string(),
                })
            }
            other => other,
        }
    }

    async fn apply_stream(
        &self,
        cursor: &mut Option<String>,
        response: EventStreamResponse,
    ) -> Result<usize> {
        self.advance(cursor, response.end);
        let count = response.chunk.len();

        for event in response.chunk {
            self.listeners.dispatch(&event).await?;

            if let Some(room_id) = event.room_id.as_deref() {
                let room = self.registry.ensure(room_id).await;
                room.push_event(event.clone()).await;
                room.listeners().dispatch(&event).await?;
            }
        }
        Ok(count)
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
