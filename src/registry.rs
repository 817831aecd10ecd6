//! Room registry: the client's `room_id -> Room` map.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::protocol::RoomId;
use crate::room::Room;
use crate::transport::Transport;

/// The shared map behind a [`RoomRegistry`]. Rooms hold a weak reference to it
/// so a successful leave can remove them.
pub(crate) type RoomMap = RwLock<HashMap<RoomId, Arc<Room>>>;

/// Owns every [`Room`] the client knows about.
///
/// Rooms are created lazily the first time anything references them and are
/// only removed by [`remove`](RoomRegistry::remove) (which a successful
/// [`Room::leave`] calls).
pub struct RoomRegistry {
    rooms: Arc<RoomMap>,
    transport: Arc<dyn Transport>,
}

impl RoomRegistry {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            transport,
        }
    }

    /// Return the room for `room_id`, creating an empty one if unknown.
    ///
    /// Lookup and insertion happen under one write lock, so concurrent callers
    /// for the same id always receive the same `Arc<Room>`.
    pub async fn ensure(&self, room_id: &str) -> Arc<Room> {
        if let Some(room) = self.rooms.read().await.get(room_id) {
            return Arc::clone(room);
        }

        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(room_id.to_string()).or_insert_with(|| {
            debug!(room_id = %room_id, "tracking new room");
            Arc::new(Room::new(
                room_id.to_string(),
                Arc::clone(&self.transport),
                Arc::downgrade(&self.rooms),
            ))
        });
        Arc::clone(room)
    }

    pub async fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Remove a room by identifier.
    pub async fn remove(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.write().await.remove(room_id)
    }

    /// Snapshot of every known room.
    pub async fn rooms(&self) -> HashMap<RoomId, Arc<Room>> {
        self.rooms.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry").finish_non_exhaustive()
    }
}
