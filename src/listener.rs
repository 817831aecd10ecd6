//! Ordered event listener sets.
//!
//! The client keeps one [`ListenerSet`] for global listeners and every
//! [`Room`](crate::Room) keeps its own. Registration order is invocation order;
//! registering the same callback twice invokes it twice.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ListenerError, MatrixError, Result};
use crate::protocol::Event;

/// A callback invoked with each event it is registered for.
///
/// Listeners are synchronous and run on the poll task, so they cannot await
/// the async [`Room`](crate::Room) accessors (name, topic, aliases). Hand the
/// event off instead: route on [`Event::room_id`] and forward what you need
/// through a channel to a task that can look the room up.
///
/// ```rust,ignore
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
/// client
///     .add_listener(move |event| {
///         if let Some(room_id) = event.room_id.clone() {
///             let _ = tx.send(room_id);
///         }
///         Ok(())
///     })
///     .await;
///
/// while let Some(room_id) = rx.recv().await {
///     if let Some(room) = client.room(&room_id).await {
///         println!("activity in {:?}", room.name().await);
///     }
/// }
/// ```
pub type Listener = Arc<dyn Fn(&Event) -> std::result::Result<(), ListenerError> + Send + Sync>;

/// Handle returned by registration, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// An ordered collection of listeners.
#[derive(Default)]
pub struct ListenerSet {
    next_id: AtomicU64,
    entries: RwLock<Vec<(ListenerId, Listener)>>,
}

impl ListenerSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener.
    pub async fn add<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&Event) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().await.push((id, Arc::new(callback)));
        id
    }

    /// Remove a listener. Returns `false` if the id was not registered.
    pub async fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    /// Number of registered listeners.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// `true` if no listener is registered.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Invoke every listener with `event`, in registration order.
    ///
    /// Listeners run on a snapshot taken before the first call, with no lock
    /// held, so a listener may register or remove listeners itself; changes
    /// apply from the next event on.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::Listener`] with the first listener failure. Later
    /// listeners are not invoked for this event.
    pub async fn dispatch(&self, event: &Event) -> Result<()> {
        let snapshot: Vec<Listener> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            if let Err(e) = listener(event) {
                debug!(event_type = ?event.kind(), "listener failed: {e}");
                return Err(MatrixError::Listener(e));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
