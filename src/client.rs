//! Async client for the Matrix client-server API.
//!
//! [`MatrixClient`] owns the session (credentials and homeserver identity), the
//! [`RoomRegistry`] and the [`SyncEngine`]. Incremental sync can be driven by
//! hand with [`listen_for_events`](MatrixClient::listen_for_events) or handed to
//! a background task with [`start_listener`](MatrixClient::start_listener),
//! which returns a [`ListenerHandle`] used to stop it and collect its result.
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = HttpTransport::new(HttpTransportConfig::new("https://matrix.org"))?;
//! let client = MatrixClient::new(transport, ClientConfig::new("https://matrix.org"));
//! client.login_with_password("alice", "secret").await?;
//!
//! client.add_listener(|event| {
//!     println!("{:?}", event.kind());
//!     Ok(())
//! }).await;
//!
//! let mut poller = client.start_listener(client.config().poll_timeout);
//! // ...
//! poller.stop().await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{ListenerError, MatrixError, Result};
use crate::listener::ListenerId;
use crate::protocol::{
    CreateRoomRequest, Event, LoginRequest, LoginResponse, RoomId, UserId, Visibility,
};
use crate::registry::RoomRegistry;
use crate::room::{MembershipOutcome, Room};
use crate::sync::{SyncEngine, SyncSummary};
use crate::transport::Transport;

/// Default long-poll timeout.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of historical messages fetched per room on initial sync.
const DEFAULT_INITIAL_SYNC_LIMIT: u32 = 1;

/// Default timeout for stopping the background poller.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`MatrixClient`].
///
/// The only required field is the homeserver base URL; all others have
/// sensible defaults.
///
/// # Example
///
/// ```
/// use matrix_sync_client::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("https://matrix.org")
///     .with_initial_sync_limit(10)
///     .with_poll_timeout(Duration::from_secs(10));
/// assert_eq!(config.initial_sync_limit, 10);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Homeserver base URL, recorded in the [`Session`].
    pub homeserver: String,
    /// Messages fetched per room by the initial sync after authentication.
    ///
    /// Defaults to **1**.
    pub initial_sync_limit: u32,
    /// Long-poll timeout used by [`MatrixClient::start_listener`] callers that
    /// go with the default.
    ///
    /// Defaults to **30 seconds**.
    pub poll_timeout: Duration,
    /// How long [`ListenerHandle::stop`] waits for the poller before aborting it.
    ///
    /// Defaults to **1 second**. A zero timeout aborts immediately.
    pub shutdown_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration for the given homeserver with default values.
    pub fn new(homeserver: impl Into<String>) -> Self {
        Self {
            homeserver: homeserver.into(),
            initial_sync_limit: DEFAULT_INITIAL_SYNC_LIMIT,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the number of messages fetched per room on initial sync.
    #[must_use]
    pub fn with_initial_sync_limit(mut self, limit: u32) -> Self {
        self.initial_sync_limit = limit;
        self
    }

    /// Set the default long-poll timeout.
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the poller shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// Snapshot of the client session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub homeserver: String,
    pub access_token: Option<String>,
    pub user_id: Option<UserId>,
    /// Homeserver name reported at login, e.g. `matrix.org`.
    pub home_server: Option<String>,
    /// Stream cursor, `None` before the first sync.
    pub cursor: Option<String>,
}

// ── CreateRoomParams ────────────────────────────────────────────────

/// Parameters for creating a room.
///
/// # Example
///
/// ```
/// use matrix_sync_client::client::CreateRoomParams;
///
/// let params = CreateRoomParams::new()
///     .with_alias("lobby")
///     .public()
///     .invite("@bob:example.org");
/// assert!(params.is_public);
/// assert_eq!(params.invitees.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRoomParams {
    /// Local part of the alias to claim.
    pub alias: Option<String>,
    pub is_public: bool,
    pub invitees: Vec<UserId>,
}

impl CreateRoomParams {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }

    #[must_use]
    pub fn invite(mut self, user_id: impl Into<UserId>) -> Self {
        self.invitees.push(user_id.into());
        self
    }
}

impl From<CreateRoomParams> for CreateRoomRequest {
    fn from(params: CreateRoomParams) -> Self {
        Self {
            room_alias_name: params.alias,
            visibility: if params.is_public {
                Visibility::Public
            } else {
                Visibility::Private
            },
            invite: params.invitees,
        }
    }
}

// ── Client ──────────────────────────────────────────────────────────

/// Async client handle for a Matrix homeserver.
///
/// Cheap to share behind an `Arc`. Rooms, listeners and the stream cursor are
/// internally synchronized, so the caller and the background poller may use
/// the client concurrently.
pub struct MatrixClient {
    transport: Arc<dyn Transport>,
    engine: Arc<SyncEngine>,
    session: RwLock<Session>,
    config: ClientConfig,
}

impl MatrixClient {
    /// Create an unauthenticated client.
    pub fn new(transport: impl Transport, config: ClientConfig) -> Self {
        Self::from_shared(Arc::new(transport), config)
    }

    /// Create an unauthenticated client over an already shared transport.
    pub fn from_shared(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        let registry = Arc::new(RoomRegistry::new(Arc::clone(&transport)));
        let engine = Arc::new(SyncEngine::new(Arc::clone(&transport), registry));
        let session = Session {
            homeserver: config.homeserver.clone(),
            ..Session::default()
        };
        Self {
            transport,
            engine,
            session: RwLock::new(session),
            config,
        }
    }

    /// Restore a session from an existing access token and run the initial sync.
    ///
    /// # Errors
    ///
    /// Propagates the initial sync error (e.g. `M_UNKNOWN_TOKEN`).
    pub async fn with_access_token(
        transport: impl Transport,
        config: ClientConfig,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        let client = Self::new(transport, config);
        let token = access_token.into();
        client.session.write().await.access_token = Some(token.clone());
        client.transport.set_access_token(Some(token)).await;
        client.sync(client.config.initial_sync_limit).await?;
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ── Authentication ──────────────────────────────────────────────

    /// Log in with `m.login.password`, then run the initial sync.
    ///
    /// Returns the access token.
    ///
    /// # Errors
    ///
    /// Propagates the login or initial sync error.
    pub async fn login_with_password(&self, user: &str, password: &str) -> Result<String> {
        let response = self
            .transport
            .login(LoginRequest::password(user, password))
            .await?;
        self.authenticated(response).await
    }

    /// Register a new account with `m.login.password`, then run the initial sync.
    ///
    /// Returns the access token.
    ///
    /// # Errors
    ///
    /// Propagates the registration or initial sync error.
    pub async fn register_with_password(&self, user: &str, password: &str) -> Result<String> {
        let response = self
            .transport
            .register(LoginRequest::password(user, password))
            .await?;
        self.authenticated(response).await
    }

    async fn authenticated(&self, response: LoginResponse) -> Result<String> {
        let LoginResponse {
            user_id,
            access_token,
            home_server,
        } = response;
        info!(user_id = %user_id, home_server = %home_server, "authenticated");

        {
            let mut session = self.session.write().await;
            session.user_id = Some(user_id);
            session.access_token = Some(access_token.clone());
            session.home_server = Some(home_server);
        }
        self.transport
            .set_access_token(Some(access_token.clone()))
            .await;

        self.sync(self.config.initial_sync_limit).await?;
        Ok(access_token)
    }

    /// `true` once an access token is known.
    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.access_token.is_some()
    }

    pub async fn user_id(&self) -> Option<UserId> {
        self.session.read().await.user_id.clone()
    }

    /// Snapshot of the session, including the current stream cursor.
    pub async fn session(&self) -> Session {
        let mut session = self.session.read().await.clone();
        session.cursor = self.engine.cursor();
        session
    }

    // ── Rooms ───────────────────────────────────────────────────────

    /// Create a room and start tracking it.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    pub async fn create_room(&self, params: CreateRoomParams) -> Result<Arc<Room>> {
        let response = self.transport.create_room(params.into()).await?;
        Ok(self.engine.registry().ensure(&response.room_id).await)
    }

    /// Join a room by identifier or alias and start tracking it.
    ///
    /// When the homeserver does not echo the room id, the argument is used.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    pub async fn join_room(&self, room_id_or_alias: &str) -> Result<Arc<Room>> {
        let response = self.transport.join_room(room_id_or_alias).await?;
        let room_id = response
            .room_id
            .unwrap_or_else(|| room_id_or_alias.to_string());
        Ok(self.engine.registry().ensure(&room_id).await)
    }

    /// Leave a room. On success the room is no longer tracked.
    pub async fn leave_room(&self, room_id: &str) -> MembershipOutcome {
        match self.engine.registry().get(room_id).await {
            Some(room) => room.leave().await,
            None => MembershipOutcome::from_result(self.transport.leave_room(room_id).await),
        }
    }

    /// Snapshot of every tracked room.
    pub async fn rooms(&self) -> HashMap<RoomId, Arc<Room>> {
        self.engine.registry().rooms().await
    }

    pub async fn room(&self, room_id: &str) -> Option<Arc<Room>> {
        self.engine.registry().get(room_id).await
    }

    // ── Listeners ───────────────────────────────────────────────────

    /// Register a listener invoked for every stream event, in every room.
    pub async fn add_listener<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&Event) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.engine.add_listener(callback).await
    }

    /// Remove a global listener. Returns `false` if it was not registered.
    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        self.engine.remove_listener(id).await
    }

    // ── Sync ────────────────────────────────────────────────────────

    /// Run a full initial sync, e.g. after a [`MatrixError::StaleCursor`].
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    pub async fn sync(&self, limit: u32) -> Result<SyncSummary> {
        self.engine.initial_sync(limit).await
    }

    /// Long-poll once and dispatch the returned events.
    ///
    /// # Errors
    ///
    /// See [`SyncEngine::poll_once`].
    pub async fn listen_for_events(&self, timeout: Duration) -> Result<usize> {
        self.engine.poll_once(timeout).await
    }

    /// Long-poll until an error occurs or `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the loop.
    pub async fn listen_forever<F>(&self, timeout: Duration, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.engine.poll_forever(timeout, shutdown).await
    }

    /// Spawn the background poller.
    ///
    /// The poller runs until it hits an error or the returned handle is
    /// stopped or dropped. It never restarts itself; collect its terminal
    /// result with [`ListenerHandle::stop`] or [`ListenerHandle::join`].
    #[must_use = "dropping the handle aborts the poller"]
    pub fn start_listener(&self, timeout: Duration) -> ListenerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let engine = Arc::clone(&self.engine);

        let task = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            let result = engine.poll_forever(timeout, shutdown).await;
            match &result {
                Ok(()) => debug!("background poller stopped"),
                Err(e) => error!("background poller failed: {e}"),
            }
            result
        });

        ListenerHandle {
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: self.config.shutdown_timeout,
        }
    }
}

impl std::fmt::Debug for MatrixClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixClient")
            .field("homeserver", &self.config.homeserver)
            .field("cursor", &self.engine.cursor())
            .finish_non_exhaustive()
    }
}

// ── Background poller ───────────────────────────────────────────────

/// Handle to the background poller spawned by [`MatrixClient::start_listener`].
///
/// Dropping the handle aborts the poller.
pub struct ListenerHandle {
    task: Option<JoinHandle<Result<()>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl ListenerHandle {
    /// `true` once the poller has exited (stopped, failed or aborted).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Ask the poller to stop and return its terminal result.
    ///
    /// An in-flight long-poll is abandoned; a batch already received is
    /// routed first. If the poller does not exit within the configured
    /// shutdown timeout it is aborted.
    ///
    /// # Errors
    ///
    /// Returns the error the poller failed with, or
    /// [`MatrixError::PollerAborted`] if it had to be aborted or panicked.
    /// Calling `stop` again after it returned yields `Ok(())`.
    pub async fn stop(&mut self) -> Result<()> {
        debug!("ListenerHandle: stop requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                warn!("poller terminated with join error: {join_err}");
                Err(MatrixError::PollerAborted(join_err.to_string()))
            }
            Err(_) => {
                warn!("poller did not exit within timeout; aborting task");
                task.abort();
                if let Err(join_err) = task.await {
                    debug!("poller aborted: {join_err}");
                }
                Err(MatrixError::PollerAborted(
                    "did not stop within the shutdown timeout".into(),
                ))
            }
        }
    }

    /// Wait for the poller to exit on its own and return its terminal result.
    ///
    /// # Errors
    ///
    /// Same as [`stop`](Self::stop).
    ///
    /// Cancel-safe: if the returned future is dropped the poller keeps
    /// running and the handle can still be stopped.
    pub async fn join(&mut self) -> Result<()> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let result = task
            .await
            .unwrap_or_else(|join_err| Err(MatrixError::PollerAborted(join_err.to_string())));
        self.task = None;
        self.shutdown_tx = None;
        result
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("finished", &self.is_finished())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        // No executor context to await a graceful stop here; abort instead.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{
        Chunk, CreateRoomResponse, EventStreamResponse, InitialSyncResponse, JoinRoomResponse,
        RoomSnapshot, ROOM_NAME,
    };
    use crate::test_support::{state_event, MockTransport};
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn client() -> (MatrixClient, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        let client = MatrixClient::from_shared(
            transport.clone(),
            ClientConfig::new("https://hs.test").with_shutdown_timeout(Duration::from_millis(200)),
        );
        (client, transport)
    }

    fn login_response() -> LoginResponse {
        LoginResponse {
            user_id: "@alice:hs.test".into(),
            access_token: "tok123".into(),
            home_server: "hs.test".into(),
        }
    }

    fn lobby_sync(end: &str) -> InitialSyncResponse {
        InitialSyncResponse {
            end: Some(end.into()),
            rooms: Some(vec![RoomSnapshot {
                room_id: Some("!abc".into()),
                membership: Some("join".into()),
                messages: Some(Chunk {
                    chunk: Some(vec![]),
                    start: None,
                    end: None,
                }),
                state: Some(vec![state_event(ROOM_NAME, json!({ "name": "Lobby" }))]),
            }]),
            presence: vec![],
        }
    }

    fn stream(end: &str, chunk: Vec<Event>) -> EventStreamResponse {
        EventStreamResponse {
            start: None,
            end: end.into(),
            chunk,
        }
    }

    #[test]
    fn config_defaults() {
        let config = ClientConfig::new("https://hs.test");
        assert_eq!(config.homeserver, "https://hs.test");
        assert_eq!(config.initial_sync_limit, 1);
        assert_eq!(config.poll_timeout, Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn config_builder_methods() {
        let config = ClientConfig::new("https://hs.test")
            .with_initial_sync_limit(20)
            .with_poll_timeout(Duration::from_secs(5))
            .with_shutdown_timeout(Duration::from_secs(3));
        assert_eq!(config.initial_sync_limit, 20);
        assert_eq!(config.poll_timeout, Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
    }

    #[test]
    fn create_room_params_map_to_request() {
        let request: CreateRoomRequest = CreateRoomParams::new()
            .with_alias("lobby")
            .invite("@bob:hs.test")
            .into();
        assert_eq!(request.room_alias_name.as_deref(), Some("lobby"));
        assert_eq!(request.visibility, Visibility::Private);
        assert_eq!(request.invite, vec!["@bob:hs.test".to_string()]);
    }

    #[tokio::test]
    async fn login_stores_session_and_syncs() {
        let (client, transport) = client();
        transport.push_login(Ok(login_response()));
        transport.push_initial_sync(Ok(lobby_sync("s1")));

        let token = client.login_with_password("alice", "pw").await.unwrap();

        assert_eq!(token, "tok123");
        assert_eq!(transport.token().as_deref(), Some("tok123"));
        assert_eq!(transport.sync_limits(), vec![1]);
        let session = client.session().await;
        assert_eq!(
            session,
            Session {
                homeserver: "https://hs.test".into(),
                access_token: Some("tok123".into()),
                user_id: Some("@alice:hs.test".into()),
                home_server: Some("hs.test".into()),
                cursor: Some("s1".into()),
            }
        );
        assert!(client.is_authenticated().await);
        let room = client.room("!abc").await.unwrap();
        assert_eq!(room.name().await.as_deref(), Some("Lobby"));
    }

    #[tokio::test]
    async fn failed_login_leaves_client_unauthenticated() {
        let (client, transport) = client();
        transport.push_login(Err(MatrixError::request(403, Some("M_FORBIDDEN"), "bad password")));

        let err = client.login_with_password("alice", "wrong").await.unwrap_err();

        assert!(err.is_forbidden());
        assert!(!client.is_authenticated().await);
        assert!(transport.token().is_none());
        assert!(transport.sync_limits().is_empty());
    }

    #[tokio::test]
    async fn register_uses_same_flow() {
        let (client, transport) = client();
        transport.push_login(Ok(login_response()));
        transport.push_initial_sync(Ok(lobby_sync("s9")));

        client.register_with_password("alice", "pw").await.unwrap();

        assert_eq!(client.user_id().await.as_deref(), Some("@alice:hs.test"));
        assert_eq!(client.session().await.cursor.as_deref(), Some("s9"));
    }

    #[tokio::test]
    async fn join_room_falls_back_to_argument() {
        let (client, transport) = client();
        transport.push_join(Ok(JoinRoomResponse {
            room_id: Some("!resolved:hs.test".into()),
        }));
        transport.push_join(Ok(JoinRoomResponse::default()));

        let resolved = client.join_room("#alias:hs.test").await.unwrap();
        let direct = client.join_room("!direct:hs.test").await.unwrap();

        assert_eq!(resolved.room_id(), "!resolved:hs.test");
        assert_eq!(direct.room_id(), "!direct:hs.test");
        assert_eq!(client.rooms().await.len(), 2);
    }

    #[tokio::test]
    async fn create_room_tracks_room() {
        let (client, transport) = client();
        transport.push_create(Ok(CreateRoomResponse {
            room_id: "!new:hs.test".into(),
            room_alias: None,
        }));

        let room = client.create_room(CreateRoomParams::new()).await.unwrap();

        assert!(Arc::ptr_eq(&room, &client.room("!new:hs.test").await.unwrap()));
    }

    #[tokio::test]
    async fn leave_room_untracks_room() {
        let (client, transport) = client();
        transport.push_join(Ok(JoinRoomResponse::default()));
        transport.push_membership(Ok(()));
        client.join_room("!r:hs.test").await.unwrap();

        assert!(client.leave_room("!r:hs.test").await.is_success());
        assert!(client.room("!r:hs.test").await.is_none());
    }

    #[tokio::test]
    async fn background_poller_delivers_events_and_stops() {
        let (client, transport) = client();
        transport.push_login(Ok(login_response()));
        transport.push_initial_sync(Ok(lobby_sync("s1")));
        client.login_with_password("alice", "pw").await.unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
        client
            .add_listener(move |event| {
                let _ = tx.send(event.clone());
                Ok(())
            })
            .await;
        transport.push_stream(Ok(stream(
            "s2",
            vec![Event::new("m.room.message", json!({ "body": "hi" })).in_room("!abc")],
        )));

        let mut poller = client.start_listener(TIMEOUT);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.content["body"], "hi");

        poller.stop().await.unwrap();
        assert!(poller.is_finished());
        assert_eq!(client.session().await.cursor.as_deref(), Some("s2"));
        // Stopping twice is harmless.
        poller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn background_poller_exposes_terminal_error() {
        let (client, transport) = client();
        transport.push_initial_sync(Ok(lobby_sync("s1")));
        client.sync(1).await.unwrap();
        transport.push_stream(Err(MatrixError::request(
            401,
            Some("M_UNKNOWN_TOKEN"),
            "expired",
        )));

        let mut poller = client.start_listener(TIMEOUT);
        let err = poller.join().await.unwrap_err();

        assert_eq!(err.error_code(), Some(crate::ErrorCode::UnknownToken));
        assert!(poller.is_finished());
    }

    #[tokio::test]
    async fn poller_before_sync_fails_with_not_synced() {
        let (client, _transport) = client();
        let mut poller = client.start_listener(TIMEOUT);
        assert!(matches!(poller.join().await, Err(MatrixError::NotSynced)));
    }

    #[tokio::test]
    async fn cancelled_join_leaves_poller_stoppable() {
        let (client, transport) = client();
        transport.push_initial_sync(Ok(lobby_sync("s1")));
        client.sync(1).await.unwrap();

        let mut poller = client.start_listener(TIMEOUT);
        let joined = tokio::time::timeout(Duration::from_millis(20), poller.join()).await;
        assert!(joined.is_err());
        assert!(!poller.is_finished());

        poller.stop().await.unwrap();
        assert!(poller.is_finished());
    }

    #[tokio::test]
    async fn dropping_handle_aborts_poller() {
        let (client, transport) = client();
        transport.push_initial_sync(Ok(lobby_sync("s1")));
        client.sync(1).await.unwrap();

        let poller = client.start_listener(TIMEOUT);
        while transport.stream_froms().is_empty() {
            tokio::task::yield_now().await;
        }
        drop(poller);

        // The cursor lock is released once the aborted task is gone, so a
        // manual poll can proceed.
        transport.push_stream(Ok(stream("s2", vec![])));
        tokio::time::timeout(Duration::from_secs(1), client.listen_for_events(TIMEOUT))
            .await
            .expect("poll should not block on the aborted poller")
            .unwrap();
        assert_eq!(client.session().await.cursor.as_deref(), Some("s2"));
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (client, _transport) = client();
        let debug_str = format!("{client:?}");
        assert!(debug_str.contains("MatrixClient"));
        assert!(debug_str.contains("hs.test"));
    }
}
