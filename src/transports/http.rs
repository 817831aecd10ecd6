//! HTTP transport implementation using `reqwest`.
//!
//! [`HttpTransport`] speaks the v1 client API
//! (`/_matrix/client/api/v1/...`). The access token travels as the
//! `access_token` query parameter; path segments are percent-encoded.
//!
//! # Feature gate
//!
//! This module is only available when the `transport-http` feature is enabled
//! (it is enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), matrix_sync_client::MatrixError> {
//! use matrix_sync_client::{HttpTransport, HttpTransportConfig, Transport};
//!
//! let transport = HttpTransport::new(HttpTransportConfig::new("https://matrix.org"))?;
//! transport.set_access_token(Some("secret".into())).await;
//! let sync = transport.initial_sync(10).await?;
//! println!("resume from {:?}", sync.end);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{MatrixError, Result};
use crate::protocol::{
    CreateRoomRequest, CreateRoomResponse, ErrorBody, Event, EventStreamResponse,
    InitialSyncResponse, JoinRoomResponse, LoginRequest, LoginResponse, RoomNameContent,
    RoomTopicContent, SendEventResponse, ROOM_MEMBER, ROOM_NAME, ROOM_TOPIC,
};
use crate::transport::Transport;

/// Path of the v1 client API below the homeserver base URL.
const API_PREFIX: [&str; 4] = ["_matrix", "client", "api", "v1"];

/// Default timeout for ordinary requests.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time granted to a long-poll on top of its server-side timeout.
const LONG_POLL_GRACE: Duration = Duration::from_secs(10);

/// Maximum error body kept in a [`MatrixError::Request`] message.
const MAX_ERROR_BODY_SIZE: usize = 1000;

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for an [`HttpTransport`].
///
/// # Example
///
/// ```
/// use matrix_sync_client::HttpTransportConfig;
/// use std::time::Duration;
///
/// let config = HttpTransportConfig::new("https://matrix.example.org")
///     .with_request_timeout(Duration::from_secs(10))
///     .with_certificate_validation(false);
/// assert!(!config.validate_certificates);
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Homeserver base URL, e.g. `https://matrix.org`.
    pub base_url: String,
    /// Timeout for every request except the event stream long-poll.
    ///
    /// Defaults to **30 seconds**.
    pub request_timeout: Duration,
    /// Whether TLS certificates are validated. Defaults to `true`.
    pub validate_certificates: bool,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl HttpTransportConfig {
    /// Create a configuration for the given base URL with default values.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            validate_certificates: true,
            user_agent: concat!("matrix-sync-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable TLS certificate validation.
    ///
    /// Only disable this against test homeservers with self-signed certificates.
    #[must_use]
    pub fn with_certificate_validation(mut self, validate: bool) -> Self {
        self.validate_certificates = validate;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

// ── Transport ───────────────────────────────────────────────────────

/// A [`Transport`] implementation backed by `reqwest`.
///
/// # Cancel Safety
///
/// Every method is a single HTTP request with no local state beyond the
/// access token, so dropping an in-flight future (including the long-poll in
/// [`event_stream`](Transport::event_stream)) loses nothing.
pub struct HttpTransport {
    http_client: Client,
    base_url: Url,
    access_token: RwLock<Option<String>>,
}

impl HttpTransport {
    /// Build a transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::InvalidUrl`] if the base URL cannot be parsed or
    /// cannot carry a path, and [`MatrixError::Http`] if the HTTP client
    /// cannot be built.
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| MatrixError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(MatrixError::InvalidUrl(config.base_url));
        }

        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent)
            .danger_accept_invalid_certs(!config.validate_certificates)
            .build()
            .map_err(|e| MatrixError::Http(e.to_string()))?;

        debug!(base_url = %base_url, "HTTP transport ready");
        Ok(Self {
            http_client,
            base_url,
            access_token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `{base}/_matrix/client/api/v1/{segments...}`, encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| MatrixError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    async fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        debug!(%method, path = url.path(), "sending request");
        let mut builder = self.http_client.request(method, url);
        if let Some(token) = self.access_token.read().await.as_deref() {
            builder = builder.query(&[("access_token", token)]);
        }
        Ok(builder)
    }

    /// Send a request and decode a successful JSON body.
    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = request_error(status.as_u16(), &body);
            warn!(status = status.as_u16(), "homeserver rejected request: {error}");
            return Err(error);
        }

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Send a request whose successful body carries nothing of interest.
    async fn execute_unit(&self, builder: RequestBuilder) -> Result<()> {
        self.execute::<IgnoredAny>(builder).await.map(|_| ())
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

fn map_reqwest_error(e: reqwest::Error) -> MatrixError {
    if e.is_timeout() {
        MatrixError::Timeout
    } else {
        MatrixError::Http(e.to_string())
    }
}

/// Turn a non-success response into [`MatrixError::Request`], reading the
/// standard `{ "errcode", "error" }` body when there is one.
fn request_error(status: u16, body: &str) -> MatrixError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { errcode, error }) if errcode.is_some() || error.is_some() => {
            MatrixError::request(status, errcode, error.unwrap_or_default())
        }
        _ => MatrixError::request(status, None::<String>, truncate_error_body(body)),
    }
}

/// Truncate an error body on a UTF-8 boundary.
fn truncate_error_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_SIZE {
        return body.to_string();
    }
    let cut = body
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|i| *i <= MAX_ERROR_BODY_SIZE)
        .last()
        .unwrap_or(0);
    let head = body.get(..cut).unwrap_or_default();
    format!("{head}... (truncated)")
}

#[async_trait]
impl Transport for HttpTransport {
    async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        let builder = self.request(Method::POST, &["login"]).await?;
        self.execute(builder.json(&request)).await
    }

    async fn register(&self, request: LoginRequest) -> Result<LoginResponse> {
        let builder = self.request(Method::POST, &["register"]).await?;
        self.execute(builder.json(&request)).await
    }

    async fn create_room(&self, request: CreateRoomRequest) -> Result<CreateRoomResponse> {
        let builder = self.request(Method::POST, &["createRoom"]).await?;
        self.execute(builder.json(&request)).await
    }

    async fn join_room(&self, room_id_or_alias: &str) -> Result<JoinRoomResponse> {
        let builder = self
            .request(Method::POST, &["join", room_id_or_alias])
            .await?;
        self.execute(builder.json(&json!({}))).await
    }

    async fn leave_room(&self, room_id: &str) -> Result<()> {
        let builder = self
            .request(Method::POST, &["rooms", room_id, "leave"])
            .await?;
        self.execute_unit(builder.json(&json!({}))).await
    }

    async fn invite_user(&self, room_id: &str, user_id: &str) -> Result<()> {
        let builder = self
            .request(Method::POST, &["rooms", room_id, "invite"])
            .await?;
        self.execute_unit(builder.json(&json!({ "user_id": user_id })))
            .await
    }

    async fn kick_user(&self, room_id: &str, user_id: &str, reason: Option<&str>) -> Result<()> {
        let mut body = json!({ "membership": "leave" });
        if let (Some(reason), Some(map)) = (reason, body.as_object_mut()) {
            map.insert("reason".into(), Value::from(reason));
        }
        let builder = self
            .request(
                Method::PUT,
                &["rooms", room_id, "state", ROOM_MEMBER, user_id],
            )
            .await?;
        self.execute_unit(builder.json(&body)).await
    }

    async fn ban_user(&self, room_id: &str, user_id: &str, reason: &str) -> Result<()> {
        let builder = self.request(Method::POST, &["rooms", room_id, "ban"]).await?;
        self.execute_unit(builder.json(&json!({ "user_id": user_id, "reason": reason })))
            .await
    }

    async fn send_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: Value,
        txn_id: &str,
    ) -> Result<SendEventResponse> {
        let builder = self
            .request(
                Method::PUT,
                &["rooms", room_id, "send", event_type, txn_id],
            )
            .await?;
        self.execute(builder.json(&content)).await
    }

    async fn initial_sync(&self, limit: u32) -> Result<InitialSyncResponse> {
        let builder = self.request(Method::GET, &["initialSync"]).await?;
        self.execute(builder.query(&[("limit", limit)])).await
    }

    async fn event_stream(&self, from: &str, timeout: Duration) -> Result<EventStreamResponse> {
        let timeout_ms = timeout.as_millis().to_string();
        let builder = self.request(Method::GET, &["events"]).await?;
        self.execute(
            builder
                .query(&[("from", from), ("timeout", timeout_ms.as_str())])
                .timeout(timeout.saturating_add(LONG_POLL_GRACE)),
        )
        .await
    }

    async fn room_name(&self, room_id: &str) -> Result<RoomNameContent> {
        let builder = self
            .request(Method::GET, &["rooms", room_id, "state", ROOM_NAME])
            .await?;
        self.execute(builder).await
    }

    async fn room_topic(&self, room_id: &str) -> Result<RoomTopicContent> {
        let builder = self
            .request(Method::GET, &["rooms", room_id, "state", ROOM_TOPIC])
            .await?;
        self.execute(builder).await
    }

    async fn room_state(&self, room_id: &str) -> Result<Vec<Event>> {
        let builder = self
            .request(Method::GET, &["rooms", room_id, "state"])
            .await?;
        self.execute(builder).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(HttpTransportConfig::new(base)).unwrap()
    }

    #[test]
    fn config_defaults() {
        let config = HttpTransportConfig::new("https://hs.test");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.validate_certificates);
        assert!(config.user_agent.starts_with("matrix-sync-client/"));
    }

    #[test]
    fn endpoint_prefixes_api_path() {
        let t = transport("https://hs.test");
        let url = t.endpoint(&["initialSync"]).unwrap();
        assert_eq!(url.as_str(), "https://hs.test/_matrix/client/api/v1/initialSync");
    }

    #[test]
    fn endpoint_keeps_base_path_and_trailing_slash() {
        let t = transport("https://hs.test/proxy/");
        let url = t.endpoint(&["events"]).unwrap();
        assert_eq!(url.path(), "/proxy/_matrix/client/api/v1/events");
    }

    #[test]
    fn endpoint_encodes_segments() {
        let t = transport("https://hs.test");
        let url = t.endpoint(&["join", "#lobby:hs.test"]).unwrap();
        assert_eq!(url.path(), "/_matrix/client/api/v1/join/%23lobby:hs.test");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = HttpTransport::new(HttpTransportConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, MatrixError::InvalidUrl(_)));

        let err = HttpTransport::new(HttpTransportConfig::new("mailto:alice@hs.test")).unwrap_err();
        assert!(matches!(err, MatrixError::InvalidUrl(_)));
    }

    #[test]
    fn request_error_reads_standard_body() {
        let err = request_error(403, r#"{"errcode":"M_FORBIDDEN","error":"no"}"#);
        assert!(err.is_forbidden());
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("no"));
    }

    #[test]
    fn request_error_falls_back_to_raw_body() {
        let err = request_error(502, "Bad Gateway");
        match err {
            MatrixError::Request {
                status,
                errcode,
                message,
            } => {
                assert_eq!(status, 502);
                assert!(errcode.is_none());
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let body = "é".repeat(MAX_ERROR_BODY_SIZE);
        let truncated = truncate_error_body(&body);
        assert!(truncated.ends_with("... (truncated)"));
        assert!(truncated.len() < body.len());
    }
}
