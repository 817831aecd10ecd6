//! Error types for the Matrix sync client.

use thiserror::Error;

use crate::error_codes::ErrorCode;

/// Error type returned by event listeners.
///
/// A failing listener aborts the rest of the poll cycle it was invoked from and
/// surfaces to the caller as [`MatrixError::Listener`].
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when using the Matrix client.
#[derive(Debug, Error)]
pub enum MatrixError {
    /// The homeserver rejected a request.
    #[error("request failed with status {status}: {message}")]
    Request {
        /// HTTP status code of the response.
        status: u16,
        /// Protocol `errcode` (e.g. `M_FORBIDDEN`), if the body carried one.
        errcode: Option<String>,
        /// Human-readable `error` field from the body.
        message: String,
    },

    /// The homeserver no longer recognises the streaming cursor.
    ///
    /// The cursor is left untouched; run a fresh initial sync to obtain a new one.
    #[error("stream cursor {cursor:?} was rejected by the homeserver")]
    StaleCursor {
        /// The cursor that was rejected.
        cursor: String,
    },

    /// A registered listener failed while handling an event.
    #[error("listener failed: {0}")]
    Listener(#[source] ListenerError),

    /// Incremental sync was attempted before an initial sync produced a cursor.
    #[error("no stream cursor, run an initial sync first")]
    NotSynced,

    /// An operation that needs an access token was attempted without one.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The background poller was aborted or panicked before reporting a result.
    #[error("background poller aborted: {0}")]
    PollerAborted(String),

    /// The transport failed below the protocol layer (connect, TLS, body read).
    #[error("HTTP transport error: {0}")]
    Http(String),

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// The homeserver URL could not be parsed or extended.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl MatrixError {
    /// Build a [`MatrixError::Request`] from its parts.
    pub fn request(status: u16, errcode: Option<impl Into<String>>, message: impl Into<String>) -> Self {
        Self::Request {
            status,
            errcode: errcode.map(Into::into),
            message: message.into(),
        }
    }

    /// The structured error code, if this is a request error with a known `errcode`.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Request {
                errcode: Some(code),
                ..
            } => code.parse().ok(),
            _ => None,
        }
    }

    /// HTTP status of a request error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `true` if the homeserver refused the request for lack of permission.
    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403) || self.error_code() == Some(ErrorCode::Forbidden)
    }

    /// `true` if the error means the streaming cursor must be re-established.
    pub fn is_stale_cursor(&self) -> bool {
        matches!(self, Self::StaleCursor { .. }) || self.error_code() == Some(ErrorCode::UnknownPos)
    }
}

/// A specialized [`Result`] type for Matrix client operations.
pub type Result<T> = std::result::Result<T, MatrixError>;
