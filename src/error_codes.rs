//! Error codes for structured error handling in the Matrix client-server API.
//!
//! Homeservers report failures as `{ "errcode": "M_FORBIDDEN", "error": "..." }`.
//! [`ErrorCode`] covers the codes this client reacts to; anything else is kept
//! as the raw string on [`MatrixError::Request`](crate::MatrixError::Request).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Structured `errcode` values returned by a Matrix homeserver.
///
/// Each variant corresponds to a specific error condition. The server sends these
/// as `"M_SCREAMING_SNAKE_CASE"` strings (e.g., `"M_FORBIDDEN"`).
///
/// Use [`description()`](ErrorCode::description) for a human-readable explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // Authentication errors
    #[serde(rename = "M_FORBIDDEN")]
    Forbidden,
    #[serde(rename = "M_UNKNOWN_TOKEN")]
    UnknownToken,
    #[serde(rename = "M_MISSING_TOKEN")]
    MissingToken,
    #[serde(rename = "M_UNAUTHORIZED")]
    Unauthorized,
    #[serde(rename = "M_USER_DEACTIVATED")]
    UserDeactivated,

    // Request errors
    #[serde(rename = "M_BAD_JSON")]
    BadJson,
    #[serde(rename = "M_NOT_JSON")]
    NotJson,
    #[serde(rename = "M_MISSING_PARAM")]
    MissingParam,
    #[serde(rename = "M_INVALID_PARAM")]
    InvalidParam,
    #[serde(rename = "M_TOO_LARGE")]
    TooLarge,
    #[serde(rename = "M_UNRECOGNIZED")]
    Unrecognized,

    // Registration errors
    #[serde(rename = "M_USER_IN_USE")]
    UserInUse,
    #[serde(rename = "M_INVALID_USERNAME")]
    InvalidUsername,
    #[serde(rename = "M_EXCLUSIVE")]
    Exclusive,

    // Room errors
    #[serde(rename = "M_NOT_FOUND")]
    NotFound,
    #[serde(rename = "M_ROOM_IN_USE")]
    RoomInUse,
    #[serde(rename = "M_INVALID_ROOM_STATE")]
    InvalidRoomState,
    #[serde(rename = "M_GUEST_ACCESS_FORBIDDEN")]
    GuestAccessForbidden,

    // Event stream errors
    #[serde(rename = "M_UNKNOWN_POS")]
    UnknownPos,

    // Rate limiting
    #[serde(rename = "M_LIMIT_EXCEEDED")]
    LimitExceeded,

    // Server errors
    #[serde(rename = "M_UNKNOWN")]
    Unknown,
}

impl ErrorCode {
    /// Every known code, in declaration order.
    pub const ALL: &'static [ErrorCode] = &[
        Self::Forbidden,
        Self::UnknownToken,
        Self::MissingToken,
        Self::Unauthorized,
        Self::UserDeactivated,
        Self::BadJson,
        Self::NotJson,
        Self::MissingParam,
        Self::InvalidParam,
        Self::TooLarge,
        Self::Unrecognized,
        Self::UserInUse,
        Self::InvalidUsername,
        Self::Exclusive,
        Self::NotFound,
        Self::RoomInUse,
        Self::InvalidRoomState,
        Self::GuestAccessForbidden,
        Self::UnknownPos,
        Self::LimitExceeded,
        Self::Unknown,
    ];

    /// The wire representation, e.g. `"M_FORBIDDEN"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forbidden => "M_FORBIDDEN",
            Self::UnknownToken => "M_UNKNOWN_TOKEN",
            Self::MissingToken => "M_MISSING_TOKEN",
            Self::Unauthorized => "M_UNAUTHORIZED",
            Self::UserDeactivated => "M_USER_DEACTIVATED",
            Self::BadJson => "M_BAD_JSON",
            Self::NotJson => "M_NOT_JSON",
            Self::MissingParam => "M_MISSING_PARAM",
            Self::InvalidParam => "M_INVALID_PARAM",
            Self::TooLarge => "M_TOO_LARGE",
            Self::Unrecognized => "M_UNRECOGNIZED",
            Self::UserInUse => "M_USER_IN_USE",
            Self::InvalidUsername => "M_INVALID_USERNAME",
            Self::Exclusive => "M_EXCLUSIVE",
            Self::NotFound => "M_NOT_FOUND",
            Self::RoomInUse => "M_ROOM_IN_USE",
            Self::InvalidRoomState => "M_INVALID_ROOM_STATE",
            Self::GuestAccessForbidden => "M_GUEST_ACCESS_FORBIDDEN",
            Self::UnknownPos => "M_UNKNOWN_POS",
            Self::LimitExceeded => "M_LIMIT_EXCEEDED",
            Self::Unknown => "M_UNKNOWN",
        }
    }

    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            // Authentication errors
            Self::Forbidden => {
                "Forbidden access. The account lacks permission or the credentials are wrong."
            }
            Self::UnknownToken => {
                "The access token is not recognized by the homeserver. Log in again."
            }
            Self::MissingToken => "No access token was supplied with a request that needs one.",
            Self::Unauthorized => "The request was not correctly authorized.",
            Self::UserDeactivated => "The account has been deactivated.",

            // Request errors
            Self::BadJson => "The request body was valid JSON but did not match the expected shape.",
            Self::NotJson => "The request body was not valid JSON.",
            Self::MissingParam => "A required request parameter was not supplied.",
            Self::InvalidParam => "A request parameter had an invalid value.",
            Self::TooLarge => "The request or entity was too large.",
            Self::Unrecognized => "The homeserver does not recognise this request.",

            // Registration errors
            Self::UserInUse => "The desired user ID is already taken.",
            Self::InvalidUsername => "The desired user ID is not a valid user name.",
            Self::Exclusive => "The resource is reserved by an application service.",

            // Room errors
            Self::NotFound => "No resource was found for this request.",
            Self::RoomInUse => "The room alias is already in use.",
            Self::InvalidRoomState => "The initial room state is invalid.",
            Self::GuestAccessForbidden => "The room does not allow guest access.",

            // Event stream errors
            Self::UnknownPos => {
                "The stream token is no longer known to the homeserver. Run a full sync to obtain a new one."
            }

            // Rate limiting
            Self::LimitExceeded => "Too many requests in a short time. Slow down and retry later.",

            // Server errors
            Self::Unknown => "An unknown error occurred on the homeserver.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl FromStr for ErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or(())
    }
}
