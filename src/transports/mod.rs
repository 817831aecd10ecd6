//! Transport implementations for the Matrix client-server API.
//!
//! This module provides concrete [`Transport`](crate::Transport) implementations
//! behind feature gates. Enable the corresponding Cargo feature to pull in
//! a transport:
//!
//! | Feature          | Transport         |
//! |------------------|-------------------|
//! | `transport-http` | [`HttpTransport`] |

#[cfg(feature = "transport-http")]
pub mod http;

#[cfg(feature = "transport-http")]
pub use http::{HttpTransport, HttpTransportConfig};
