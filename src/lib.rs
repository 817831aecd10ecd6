//! # Matrix Sync Client
//!
//! Async Rust client for the session side of the Matrix client-server API.
//!
//! This crate authenticates against a homeserver, mirrors the rooms the user
//! belongs to, keeps that mirror current through long-poll incremental sync,
//! and dispatches incoming events to registered listeners.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement the [`Transport`] trait for any backend
//! - **HTTP built-in**: the default `transport-http` feature provides [`HttpTransport`]
//! - **Room projection**: each [`Room`] derives its name, topic and aliases from state events
//! - **Listeners**: global and per-room callbacks, invoked in arrival order
//! - **Background polling**: [`MatrixClient::start_listener`] with explicit cancellation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use matrix_sync_client::{ClientConfig, HttpTransport, HttpTransportConfig, MatrixClient};
//!
//! let transport = HttpTransport::new(HttpTransportConfig::new("https://matrix.org"))?;
//! let client = MatrixClient::new(transport, ClientConfig::new("https://matrix.org"));
//! client.login_with_password("alice", "secret").await?;
//!
//! for (room_id, room) in client.rooms().await {
//!     println!("{room_id}: {:?}", room.name().await);
//! }
//!
//! client.add_listener(|event| {
//!     println!("{:?} in {:?}", event.kind(), event.room_id);
//!     Ok(())
//! }).await;
//!
//! let mut poller = client.start_listener(client.config().poll_timeout);
//! tokio::signal::ctrl_c().await?;
//! poller.stop().await?;
//! ```

pub mod client;
pub mod error;
pub mod error_codes;
pub mod listener;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod sync;
pub mod transport;
pub mod transports;

#[cfg(test)]
mod test_support;

// Re-export primary types for ergonomic imports.
pub use client::{ClientConfig, CreateRoomParams, ListenerHandle, MatrixClient, Session};
pub use error::{ListenerError, MatrixError};
pub use error_codes::ErrorCode;
pub use listener::ListenerId;
pub use protocol::{Event, RoomId, UserId};
pub use registry::RoomRegistry;
pub use room::{MediaInfo, MembershipOutcome, RefreshOutcome, Room, RoomState};
pub use sync::{SyncEngine, SyncSummary};
pub use transport::Transport;

#[cfg(feature = "transport-http")]
pub use transports::{HttpTransport, HttpTransportConfig};
