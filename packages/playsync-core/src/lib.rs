//! Playsync Core - shared library for the playback synchronization hub.
//!
//! This crate holds the authoritative, in-memory state for every active
//! room of browser clients and broadcasts the transitions needed for each
//! client to compute a shared logical playhead position.
//!
//! # Architecture
//!
//! - [`clock`]: wall-clock source for stamping state changes
//! - [`protocol`]: wire schema — inbound parsing and outbound frame types
//! - [`session`]: per-connection handle and outbound backpressure
//! - [`room`]: the playback state machine, one instance per room
//! - [`hub`]: the process-wide room registry
//! - [`broadcast`]: fan-out of a frame to a set of sessions
//! - [`dispatcher`]: routes parsed inbound frames to room operations
//! - [`api`]: HTTP/WebSocket transport layer
//! - [`error`]: centralized error types
//!
//! The registry lock ([`hub::Hub`]) and a room's own lock
//! ([`room::Room`]) are never held at the same time; see `hub`'s module
//! docs for how that's enforced without sacrificing a lock-free emptiness
//! check.

#![warn(clippy::all)]

pub mod api;
pub mod broadcast;
pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod room;
pub mod session;

pub use api::{start_server, AppState};
pub use clock::now_millis;
pub use error::{CodecError, ServerError};
pub use hub::Hub;
