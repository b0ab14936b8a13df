//! Shared wire types for the live-view remote.
//!
//! Every request is a single JSON object sent as one datagram to the remote's
//! well-known port. Each carries a unique `id` that the remote echoes back in
//! its response; any response may instead be `{id, error}`.

#![warn(missing_docs)]

pub mod protocol;
pub mod types;

pub use protocol::LiveProtocol;
pub use types::*;

/// Port the remote execution engine listens on.
pub const DEFAULT_PORT: u16 = 37123;
