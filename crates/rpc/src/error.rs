//! Error types for the transaction multiplexer.

use std::io;

/// A convenient type alias for `Result` with `E` = [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible transaction failures.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The main loop stopped before the transaction settled.
	#[error("service stopped")]
	ServiceStopped,
	/// The request could not be serialized.
	#[error("failed to encode request: {0}")]
	Encode(String),
	/// The remote answered with an `error` field.
	#[error("{0}")]
	Remote(String),
	/// The pending record outlived the orphan TTL and was reclaimed.
	#[error("transaction {0} reclaimed without a response")]
	Orphaned(String),
	/// Input/output errors from the underlying socket.
	#[error("{0}")]
	Io(#[from] io::Error),
}

impl Error {
	/// Returns true when the remote explicitly rejected the request.
	pub fn is_remote(&self) -> bool {
		matches!(self, Self::Remote(_))
	}
}
