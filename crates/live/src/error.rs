//! Error types for the live engine.

use std::io;

use crate::config::ConfigError;
use crate::tree::SourceRange;

/// A convenient type alias for `Result` with `E` = [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The transaction layer failed or the remote rejected the query.
	#[error(transparent)]
	Rpc(#[from] alv_rpc::Error),
	/// The query did not settle within the caller's deadline.
	#[error("query timed out")]
	TimedOut,
	/// The remote answered with a reply of the wrong shape.
	#[error("unexpected response: {0}")]
	UnexpectedResponse(#[from] serde_json::Error),
	/// The document's structure is malformed.
	#[error(transparent)]
	Discovery(#[from] DiscoveryError),
	/// Configuration could not be loaded.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Input/output errors, e.g. binding the datagram socket.
	#[error("{0}")]
	Io(#[from] io::Error),
}

/// Structural errors found while walking cells.
///
/// Each aborts discovery of the offending cell's subtree only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
	/// A tag token whose inner text is not an integer.
	#[error("malformed tag literal {text:?} at {range}")]
	MalformedTag {
		/// Token text as written.
		text: String,
		/// Token location.
		range: SourceRange,
	},
	/// A cell with more than one child of a singular kind.
	#[error("more than one {kind} child in cell at {range}")]
	DuplicateChild {
		/// Child kind that repeats.
		kind: String,
		/// Location of the offending cell.
		range: SourceRange,
	},
}
