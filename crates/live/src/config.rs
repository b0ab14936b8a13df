//! Configuration for a live view.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Errors raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// The file could not be read.
	#[error("failed to read {path}: {source}")]
	Read {
		/// File that failed.
		path: PathBuf,
		/// Underlying error.
		source: std::io::Error,
	},
	/// The file is not valid TOML for [`LiveConfig`].
	#[error("invalid configuration: {0}")]
	Parse(#[from] toml::de::Error),
}

/// Tunables for the transaction layer, polling loop, and rendering.
///
/// Every field has a default; a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LiveConfig {
	/// Fixed endpoint of the remote execution engine.
	pub remote: SocketAddr,
	/// Local address the datagram socket binds to.
	pub bind: SocketAddr,
	/// Pause between the end of one poll cycle and the start of the next.
	pub poll_interval_ms: u64,
	/// Deadline for each query the view issues.
	pub query_timeout_ms: u64,
	/// How long an event annotation stays active.
	pub flash_ms: u64,
	/// Age after which unanswered transactions are reclaimed; 0 disables the sweep.
	pub orphan_ttl_ms: u64,
	/// Head operator names that mark a stepped/switch construct.
	pub branch_heads: Vec<String>,
}

impl Default for LiveConfig {
	fn default() -> Self {
		Self {
			remote: SocketAddr::from((Ipv4Addr::LOCALHOST, alv_proto::DEFAULT_PORT)),
			bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
			poll_interval_ms: 50,
			query_timeout_ms: 1000,
			flash_ms: 200,
			orphan_ttl_ms: 10_000,
			branch_heads: vec!["switch".to_string(), "step".to_string()],
		}
	}
}

impl LiveConfig {
	/// Parses a configuration from TOML text.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(text)?)
	}

	/// Reads and parses a configuration file.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::Read`] if the file cannot be read and
	/// [`ConfigError::Parse`] if its contents are invalid.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_toml_str(&text)
	}

	/// Set the remote endpoint.
	pub fn remote(mut self, remote: SocketAddr) -> Self {
		self.remote = remote;
		self
	}

	/// Set the local bind address.
	pub fn bind(mut self, bind: SocketAddr) -> Self {
		self.bind = bind;
		self
	}

	/// Set the poll interval.
	pub fn poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval_ms = millis(interval);
		self
	}

	/// Set the per-query deadline.
	pub fn query_timeout(mut self, timeout: Duration) -> Self {
		self.query_timeout_ms = millis(timeout);
		self
	}

	/// Pause between poll cycles.
	pub fn poll_interval_duration(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	/// Per-query deadline.
	pub fn query_timeout_duration(&self) -> Duration {
		Duration::from_millis(self.query_timeout_ms)
	}

	/// Event flash length.
	pub fn flash_duration(&self) -> Duration {
		Duration::from_millis(self.flash_ms)
	}

	/// Orphan TTL, or `None` when the sweep is disabled.
	pub fn orphan_ttl(&self) -> Option<Duration> {
		(self.orphan_ttl_ms > 0).then(|| Duration::from_millis(self.orphan_ttl_ms))
	}
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
