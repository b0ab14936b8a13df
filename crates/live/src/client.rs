//! Typed query client over the transaction multiplexer.

use std::future::Future;
use std::time::Duration;

use alv_proto::{InfoResponse, LiveProtocol, Request, StateResponse, Tag, TickResponse};
use alv_rpc::{CounterIdGen, MainLoop, TxSocket};
use serde::de::DeserializeOwned;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::LiveConfig;
use crate::error::{Error, Result};

/// Cloneable client issuing `info`, `state` and `tick` queries.
#[derive(Debug, Clone)]
pub struct LiveClient {
	socket: TxSocket<LiveProtocol>,
	timeout: Option<Duration>,
}

impl LiveClient {
	/// Wraps an existing multiplexer handle. Queries have no deadline.
	pub fn new(socket: TxSocket<LiveProtocol>) -> Self {
		Self { socket, timeout: None }
	}

	/// Binds the datagram socket and spawns the multiplexer main loop.
	///
	/// The loop stops, closing the socket, when `shutdown` fires or every
	/// client clone is dropped. Queries get `config.query_timeout_ms` as
	/// their deadline.
	///
	/// # Errors
	///
	/// Returns [`Error::Io`] if the socket cannot be bound.
	pub async fn connect(
		config: &LiveConfig,
		shutdown: CancellationToken,
	) -> Result<(Self, JoinHandle<alv_rpc::Result<()>>)> {
		let socket = UdpSocket::bind(config.bind).await?;
		debug!(local = ?socket.local_addr().ok(), remote = %config.remote, "live.client.bind");

		let (main_loop, tx) = MainLoop::new(LiveProtocol::new(), CounterIdGen::new());
		let main_loop = main_loop.with_orphan_ttl(config.orphan_ttl());
		let handle = tokio::spawn(main_loop.run(socket, config.remote, shutdown));

		let client = Self::new(tx).with_timeout(Some(config.query_timeout_duration()));
		Ok((client, handle))
	}

	/// Sets the per-query deadline; `None` waits indefinitely.
	#[must_use]
	pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.timeout = timeout.filter(|t| !t.is_zero());
		self
	}

	/// Returns true once the multiplexer has stopped.
	pub fn is_closed(&self) -> bool {
		self.socket.is_closed()
	}

	async fn deadline<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
		match self.timeout {
			Some(timeout) => tokio::time::timeout(timeout, fut).await.map_err(|_| Error::TimedOut)?,
			None => fut.await,
		}
	}

	async fn query<T: DeserializeOwned>(&self, req: Request) -> Result<T> {
		self.deadline(async {
			let resp = self.socket.send_tx(req).await?;
			Ok::<T, Error>(resp.parse()?)
		})
		.await
	}

	/// Current value and visualization descriptor for `tag`.
	///
	/// # Errors
	///
	/// Fails on remote errors, transport failures, timeouts, or a reply of
	/// the wrong shape.
	pub async fn info(&self, tag: Tag) -> Result<InfoResponse> {
		self.query(Request::info(tag)).await
	}

	/// Legacy value/state query for `tag`.
	///
	/// # Errors
	///
	/// Same as [`LiveClient::info`].
	pub async fn state(&self, tag: Tag) -> Result<StateResponse> {
		self.query(Request::state(tag)).await
	}

	/// The remote's global tick counter.
	///
	/// # Errors
	///
	/// Same as [`LiveClient::info`].
	pub async fn tick(&self) -> Result<u64> {
		let reply: TickResponse = self.query(Request::tick()).await?;
		Ok(reply.tick)
	}
}
