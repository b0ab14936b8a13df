//! Datagram main loop driver.
//!
//! The main loop exclusively owns the socket and the pending-transaction
//! table. Outgoing requests arrive from [`TxSocket`] handles, are stamped with
//! a fresh id and sent to the fixed remote endpoint. Incoming datagrams are
//! matched to pending records by id alone; arrival order is irrelevant.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::protocol::Protocol;
use crate::socket::{MainLoopEvent, TxSocket};
use crate::{Error, Result};

/// Largest payload a single datagram can carry.
const MAX_DATAGRAM: usize = 64 * 1024;

/// Lower bound on the orphan sweep period.
const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(10);

/// A request awaiting its response.
struct Pending<R> {
	tx: oneshot::Sender<Result<R>>,
	sent_at: Instant,
}

/// Transaction multiplexer main loop.
pub struct MainLoop<P: Protocol> {
	/// Wire format binding.
	protocol: P,
	/// Generator for outgoing request ids.
	id_gen: P::IdGen,
	/// Receiver for transactions issued through sockets.
	rx: mpsc::UnboundedReceiver<MainLoopEvent<P>>,
	/// Pending outgoing requests awaiting responses.
	pending: HashMap<P::Id, Pending<P::Response>>,
	/// Age after which an unanswered record is reclaimed.
	orphan_ttl: Option<Duration>,
}

impl<P: Protocol> MainLoop<P> {
	/// Creates a main loop and the first handle connected to it.
	#[must_use]
	pub fn new(protocol: P, id_gen: P::IdGen) -> (Self, TxSocket<P>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let this = Self {
			protocol,
			id_gen,
			rx,
			pending: HashMap::new(),
			orphan_ttl: None,
		};
		(this, TxSocket { tx })
	}

	/// Enables the orphan sweep: records older than `ttl` are removed and
	/// their callers observe [`Error::Orphaned`].
	#[must_use]
	pub fn with_orphan_ttl(mut self, ttl: Option<Duration>) -> Self {
		self.orphan_ttl = ttl.filter(|ttl| !ttl.is_zero());
		self
	}

	/// Drives the loop until `shutdown` fires or every [`TxSocket`] is dropped.
	///
	/// The socket is closed when this returns; transactions still pending
	/// observe [`Error::ServiceStopped`].
	///
	/// # Errors
	///
	/// Currently always returns `Ok(())`: socket receive errors and malformed
	/// datagrams are logged and discarded rather than ending the loop.
	pub async fn run(mut self, socket: UdpSocket, remote: SocketAddr, shutdown: CancellationToken) -> Result<()> {
		let mut buf = vec![0u8; MAX_DATAGRAM];
		let mut sweep = self.orphan_ttl.map(|ttl| {
			let mut interval = tokio::time::interval((ttl / 2).max(MIN_SWEEP_PERIOD));
			interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
			interval
		});

		loop {
			tokio::select! {
				biased;

				_ = shutdown.cancelled() => break,

				event = self.rx.recv() => match event {
					Some(event) => self.dispatch_event(event, &socket, remote).await,
					None => break,
				},

				recv = socket.recv_from(&mut buf) => match recv {
					Ok((len, from)) => self.dispatch_datagram(&buf[..len], from),
					Err(e) => debug!(error = %e, "rpc.socket.recv_error"),
				},

				_ = next_sweep(&mut sweep) => self.sweep_orphans(Instant::now()),
			}
		}

		debug!(pending = self.pending.len(), "rpc.mainloop.stopped");
		Ok(())
	}

	/// Assigns an id to an outgoing request and sends it.
	async fn dispatch_event(&mut self, event: MainLoopEvent<P>, socket: &UdpSocket, remote: SocketAddr) {
		match event {
			MainLoopEvent::Transact(mut req, resp_tx) => {
				let id = P::next_id(&mut self.id_gen);
				P::set_request_id(&mut req, id.clone());

				let payload = match self.protocol.encode_request(&req) {
					Ok(payload) => payload,
					Err(e) => {
						let _: Result<_, _> = resp_tx.send(Err(Error::Encode(e.to_string())));
						return;
					}
				};

				if let Err(e) = socket.send_to(&payload, remote).await {
					debug!(%id, error = %e, "rpc.socket.send_error");
					let _: Result<_, _> = resp_tx.send(Err(Error::Io(e)));
					return;
				}

				trace!(%id, len = payload.len(), "rpc.tx.sent");
				let previous = self.pending.insert(
					id,
					Pending {
						tx: resp_tx,
						sent_at: Instant::now(),
					},
				);
				debug_assert!(previous.is_none(), "transaction id reused while pending");
			}
		}
	}

	/// Routes an incoming datagram to the pending record bearing its id.
	fn dispatch_datagram(&mut self, datagram: &[u8], from: SocketAddr) {
		let resp = match self.protocol.decode_response(datagram) {
			Ok(resp) => resp,
			Err(e) => {
				trace!(%from, len = datagram.len(), error = %e, "rpc.datagram.malformed");
				return;
			}
		};

		let id = P::response_id(&resp);
		let Some(pending) = self.pending.remove(&id) else {
			trace!(%from, %id, "rpc.datagram.unmatched");
			return;
		};

		let result = P::into_result(resp).map_err(Error::Remote);
		// The caller may have given up already.
		let _: Result<_, _> = pending.tx.send(result);
	}

	/// Removes records whose caller went away or which outlived the TTL.
	fn sweep_orphans(&mut self, now: Instant) {
		let Some(ttl) = self.orphan_ttl else {
			return;
		};

		let expired: Vec<P::Id> = self
			.pending
			.iter()
			.filter(|(_, p)| p.tx.is_closed() || now.saturating_duration_since(p.sent_at) >= ttl)
			.map(|(id, _)| id.clone())
			.collect();

		for id in expired {
			if let Some(pending) = self.pending.remove(&id) {
				trace!(%id, "rpc.tx.orphaned");
				let _: Result<_, _> = pending.tx.send(Err(Error::Orphaned(id.to_string())));
			}
		}
	}
}

async fn next_sweep(sweep: &mut Option<Interval>) {
	match sweep {
		Some(interval) => {
			interval.tick().await;
		}
		None => std::future::pending().await,
	}
}

#[cfg(test)]
mod tests;
