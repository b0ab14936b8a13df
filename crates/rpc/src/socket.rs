//! Handle for issuing transactions to the main loop.

use tokio::sync::{mpsc, oneshot};

use crate::protocol::Protocol;
use crate::{Error, Result};

/// Internal event routed to the main loop.
pub enum MainLoopEvent<P: Protocol> {
	/// Assign an id, send the request, and settle the sender when the matching response arrives.
	Transact(P::Request, oneshot::Sender<Result<P::Response>>),
}

/// Cloneable handle to a running [`MainLoop`](crate::MainLoop).
///
/// The main loop keeps running while at least one handle is alive.
pub struct TxSocket<P: Protocol> {
	pub(crate) tx: mpsc::UnboundedSender<MainLoopEvent<P>>,
}

impl<P: Protocol> Clone for TxSocket<P> {
	fn clone(&self) -> Self {
		Self { tx: self.tx.clone() }
	}
}

impl<P: Protocol> std::fmt::Debug for TxSocket<P> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TxSocket").field("closed", &self.is_closed()).finish()
	}
}

impl<P: Protocol> TxSocket<P> {
	/// Creates a handle that is not connected to any main loop.
	///
	/// Every transaction fails with [`Error::ServiceStopped`].
	#[must_use]
	pub fn new_closed() -> Self {
		let (tx, _) = mpsc::unbounded_channel();
		Self { tx }
	}

	/// Returns true once the main loop has stopped.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}

	/// Sends a request and waits for the response bearing the same id.
	///
	/// There is no deadline at this layer: if the response never arrives, the
	/// future stays pending until the orphan sweep reclaims the record or the
	/// main loop stops. Callers that need a bound wrap this in a timeout.
	///
	/// # Errors
	///
	/// - [`Error::Remote`] when the response carries an `error` field.
	/// - [`Error::ServiceStopped`] when the main loop is gone.
	/// - [`Error::Encode`] / [`Error::Io`] when the request could not be sent.
	/// - [`Error::Orphaned`] when the orphan sweep reclaimed the record.
	pub async fn send_tx(&self, req: P::Request) -> Result<P::Response> {
		let (resp_tx, resp_rx) = oneshot::channel();
		self.tx
			.send(MainLoopEvent::Transact(req, resp_tx))
			.map_err(|_| Error::ServiceStopped)?;
		resp_rx.await.map_err(|_| Error::ServiceStopped)?
	}
}
