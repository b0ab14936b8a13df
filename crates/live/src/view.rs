//! Live view handle owned by an editor session.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::LiveClient;
use crate::config::LiveConfig;
use crate::controller::{Command, Controller, ControllerParts, ViewState};
use crate::error::Result;
use crate::sink::{AnnotationSink, RegionId};
use crate::tree::SyntaxNode;

/// Notifications from the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEvent {
	/// Content was saved and has settled.
	Saved,
	/// Content was reloaded from disk.
	Reloaded,
	/// The document or its editor went away.
	Closed,
}

/// Host document a view is attached to.
pub trait LiveDocument: Send + 'static {
	/// Snapshot of the current structural tree.
	fn syntax_tree(&self) -> SyntaxNode;

	/// Subscribes to change notifications.
	///
	/// Dropping the sender side is treated like [`DocumentEvent::Closed`].
	fn subscribe(&mut self) -> mpsc::UnboundedReceiver<DocumentEvent>;
}

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a running live view.
///
/// Clones share the same view. Dropping every clone tears the view down.
#[derive(Debug, Clone)]
pub struct LiveView {
	id: u64,
	commands: mpsc::UnboundedSender<Command>,
	state: watch::Receiver<ViewState>,
}

impl LiveView {
	/// Binds the socket, starts the multiplexer and controller tasks, and
	/// kicks off the initial rebuild.
	///
	/// # Errors
	///
	/// Returns [`Error::Io`](crate::Error::Io) if the datagram socket cannot be bound.
	pub async fn spawn<D: LiveDocument>(mut document: D, sink: Arc<dyn AnnotationSink>, config: LiveConfig) -> Result<Self> {
		let shutdown = CancellationToken::new();
		let (client, mux) = LiveClient::connect(&config, shutdown.clone()).await?;

		let events = document.subscribe();
		let (commands_tx, commands_rx) = mpsc::unbounded_channel();
		let (state_tx, state_rx) = watch::channel(ViewState::Idle);

		let controller = Controller::new(ControllerParts {
			document: Box::new(document),
			sink,
			config,
			client,
			commands: commands_rx,
			events,
			state: state_tx,
			shutdown,
			mux,
		});
		tokio::spawn(controller.run());

		let id = NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed);
		debug!(view = id, "live.view.spawn");
		Ok(Self {
			id,
			commands: commands_tx,
			state: state_rx,
		})
	}

	/// Process-unique id of this view.
	pub fn id(&self) -> u64 {
		self.id
	}

	/// Current lifecycle state.
	pub fn state(&self) -> ViewState {
		*self.state.borrow()
	}

	/// Receiver observing every state transition.
	pub fn subscribe_state(&self) -> watch::Receiver<ViewState> {
		self.state.clone()
	}

	/// Returns true once the view is torn down.
	pub fn is_destroyed(&self) -> bool {
		self.state() == ViewState::Destroyed || self.commands.is_closed()
	}

	fn send(&self, command: Command) {
		// Commands to a destroyed view are dropped.
		let _: Result<_, _> = self.commands.send(command);
	}

	/// Rebuilds against a new tree snapshot.
	pub fn document_changed(&self, tree: SyntaxNode) {
		self.send(Command::DocumentChanged(tree));
	}

	/// Label click: expands or collapses the annotation whose tag region is `region`.
	pub fn toggle_label(&self, region: RegionId) {
		self.send(Command::ToggleLabel(region));
	}

	/// Tears the view down. Idempotent.
	pub fn destroy(&self) {
		self.send(Command::Destroy);
	}

	/// Runs `callback` once the view is torn down, or right away if it already is.
	pub fn on_destroyed(&self, callback: impl FnOnce() + Send + 'static) {
		if let Err(mpsc::error::SendError(Command::OnDestroyed(callback))) =
			self.commands.send(Command::OnDestroyed(Box::new(callback)))
		{
			callback();
		}
	}

	/// Waits until the view is torn down.
	pub async fn destroyed(&self) {
		let mut state = self.state.clone();
		// A dropped sender means the controller is gone.
		let _: Result<_, _> = state.wait_for(|s| *s == ViewState::Destroyed).await;
	}
}
