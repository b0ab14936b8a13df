//! Reconciliation controller.
//!
//! One task per view owns the registry, the freshness baseline and the poll
//! loop, and reacts to three inputs in a single `select!`: commands from the
//! [`LiveView`](crate::LiveView) handle, document events, and whatever work
//! the current [`Stage`] is waiting on. Because every mutation happens on this
//! task, a rebuild can never interleave with a poll cycle: starting a rebuild
//! replaces the stage, which drops any cycle in flight.

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::annotation::{Annotation, RenderCtx};
use crate::client::LiveClient;
use crate::config::LiveConfig;
use crate::discovery::discover;
use crate::freshness::FreshnessBaseline;
use crate::poll::{self, PollPhase, RebuildOutcome, TickOutcome, UpdatesOutcome, Work};
use crate::registry::AnnotationRegistry;
use crate::sink::{AnnotationSink, RegionId};
use crate::tree::SyntaxNode;
use crate::view::{DocumentEvent, LiveDocument};

/// Lifecycle state of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewState {
	/// No annotations and no polling, either before the first successful
	/// rebuild or after a failed one.
	Idle,
	/// Discovery done, waiting for the info replies.
	Rebuilding,
	/// Annotations installed and the poll loop running.
	Active,
	/// Torn down. Terminal.
	Destroyed,
}

/// Callback run once the view is torn down.
pub(crate) type DestroyedCallback = Box<dyn FnOnce() + Send>;

/// Requests sent by the view handle.
pub(crate) enum Command {
	DocumentChanged(SyntaxNode),
	ToggleLabel(RegionId),
	OnDestroyed(DestroyedCallback),
	Destroy,
}

/// What the controller is waiting on.
enum Stage {
	Idle,
	Rebuilding(Work<RebuildOutcome>),
	Active(PollPhase),
}

enum Step {
	Rebuilt(RebuildOutcome),
	UpdatesSettled(UpdatesOutcome),
	TickSettled(TickOutcome),
	CycleDue,
}

impl Stage {
	/// Resolves when the current stage's work completes; never while idle.
	async fn next_step(&mut self) -> Step {
		match self {
			Self::Idle => std::future::pending().await,
			Self::Rebuilding(work) => Step::Rebuilt(work.await),
			Self::Active(PollPhase::Waiting(sleep)) => {
				sleep.as_mut().await;
				Step::CycleDue
			}
			Self::Active(PollPhase::Updates(work)) => Step::UpdatesSettled(work.await),
			Self::Active(PollPhase::Tick(work)) => Step::TickSettled(work.await),
		}
	}
}

async fn next_event(events: &mut Option<mpsc::UnboundedReceiver<DocumentEvent>>) -> Option<DocumentEvent> {
	match events {
		Some(rx) => rx.recv().await,
		None => std::future::pending().await,
	}
}

fn render_ctx(baseline: FreshnessBaseline, config: &LiveConfig) -> RenderCtx<'_> {
	RenderCtx {
		baseline,
		now: Instant::now(),
		flash: config.flash_duration(),
		branch_heads: &config.branch_heads,
	}
}

/// The per-view actor.
pub(crate) struct Controller {
	document: Box<dyn LiveDocument>,
	sink: Arc<dyn AnnotationSink>,
	config: LiveConfig,
	client: LiveClient,
	registry: AnnotationRegistry,
	baseline: FreshnessBaseline,
	stage: Stage,
	commands: mpsc::UnboundedReceiver<Command>,
	events: Option<mpsc::UnboundedReceiver<DocumentEvent>>,
	state: watch::Sender<ViewState>,
	shutdown: CancellationToken,
	mux: Option<JoinHandle<alv_rpc::Result<()>>>,
	on_destroyed: Vec<DestroyedCallback>,
}

/// Everything a controller is built from.
pub(crate) struct ControllerParts {
	pub document: Box<dyn LiveDocument>,
	pub sink: Arc<dyn AnnotationSink>,
	pub config: LiveConfig,
	pub client: LiveClient,
	pub commands: mpsc::UnboundedReceiver<Command>,
	pub events: mpsc::UnboundedReceiver<DocumentEvent>,
	pub state: watch::Sender<ViewState>,
	pub shutdown: CancellationToken,
	pub mux: JoinHandle<alv_rpc::Result<()>>,
}

impl Controller {
	pub fn new(parts: ControllerParts) -> Self {
		Self {
			document: parts.document,
			sink: parts.sink,
			config: parts.config,
			client: parts.client,
			registry: AnnotationRegistry::new(),
			baseline: FreshnessBaseline::default(),
			stage: Stage::Idle,
			commands: parts.commands,
			events: Some(parts.events),
			state: parts.state,
			shutdown: parts.shutdown,
			mux: Some(parts.mux),
			on_destroyed: Vec::new(),
		}
	}

	/// Runs the initial rebuild, then serves until teardown.
	pub async fn run(mut self) {
		let tree = self.document.syntax_tree();
		self.start_rebuild(tree);

		loop {
			let flow = tokio::select! {
				biased;

				command = self.commands.recv() => match command {
					Some(command) => self.handle_command(command),
					None => ControlFlow::Break(()),
				},

				event = next_event(&mut self.events) => self.handle_document_event(event),

				step = self.stage.next_step() => {
					self.handle_step(step);
					ControlFlow::Continue(())
				}
			};

			if flow.is_break() {
				break;
			}
		}

		self.teardown().await;
	}

	fn set_state(&self, state: ViewState) {
		self.state.send_replace(state);
	}

	fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
		match command {
			Command::DocumentChanged(tree) => self.start_rebuild(tree),
			Command::ToggleLabel(region) => match self.registry.find_by_region_mut(region) {
				Some(annotation) => {
					let expanded = annotation.toggle();
					debug!(tag = %annotation.tag(), expanded, "live.label.toggle");
				}
				None => trace!(region = region.0, "live.label.unknown"),
			},
			Command::OnDestroyed(callback) => self.on_destroyed.push(callback),
			Command::Destroy => return ControlFlow::Break(()),
		}
		ControlFlow::Continue(())
	}

	fn handle_document_event(&mut self, event: Option<DocumentEvent>) -> ControlFlow<()> {
		match event {
			Some(DocumentEvent::Saved | DocumentEvent::Reloaded) => {
				let tree = self.document.syntax_tree();
				self.start_rebuild(tree);
				ControlFlow::Continue(())
			}
			Some(DocumentEvent::Closed) | None => ControlFlow::Break(()),
		}
	}

	fn handle_step(&mut self, step: Step) {
		match step {
			Step::Rebuilt(outcome) => self.finish_rebuild(outcome),
			Step::CycleDue => self.start_updates(),
			Step::UpdatesSettled(outcome) => self.finish_updates(outcome),
			Step::TickSettled(outcome) => self.finish_tick(outcome),
		}
	}

	/// Stops polling, destroys the current set and queries every discovered tag.
	fn start_rebuild(&mut self, tree: SyntaxNode) {
		self.stage = Stage::Idle;
		let epoch = self.registry.begin_rebuild();

		let mut cells = Vec::new();
		for found in discover(&tree) {
			match found {
				Ok(cell) => cells.push(cell),
				Err(e) => warn!(epoch = epoch.0, error = %e, "live.discovery.error"),
			}
		}

		info!(epoch = epoch.0, cells = cells.len(), "live.rebuild.start");
		self.set_state(ViewState::Rebuilding);
		self.stage = Stage::Rebuilding(poll::rebuild(self.client.clone(), epoch, cells));
	}

	fn finish_rebuild(&mut self, outcome: RebuildOutcome) {
		let RebuildOutcome { epoch, cells, replies } = outcome;
		if epoch != self.registry.epoch() {
			trace!(epoch = epoch.0, current = self.registry.epoch().0, "live.rebuild.stale");
			return;
		}
		self.stage = Stage::Idle;

		let mut infos = Vec::with_capacity(replies.len());
		for (cell, reply) in cells.iter().zip(replies) {
			match reply {
				Ok(info) => infos.push(info),
				Err(e) => {
					warn!(epoch = epoch.0, tag = %cell.tag, error = %e, "live.rebuild.failed");
					self.set_state(ViewState::Idle);
					return;
				}
			}
		}

		let ctx = render_ctx(self.baseline, &self.config);
		let entries: Vec<Annotation> = cells
			.iter()
			.zip(&infos)
			.map(|(cell, info)| Annotation::create(self.sink.clone(), cell, info, &ctx))
			.collect();

		if let Err(rejected) = self.registry.install(epoch, entries) {
			debug!(epoch = epoch.0, dropped = rejected.len(), "live.rebuild.rejected");
			return;
		}

		info!(epoch = epoch.0, annotations = self.registry.len(), "live.rebuild.done");
		self.set_state(ViewState::Active);
		self.stage = Stage::Active(PollPhase::waiting(self.config.poll_interval_duration()));
	}

	fn start_updates(&mut self) {
		let epoch = self.registry.epoch();
		let tags = self.registry.iter().map(Annotation::tag).collect();
		self.stage = Stage::Active(PollPhase::Updates(poll::updates(self.client.clone(), epoch, tags)));
	}

	fn finish_updates(&mut self, outcome: UpdatesOutcome) {
		if outcome.epoch != self.registry.epoch() {
			trace!(epoch = outcome.epoch.0, "live.poll.stale");
			return;
		}

		let ctx = render_ctx(self.baseline, &self.config);
		for (index, (tag, reply)) in outcome.replies.into_iter().enumerate() {
			match reply {
				Ok(info) => {
					if let Some(annotation) = self.registry.get_mut(index) {
						annotation.update(&info, &ctx);
					}
				}
				Err(e) => debug!(%tag, error = %e, "live.poll.update_failed"),
			}
		}

		self.stage = Stage::Active(PollPhase::Tick(poll::tick(self.client.clone(), outcome.epoch)));
	}

	fn finish_tick(&mut self, outcome: TickOutcome) {
		if outcome.epoch != self.registry.epoch() {
			trace!(epoch = outcome.epoch.0, "live.poll.stale");
			return;
		}

		match outcome.tick {
			Ok(tick) => {
				self.baseline.advance(tick);
			}
			Err(e) => debug!(error = %e, "live.poll.tick_failed"),
		}
		self.stage = Stage::Active(PollPhase::waiting(self.config.poll_interval_duration()));
	}

	/// Stops polling, releases every annotation, closes the socket and notifies owners.
	async fn teardown(&mut self) {
		self.stage = Stage::Idle;
		self.registry.teardown();
		self.shutdown.cancel();
		if let Some(mux) = self.mux.take() {
			match mux.await {
				Ok(Ok(())) => {}
				Ok(Err(e)) => warn!(error = %e, "live.mux.failed"),
				Err(e) => warn!(error = %e, "live.mux.join_failed"),
			}
		}
		self.events = None;
		self.set_state(ViewState::Destroyed);
		info!("live.view.destroyed");

		for callback in self.on_destroyed.drain(..) {
			callback();
		}

		self.commands.close();
		while let Ok(command) = self.commands.try_recv() {
			if let Command::OnDestroyed(callback) = command {
				callback();
			}
		}
	}
}
