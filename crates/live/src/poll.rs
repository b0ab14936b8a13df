//! Poll cycle work items.
//!
//! A cycle is three phases, each a single future owned by the controller:
//! wait out the poll interval, refresh every annotation concurrently, then
//! query the tick. The next phase is only created once the previous one
//! settled, so cycles never overlap and the cadence is self-paced.

use std::pin::Pin;
use std::time::Duration;

use alv_proto::{InfoResponse, Tag};
use futures::future::{BoxFuture, Fuse, FutureExt, join_all};
use tokio::time::Sleep;

use crate::client::LiveClient;
use crate::discovery::DiscoveredCell;
use crate::error::Result;
use crate::registry::Epoch;

/// Info replies for a rebuild, one per discovered cell.
pub(crate) struct RebuildOutcome {
	pub epoch: Epoch,
	pub cells: Vec<DiscoveredCell>,
	pub replies: Vec<Result<InfoResponse>>,
}

/// Poll replies, indexed like the registry they were issued for.
pub(crate) struct UpdatesOutcome {
	pub epoch: Epoch,
	pub replies: Vec<(Tag, Result<InfoResponse>)>,
}

/// Result of the cycle's closing tick query.
pub(crate) struct TickOutcome {
	pub epoch: Epoch,
	pub tick: Result<u64>,
}

pub(crate) type Work<T> = Fuse<BoxFuture<'static, T>>;

/// Phase of an active poll cycle.
pub(crate) enum PollPhase {
	Waiting(Pin<Box<Sleep>>),
	Updates(Work<UpdatesOutcome>),
	Tick(Work<TickOutcome>),
}

impl PollPhase {
	pub fn waiting(interval: Duration) -> Self {
		Self::Waiting(Box::pin(tokio::time::sleep(interval)))
	}
}

/// Issues one info query per discovered cell and waits for all of them.
pub(crate) fn rebuild(client: LiveClient, epoch: Epoch, cells: Vec<DiscoveredCell>) -> Work<RebuildOutcome> {
	async move {
		let replies = join_all(cells.iter().map(|cell| client.info(cell.tag))).await;
		RebuildOutcome { epoch, cells, replies }
	}
	.boxed()
	.fuse()
}

/// Refreshes every tag concurrently. Failures stay with their entry.
pub(crate) fn updates(client: LiveClient, epoch: Epoch, tags: Vec<Tag>) -> Work<UpdatesOutcome> {
	async move {
		let replies = join_all(tags.iter().map(|tag| client.info(*tag))).await;
		UpdatesOutcome {
			epoch,
			replies: tags.into_iter().zip(replies).collect(),
		}
	}
	.boxed()
	.fuse()
}

/// Queries the tick counter.
pub(crate) fn tick(client: LiveClient, epoch: Epoch) -> Work<TickOutcome> {
	async move {
		TickOutcome {
			epoch,
			tick: client.tick().await,
		}
	}
	.boxed()
	.fuse()
}
