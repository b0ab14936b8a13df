//! Freshness baseline.

use tracing::debug;

/// The last tick counter observed from the remote.
///
/// A value whose `updated` tick is at or after the baseline is fresh; anything
/// strictly older is stale. Every tick reply replaces the baseline, so a
/// remote whose counter restarts is tracked from its new value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FreshnessBaseline {
	last_tick: u64,
}

impl FreshnessBaseline {
	/// Creates a baseline at `tick`.
	pub const fn at(tick: u64) -> Self {
		Self { last_tick: tick }
	}

	/// The last observed tick.
	pub const fn tick(self) -> u64 {
		self.last_tick
	}

	/// Returns true if a value updated at `updated` is new relative to this baseline.
	pub const fn is_fresh(self, updated: u64) -> bool {
		updated >= self.last_tick
	}

	/// Records a tick reply. Returns false if `tick` went backwards, which
	/// happens when the remote restarts its counter.
	pub fn advance(&mut self, tick: u64) -> bool {
		let forward = tick >= self.last_tick;
		if !forward {
			debug!(tick, baseline = self.last_tick, "live.tick.regressed");
		}
		self.last_tick = tick;
		forward
	}
}
