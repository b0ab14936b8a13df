//! Single-active-slot highlight over the arms of a stepped/switch cell.

use crate::sink::{AnnotationSink, DecorationId, Highlight, RegionId, Style};
use crate::tree::SourceRange;

#[derive(Debug)]
struct Slot {
	region: RegionId,
	decoration: DecorationId,
}

/// Marks at most one arm of a cell as active.
#[derive(Debug)]
pub struct BranchHighlight {
	slots: Vec<Slot>,
	active: Option<usize>,
}

impl BranchHighlight {
	/// Binds one idle highlight per arm range.
	pub fn new(sink: &dyn AnnotationSink, ranges: &[SourceRange]) -> Self {
		let slots = ranges
			.iter()
			.map(|range| {
				let region = sink.create_region(*range);
				let decoration = sink.attach_highlight(region, Highlight::Branch);
				sink.set_style(decoration, Style::Idle);
				Slot { region, decoration }
			})
			.collect();
		Self { slots, active: None }
	}

	/// Index of the active arm.
	pub fn active(&self) -> Option<usize> {
		self.active
	}

	/// Number of arms.
	pub fn len(&self) -> usize {
		self.slots.len()
	}

	/// Returns true if the cell has no arms.
	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Moves the active mark to `index`.
	///
	/// Negative or out-of-range indices clear the mark. Setting the current
	/// index again does nothing.
	pub fn set_active(&mut self, sink: &dyn AnnotationSink, index: Option<i64>) {
		let next = index
			.and_then(|i| usize::try_from(i).ok())
			.filter(|i| *i < self.slots.len());
		if next == self.active {
			return;
		}
		if let Some(slot) = self.active.and_then(|i| self.slots.get(i)) {
			sink.set_style(slot.decoration, Style::Idle);
		}
		if let Some(slot) = next.and_then(|i| self.slots.get(i)) {
			sink.set_style(slot.decoration, Style::Active);
		}
		self.active = next;
	}

	/// Releases every arm region. Safe to call more than once.
	pub fn destroy(&mut self, sink: &dyn AnnotationSink) {
		for slot in self.slots.drain(..) {
			sink.destroy_region(slot.region);
		}
		self.active = None;
	}
}
