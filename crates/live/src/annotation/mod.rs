//! Per-cell annotation entities.
//!
//! An [`Annotation`] owns every decoration drawn for one tag-bearing cell:
//! * a region on the tag token carrying the clickable tag label
//! * the [`Kind`] selected by the remote's descriptor, drawn on the same
//!   region while the label is expanded
//! * an optional [`BranchHighlight`] over the cell's arms
//!
//! Destroying the annotation releases all of it exactly once; later updates
//! and toggles are no-ops.

mod branch;
mod kind;

use std::sync::Arc;
use std::time::Duration;

use alv_proto::{InfoResponse, Tag};
use tokio::time::Instant;
use tracing::trace;

pub use self::branch::BranchHighlight;
pub use self::kind::{BarKind, BoolKind, EventKind, Kind, KindTag, RgbKind};
use crate::discovery::DiscoveredCell;
use crate::freshness::FreshnessBaseline;
use crate::sink::{AnnotationSink, DecorationId, Overlay, RegionId, Style};
use crate::tree::SourceRange;

/// Inputs shared by every render in a cycle.
#[derive(Debug, Clone, Copy)]
pub struct RenderCtx<'a> {
	/// Freshness baseline at the time the reply is applied.
	pub baseline: FreshnessBaseline,
	/// Current time.
	pub now: Instant,
	/// Event flash length.
	pub flash: Duration,
	/// Head names that mark a stepped/switch construct.
	pub branch_heads: &'a [String],
}

/// Decorations and display state for one cell.
pub struct Annotation {
	sink: Arc<dyn AnnotationSink>,
	tag: Tag,
	label_text: String,
	head: Option<String>,
	branch_ranges: Vec<SourceRange>,
	region: Option<RegionId>,
	label: Option<DecorationId>,
	expanded: bool,
	kind: Kind,
	branch: Option<BranchHighlight>,
}

impl std::fmt::Debug for Annotation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Annotation")
			.field("tag", &self.tag)
			.field("region", &self.region)
			.field("expanded", &self.expanded)
			.field("kind", &self.kind.tag())
			.finish_non_exhaustive()
	}
}

impl Annotation {
	/// Creates the annotation for a discovered cell from its initial reply.
	pub fn create(sink: Arc<dyn AnnotationSink>, cell: &DiscoveredCell, info: &InfoResponse, ctx: &RenderCtx<'_>) -> Self {
		let region = sink.create_region(cell.tag_range);
		let label = sink.attach_overlay(
			region,
			Overlay::TagLabel {
				text: cell.tag_text.clone(),
			},
		);
		sink.set_style(label, Style::Idle);

		let mut this = Self {
			sink,
			tag: cell.tag,
			label_text: cell.tag_text.clone(),
			head: cell.head.clone(),
			branch_ranges: cell.branch_ranges.clone(),
			region: Some(region),
			label: Some(label),
			expanded: false,
			kind: Kind::new(KindTag::select(info)),
			branch: None,
		};
		this.update(info, ctx);
		this
	}

	/// Tag this annotation polls.
	pub fn tag(&self) -> Tag {
		self.tag
	}

	/// Tag literal as written.
	pub fn label_text(&self) -> &str {
		&self.label_text
	}

	/// Region bound to the tag token, until destroyed.
	pub fn region(&self) -> Option<RegionId> {
		self.region
	}

	/// Current display strategy.
	pub fn kind(&self) -> &Kind {
		&self.kind
	}

	/// Branch highlight, if the cell is a stepped/switch construct.
	pub fn branch(&self) -> Option<&BranchHighlight> {
		self.branch.as_ref()
	}

	/// Whether the label is expanded and the kind drawn.
	pub fn is_expanded(&self) -> bool {
		self.expanded
	}

	/// Returns true once [`Annotation::destroy`] ran.
	pub fn is_destroyed(&self) -> bool {
		self.region.is_none()
	}

	fn wants_branch(&self, info: &InfoResponse, branch_heads: &[String]) -> bool {
		if info.branch_index().is_some() {
			return true;
		}
		let head_name = info
			.head_meta
			.as_ref()
			.and_then(|h| h.name.as_deref())
			.or(self.head.as_deref());
		head_name.is_some_and(|name| branch_heads.iter().any(|h| h == name))
	}

	/// Folds a poll reply into the annotation.
	///
	/// The kind is replaced only when the reply selects a different strategy.
	pub fn update(&mut self, info: &InfoResponse, ctx: &RenderCtx<'_>) {
		let Some(region) = self.region else {
			return;
		};
		let sink = &*self.sink;

		let selected = KindTag::select(info);
		if selected != self.kind.tag() {
			trace!(tag = %self.tag, from = ?self.kind.tag(), to = ?selected, "live.annotation.kind");
			self.kind.unmount(sink);
			self.kind = Kind::new(selected);
			if self.expanded {
				self.kind.mount(sink, region);
			}
		}
		self.kind.apply(sink, info, ctx);

		if self.branch.is_none() && self.wants_branch(info, ctx.branch_heads) {
			self.branch = Some(BranchHighlight::new(sink, &self.branch_ranges));
		}
		if let Some(branch) = &mut self.branch {
			branch.set_active(sink, info.branch_index());
		}
	}

	/// Expands or collapses the label. Returns the new expansion state.
	pub fn toggle(&mut self) -> bool {
		let Some(region) = self.region else {
			return false;
		};
		let sink = &*self.sink;

		self.expanded = !self.expanded;
		if self.expanded {
			self.kind.mount(sink, region);
		} else {
			self.kind.unmount(sink);
		}
		if let Some(label) = self.label {
			sink.set_style(label, if self.expanded { Style::Active } else { Style::Idle });
		}
		self.expanded
	}

	/// Releases every decoration. Idempotent.
	pub fn destroy(&mut self) {
		let Some(region) = self.region.take() else {
			return;
		};
		let sink = &*self.sink;

		if let Some(mut branch) = self.branch.take() {
			branch.destroy(sink);
		}
		self.kind.forget();
		self.label = None;
		self.expanded = false;
		sink.destroy_region(region);
	}
}

impl Drop for Annotation {
	fn drop(&mut self) {
		self.destroy();
	}
}
