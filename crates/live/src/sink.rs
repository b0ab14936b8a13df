//! Rendering sink consumed by annotations.
//!
//! The host's decoration layer is opaque: annotations only create regions
//! bound to source ranges, attach overlays and highlights to them, and restyle
//! those decorations. Destroying a region releases every decoration attached
//! to it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use crate::tree::SourceRange;

/// Handle to a region bound to a source range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub u64);

/// Handle to an overlay or highlight attached to a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecorationId(pub u64);

/// Widget drawn over a region.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
	/// Clickable marker showing the tag's literal text.
	TagLabel {
		/// Tag literal as written in the source.
		text: String,
	},
	/// Proportional fill bar.
	Bar,
	/// Color swatch.
	Swatch,
}

/// Highlight painted under a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
	/// Event activity.
	Event,
	/// Boolean state.
	Toggle,
	/// One arm of a stepped/switch construct.
	Branch,
}

/// An RGBA color. Channels are bytes, alpha is in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
	/// Red.
	pub r: u8,
	/// Green.
	pub g: u8,
	/// Blue.
	pub b: u8,
	/// Opacity.
	pub a: f64,
}

impl Rgba {
	/// Converts remote color channels `[r, g, b, a?]` in `[0, 1]`.
	///
	/// Color channels are scaled by 256 and clamped to a byte; alpha defaults
	/// to 1. Returns `None` with fewer than three channels.
	pub fn from_channels(channels: &[f64]) -> Option<Self> {
		fn byte(channel: f64) -> u8 {
			if channel.is_nan() {
				return 0;
			}
			(channel * 256.0).floor().clamp(0.0, 255.0) as u8
		}

		let [r, g, b, rest @ ..] = channels else {
			return None;
		};
		let a = rest.first().copied().filter(|a| !a.is_nan()).unwrap_or(1.0).clamp(0.0, 1.0);
		Some(Self {
			r: byte(*r),
			g: byte(*g),
			b: byte(*b),
			a,
		})
	}
}

/// Visual state of a decoration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Style {
	/// Resting state.
	Idle,
	/// Highlighted state.
	Active,
	/// Fill proportion in `[0, 1]`.
	Fill(f64),
	/// Background color.
	Background(Rgba),
}

/// Receiver of decoration calls.
///
/// Implementations must tolerate calls for regions or decorations that were
/// already released.
pub trait AnnotationSink: Send + Sync {
	/// Binds a new region to `range`.
	fn create_region(&self, range: SourceRange) -> RegionId;
	/// Releases a region and every decoration attached to it.
	fn destroy_region(&self, region: RegionId);
	/// Attaches a widget to a region.
	fn attach_overlay(&self, region: RegionId, overlay: Overlay) -> DecorationId;
	/// Attaches a highlight to a region.
	fn attach_highlight(&self, region: RegionId, highlight: Highlight) -> DecorationId;
	/// Restyles a decoration.
	fn set_style(&self, decoration: DecorationId, style: Style);
	/// Applies `class` to a decoration for `duration`.
	fn flash(&self, decoration: DecorationId, class: &str, duration: Duration);
	/// Detaches a single decoration.
	fn remove_decoration(&self, decoration: DecorationId);
}

/// Sink that renders nothing.
#[derive(Debug, Default)]
pub struct NullSink {
	ids: AtomicU64,
}

impl NullSink {
	fn next(&self) -> u64 {
		self.ids.fetch_add(1, Ordering::Relaxed) + 1
	}
}

impl AnnotationSink for NullSink {
	fn create_region(&self, _range: SourceRange) -> RegionId {
		RegionId(self.next())
	}

	fn destroy_region(&self, _region: RegionId) {}

	fn attach_overlay(&self, _region: RegionId, _overlay: Overlay) -> DecorationId {
		DecorationId(self.next())
	}

	fn attach_highlight(&self, _region: RegionId, _highlight: Highlight) -> DecorationId {
		DecorationId(self.next())
	}

	fn set_style(&self, _decoration: DecorationId, _style: Style) {}

	fn flash(&self, _decoration: DecorationId, _class: &str, _duration: Duration) {}

	fn remove_decoration(&self, _decoration: DecorationId) {}
}

/// Sink that logs every call at trace level.
#[derive(Debug, Default)]
pub struct TracingSink {
	inner: NullSink,
}

impl AnnotationSink for TracingSink {
	fn create_region(&self, range: SourceRange) -> RegionId {
		let region = self.inner.create_region(range);
		trace!(region = region.0, %range, "sink.region.create");
		region
	}

	fn destroy_region(&self, region: RegionId) {
		trace!(region = region.0, "sink.region.destroy");
	}

	fn attach_overlay(&self, region: RegionId, overlay: Overlay) -> DecorationId {
		let deco = self.inner.attach_overlay(region, overlay.clone());
		trace!(region = region.0, decoration = deco.0, ?overlay, "sink.overlay.attach");
		deco
	}

	fn attach_highlight(&self, region: RegionId, highlight: Highlight) -> DecorationId {
		let deco = self.inner.attach_highlight(region, highlight);
		trace!(region = region.0, decoration = deco.0, ?highlight, "sink.highlight.attach");
		deco
	}

	fn set_style(&self, decoration: DecorationId, style: Style) {
		trace!(decoration = decoration.0, ?style, "sink.style");
	}

	fn flash(&self, decoration: DecorationId, class: &str, duration: Duration) {
		trace!(decoration = decoration.0, class, ?duration, "sink.flash");
	}

	fn remove_decoration(&self, decoration: DecorationId) {
		trace!(decoration = decoration.0, "sink.decoration.remove");
	}
}

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
	/// [`AnnotationSink::create_region`].
	CreateRegion(RegionId, SourceRange),
	/// [`AnnotationSink::destroy_region`].
	DestroyRegion(RegionId),
	/// [`AnnotationSink::attach_overlay`].
	AttachOverlay(RegionId, DecorationId, Overlay),
	/// [`AnnotationSink::attach_highlight`].
	AttachHighlight(RegionId, DecorationId, Highlight),
	/// [`AnnotationSink::set_style`].
	SetStyle(DecorationId, Style),
	/// [`AnnotationSink::flash`].
	Flash(DecorationId, String, Duration),
	/// [`AnnotationSink::remove_decoration`].
	RemoveDecoration(DecorationId),
}

/// Sink that records every call for later inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
	ids: NullSink,
	calls: Mutex<Vec<SinkCall>>,
}

impl RecordingSink {
	/// Creates an empty recorder.
	pub fn new() -> Self {
		Self::default()
	}

	fn record(&self, call: SinkCall) {
		self.calls.lock().push(call);
	}

	/// Snapshot of every call so far.
	pub fn calls(&self) -> Vec<SinkCall> {
		self.calls.lock().clone()
	}

	/// Drains the recorded calls.
	pub fn take(&self) -> Vec<SinkCall> {
		std::mem::take(&mut *self.calls.lock())
	}

	/// Regions created and not yet destroyed, in creation order.
	pub fn live_regions(&self) -> Vec<RegionId> {
		let calls = self.calls.lock();
		let mut live = Vec::new();
		for call in calls.iter() {
			match call {
				SinkCall::CreateRegion(region, _) => live.push(*region),
				SinkCall::DestroyRegion(region) => live.retain(|r| r != region),
				_ => {}
			}
		}
		live
	}

	/// Number of times `region` was destroyed.
	pub fn destroy_count(&self, region: RegionId) -> usize {
		self.calls
			.lock()
			.iter()
			.filter(|c| matches!(c, SinkCall::DestroyRegion(r) if *r == region))
			.count()
	}

	/// The most recent style applied to `decoration`.
	pub fn last_style(&self, decoration: DecorationId) -> Option<Style> {
		self.calls.lock().iter().rev().find_map(|c| match c {
			SinkCall::SetStyle(d, style) if *d == decoration => Some(*style),
			_ => None,
		})
	}

	/// Every style applied to `decoration`, oldest first.
	pub fn styles(&self, decoration: DecorationId) -> Vec<Style> {
		self.calls
			.lock()
			.iter()
			.filter_map(|c| match c {
				SinkCall::SetStyle(d, style) if *d == decoration => Some(*style),
				_ => None,
			})
			.collect()
	}

	/// Number of flashes applied to `decoration`.
	pub fn flash_count(&self, decoration: DecorationId) -> usize {
		self.calls
			.lock()
			.iter()
			.filter(|c| matches!(c, SinkCall::Flash(d, ..) if *d == decoration))
			.count()
	}

	/// Decorations attached as overlays matching `pred`, with their regions.
	pub fn overlays(&self, pred: impl Fn(&Overlay) -> bool) -> Vec<(RegionId, DecorationId)> {
		self.calls
			.lock()
			.iter()
			.filter_map(|c| match c {
				SinkCall::AttachOverlay(region, deco, overlay) if pred(overlay) => Some((*region, *deco)),
				_ => None,
			})
			.collect()
	}

	/// Decorations attached as highlights of `kind`, with their regions.
	pub fn highlights(&self, kind: Highlight) -> Vec<(RegionId, DecorationId)> {
		self.calls
			.lock()
			.iter()
			.filter_map(|c| match c {
				SinkCall::AttachHighlight(region, deco, h) if *h == kind => Some((*region, *deco)),
				_ => None,
			})
			.collect()
	}

	/// The label region for a tag literal such as `!5!`, if one was created.
	pub fn label_region(&self, text: &str) -> Option<RegionId> {
		self.overlays(|o| matches!(o, Overlay::TagLabel { text: t } if t == text))
			.last()
			.map(|(region, _)| *region)
	}
}

impl AnnotationSink for RecordingSink {
	fn create_region(&self, range: SourceRange) -> RegionId {
		let region = self.ids.create_region(range);
		self.record(SinkCall::CreateRegion(region, range));
		region
	}

	fn destroy_region(&self, region: RegionId) {
		self.record(SinkCall::DestroyRegion(region));
	}

	fn attach_overlay(&self, region: RegionId, overlay: Overlay) -> DecorationId {
		let deco = self.ids.attach_overlay(region, overlay.clone());
		self.record(SinkCall::AttachOverlay(region, deco, overlay));
		deco
	}

	fn attach_highlight(&self, region: RegionId, highlight: Highlight) -> DecorationId {
		let deco = self.ids.attach_highlight(region, highlight);
		self.record(SinkCall::AttachHighlight(region, deco, highlight));
		deco
	}

	fn set_style(&self, decoration: DecorationId, style: Style) {
		self.record(SinkCall::SetStyle(decoration, style));
	}

	fn flash(&self, decoration: DecorationId, class: &str, duration: Duration) {
		self.record(SinkCall::Flash(decoration, class.to_string(), duration));
	}

	fn remove_decoration(&self, decoration: DecorationId) {
		self.record(SinkCall::RemoveDecoration(decoration));
	}
}
