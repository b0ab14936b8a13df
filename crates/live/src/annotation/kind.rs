//! Display strategies selected by the remote's visualization descriptor.
//!
//! Every kind tracks its state on each poll whether or not it is shown; the
//! decoration it draws exists only while the kind is mounted, i.e. while the
//! owning annotation's label is expanded.

use alv_proto::InfoResponse;
use serde_json::Value;
use tokio::time::Instant;

use super::RenderCtx;
use crate::sink::{AnnotationSink, DecorationId, Highlight, Overlay, RegionId, Rgba, Style};

/// Discriminator of a display strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindTag {
	/// No visual output.
	Null,
	/// Transient flash on fresh updates.
	Event,
	/// Binary state from the value's truthiness.
	Bool,
	/// Proportional fill.
	Bar,
	/// Color swatch.
	Rgb,
}

impl KindTag {
	/// Selects the strategy for a reply.
	///
	/// An absent `vis` on a value whose metatype is `!` is an event stream;
	/// any other absent, null or unrecognized descriptor selects [`KindTag::Null`].
	pub fn select(info: &InfoResponse) -> Self {
		match info.vis_type() {
			Some("event") => Self::Event,
			Some("bool") => Self::Bool,
			Some("bar") => Self::Bar,
			Some("rgb") => Self::Rgb,
			Some(_) => Self::Null,
			None if info.vis.is_none() && is_event_stream(info) => Self::Event,
			None => Self::Null,
		}
	}
}

fn is_event_stream(info: &InfoResponse) -> bool {
	info.result.as_ref().and_then(|r| r.metatype.as_deref()) == Some("!")
}

/// Loose truthiness of a remote value.
pub(crate) fn truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
		Value::String(s) => !s.is_empty(),
		Value::Array(_) | Value::Object(_) => true,
	}
}

/// Event kind: active for the flash duration after each fresh update.
#[derive(Debug, Default)]
pub struct EventKind {
	decoration: Option<DecorationId>,
	active_until: Option<Instant>,
}

impl EventKind {
	/// Returns true while the last flash is still running at `now`.
	pub fn is_active(&self, now: Instant) -> bool {
		self.active_until.is_some_and(|until| now < until)
	}

	fn apply(&mut self, sink: &dyn AnnotationSink, info: &InfoResponse, ctx: &RenderCtx<'_>) {
		let Some(updated) = info.updated() else {
			return;
		};
		if !ctx.baseline.is_fresh(updated) {
			return;
		}
		self.active_until = Some(ctx.now + ctx.flash);
		if let Some(deco) = self.decoration {
			sink.flash(deco, "active", ctx.flash);
		}
	}
}

/// Boolean kind.
#[derive(Debug, Default)]
pub struct BoolKind {
	decoration: Option<DecorationId>,
	active: bool,
}

impl BoolKind {
	/// Current state.
	pub fn is_active(&self) -> bool {
		self.active
	}

	fn style(&self) -> Style {
		if self.active { Style::Active } else { Style::Idle }
	}

	fn apply(&mut self, sink: &dyn AnnotationSink, info: &InfoResponse) {
		let active = info.result.as_ref().is_some_and(|r| truthy(&r.value));
		if active == self.active {
			return;
		}
		self.active = active;
		if let Some(deco) = self.decoration {
			sink.set_style(deco, self.style());
		}
	}
}

/// Bar kind.
#[derive(Debug, Default)]
pub struct BarKind {
	decoration: Option<DecorationId>,
	fill: f64,
}

impl BarKind {
	/// Current fill proportion.
	pub fn fill(&self) -> f64 {
		self.fill
	}

	fn apply(&mut self, sink: &dyn AnnotationSink, info: &InfoResponse) {
		let fill = info.vis.as_ref().and_then(|v| v.bar).unwrap_or(0.0);
		self.fill = if fill.is_nan() { 0.0 } else { fill.clamp(0.0, 1.0) };
		if let Some(deco) = self.decoration {
			sink.set_style(deco, Style::Fill(self.fill));
		}
	}
}

/// Color kind.
#[derive(Debug, Default)]
pub struct RgbKind {
	decoration: Option<DecorationId>,
	color: Option<Rgba>,
}

impl RgbKind {
	/// Current color, if the remote sent a usable one.
	pub fn color(&self) -> Option<Rgba> {
		self.color
	}

	fn apply(&mut self, sink: &dyn AnnotationSink, info: &InfoResponse) {
		let color = info
			.vis
			.as_ref()
			.and_then(|v| v.rgb.as_deref())
			.and_then(Rgba::from_channels);
		if color == self.color {
			return;
		}
		self.color = color;
		if let (Some(deco), Some(color)) = (self.decoration, color) {
			sink.set_style(deco, Style::Background(color));
		}
	}
}

/// A display strategy and its state.
#[derive(Debug)]
pub enum Kind {
	/// Placeholder.
	Null,
	/// See [`EventKind`].
	Event(EventKind),
	/// See [`BoolKind`].
	Bool(BoolKind),
	/// See [`BarKind`].
	Bar(BarKind),
	/// See [`RgbKind`].
	Rgb(RgbKind),
}

impl Kind {
	/// Creates a fresh, unmounted kind.
	pub fn new(tag: KindTag) -> Self {
		match tag {
			KindTag::Null => Self::Null,
			KindTag::Event => Self::Event(EventKind::default()),
			KindTag::Bool => Self::Bool(BoolKind::default()),
			KindTag::Bar => Self::Bar(BarKind::default()),
			KindTag::Rgb => Self::Rgb(RgbKind::default()),
		}
	}

	/// The discriminator this kind was built from.
	pub fn tag(&self) -> KindTag {
		match self {
			Self::Null => KindTag::Null,
			Self::Event(_) => KindTag::Event,
			Self::Bool(_) => KindTag::Bool,
			Self::Bar(_) => KindTag::Bar,
			Self::Rgb(_) => KindTag::Rgb,
		}
	}

	/// The decoration drawn while mounted.
	pub fn decoration(&self) -> Option<DecorationId> {
		match self {
			Self::Null => None,
			Self::Event(k) => k.decoration,
			Self::Bool(k) => k.decoration,
			Self::Bar(k) => k.decoration,
			Self::Rgb(k) => k.decoration,
		}
	}

	/// Attaches the kind's decoration to `region` and paints its current state.
	pub fn mount(&mut self, sink: &dyn AnnotationSink, region: RegionId) {
		if self.decoration().is_some() {
			return;
		}
		match self {
			Self::Null => {}
			Self::Event(k) => {
				k.decoration = Some(sink.attach_highlight(region, Highlight::Event));
			}
			Self::Bool(k) => {
				let deco = sink.attach_highlight(region, Highlight::Toggle);
				sink.set_style(deco, k.style());
				k.decoration = Some(deco);
			}
			Self::Bar(k) => {
				let deco = sink.attach_overlay(region, Overlay::Bar);
				sink.set_style(deco, Style::Fill(k.fill));
				k.decoration = Some(deco);
			}
			Self::Rgb(k) => {
				let deco = sink.attach_overlay(region, Overlay::Swatch);
				if let Some(color) = k.color {
					sink.set_style(deco, Style::Background(color));
				}
				k.decoration = Some(deco);
			}
		}
	}

	/// Detaches the kind's decoration, keeping its state.
	pub fn unmount(&mut self, sink: &dyn AnnotationSink) {
		if let Some(deco) = self.forget() {
			sink.remove_decoration(deco);
		}
	}

	/// Drops the decoration handle without touching the sink.
	///
	/// Used when the owning region is destroyed, which releases the decoration.
	pub fn forget(&mut self) -> Option<DecorationId> {
		match self {
			Self::Null => None,
			Self::Event(k) => k.decoration.take(),
			Self::Bool(k) => k.decoration.take(),
			Self::Bar(k) => k.decoration.take(),
			Self::Rgb(k) => k.decoration.take(),
		}
	}

	/// Folds a reply into the kind's state and repaints if mounted.
	pub fn apply(&mut self, sink: &dyn AnnotationSink, info: &InfoResponse, ctx: &RenderCtx<'_>) {
		match self {
			Self::Null => {}
			Self::Event(k) => k.apply(sink, info, ctx),
			Self::Bool(k) => k.apply(sink, info),
			Self::Bar(k) => k.apply(sink, info),
			Self::Rgb(k) => k.apply(sink, info),
		}
	}
}
