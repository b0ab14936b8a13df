//! Epoch-guarded annotation registry.
//!
//! The registry is either empty or holds the complete result of one rebuild.
//! Each rebuild bumps the epoch first; results computed under an older epoch
//! are refused at install time and anything tagged with a stale epoch is
//! ignored by the controller.

use tracing::debug;

use crate::annotation::Annotation;
use crate::sink::RegionId;

/// Rebuild generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(pub u64);

impl Epoch {
	/// The following generation.
	#[must_use]
	pub const fn next(self) -> Self {
		Self(self.0 + 1)
	}
}

/// The live set of annotations for one document.
#[derive(Debug, Default)]
pub struct AnnotationRegistry {
	epoch: Epoch,
	entries: Vec<Annotation>,
}

impl AnnotationRegistry {
	/// Creates an empty registry at epoch 0.
	pub fn new() -> Self {
		Self::default()
	}

	/// Current generation.
	pub fn epoch(&self) -> Epoch {
		self.epoch
	}

	/// Destroys every annotation and starts a new generation.
	pub fn begin_rebuild(&mut self) -> Epoch {
		self.clear();
		self.epoch = self.epoch.next();
		debug!(epoch = self.epoch.0, "live.registry.epoch");
		self.epoch
	}

	/// Installs the complete result of a rebuild.
	///
	/// # Errors
	///
	/// Returns the entries back if `epoch` is not current or the registry is
	/// already populated; the caller drops them, which releases their decorations.
	pub fn install(&mut self, epoch: Epoch, entries: Vec<Annotation>) -> Result<(), Vec<Annotation>> {
		if epoch != self.epoch || !self.entries.is_empty() {
			return Err(entries);
		}
		self.entries = entries;
		Ok(())
	}

	/// Destroys every annotation, keeping the epoch.
	pub fn clear(&mut self) {
		for mut entry in self.entries.drain(..) {
			entry.destroy();
		}
	}

	/// Final teardown: destroys everything and invalidates in-flight work.
	pub fn teardown(&mut self) {
		self.clear();
		self.epoch = self.epoch.next();
	}

	/// Number of annotations.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true if nothing is installed.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Annotations in discovery order.
	pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
		self.entries.iter()
	}

	/// Annotation at `index`.
	pub fn get_mut(&mut self, index: usize) -> Option<&mut Annotation> {
		self.entries.get_mut(index)
	}

	/// Annotation whose tag region is `region`.
	pub fn find_by_region_mut(&mut self, region: RegionId) -> Option<&mut Annotation> {
		self.entries.iter_mut().find(|a| a.region() == Some(region))
	}
}
