//! Per-document view registry.
//!
//! Mirrors the editor package entry point: one live view per document key,
//! toggled on and off by the user, torn down together on deactivation.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::LiveConfig;
use crate::error::Result;
use crate::sink::AnnotationSink;
use crate::view::{LiveDocument, LiveView};

type Views<K> = Mutex<HashMap<K, LiveView>>;

/// Live views keyed by host document.
pub struct Sessions<K> {
	views: Arc<Views<K>>,
	sink: Arc<dyn AnnotationSink>,
	config: LiveConfig,
}

impl<K> std::fmt::Debug for Sessions<K> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Sessions").field("views", &self.views.lock().len()).finish_non_exhaustive()
	}
}

impl<K> Sessions<K>
where
	K: Eq + Hash + Clone + Send + 'static,
{
	/// Creates an empty registry whose views render into `sink`.
	pub fn new(sink: Arc<dyn AnnotationSink>, config: LiveConfig) -> Self {
		Self {
			views: Arc::new(Mutex::new(HashMap::new())),
			sink,
			config,
		}
	}

	/// Starts a view for `key` if there is none, otherwise destroys it.
	///
	/// Returns true if a view is live for `key` afterwards. A started view
	/// removes itself once its document closes.
	///
	/// # Errors
	///
	/// Fails if the view's socket cannot be bound.
	pub async fn toggle<D: LiveDocument>(&self, key: K, document: D) -> Result<bool> {
		let existing = self.views.lock().remove(&key);
		if let Some(view) = existing {
			debug!(view = view.id(), "live.session.stop");
			view.destroy();
			return Ok(false);
		}

		let view = LiveView::spawn(document, self.sink.clone(), self.config.clone()).await?;
		let id = view.id();
		debug!(view = id, "live.session.start");
		self.views.lock().insert(key.clone(), view.clone());

		let views: Weak<Views<K>> = Arc::downgrade(&self.views);
		view.on_destroyed(move || {
			let Some(views) = views.upgrade() else {
				return;
			};
			let mut views = views.lock();
			if views.get(&key).is_some_and(|v| v.id() == id) {
				views.remove(&key);
			}
		});
		Ok(true)
	}

	/// Destroys and forgets the view for `key`. Returns true if there was one.
	pub fn remove(&self, key: &K) -> bool {
		let removed = self.views.lock().remove(key);
		match removed {
			Some(view) => {
				view.destroy();
				true
			}
			None => false,
		}
	}

	/// Returns true if a view is live for `key`.
	pub fn contains(&self, key: &K) -> bool {
		self.views.lock().contains_key(key)
	}

	/// Handle to the view for `key`.
	pub fn get(&self, key: &K) -> Option<LiveView> {
		self.views.lock().get(key).cloned()
	}

	/// Number of live views.
	pub fn len(&self) -> usize {
		self.views.lock().len()
	}

	/// Returns true if no view is live.
	pub fn is_empty(&self) -> bool {
		self.views.lock().is_empty()
	}

	/// Destroys every view and waits for each teardown to finish.
	pub async fn shutdown_all(&self) {
		let views: Vec<LiveView> = self.views.lock().drain().map(|(_, v)| v).collect();
		for view in &views {
			view.destroy();
		}
		for view in &views {
			view.destroyed().await;
		}
		debug!(count = views.len(), "live.session.shutdown");
	}
}
