//! Live annotation engine.
//!
//! Keeps visual annotations on a source document synchronized with the
//! runtime state of a remote process executing that document:
//! * [`discovery`]: walks the structural tree and finds tagged cells
//! * [`annotation`]: per-cell annotation entities and their display kinds
//! * [`registry`]: the epoch-guarded set of live annotations
//! * [`controller`]: rebuild state machine and the self-paced polling loop
//! * [`view`]: the handle owned by an editor session
//! * [`sessions`]: per-document view registry
//!
//! The renderer and the host's syntax tree are consumed through
//! [`sink::AnnotationSink`] and [`tree::TreeCursor`].

#![warn(missing_docs)]

pub mod annotation;
pub mod client;
pub mod config;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod freshness;
mod poll;
pub mod registry;
pub mod sessions;
pub mod sink;
pub mod tree;
pub mod view;

pub use alv_proto::{InfoResponse, Tag};
pub use client::LiveClient;
pub use config::{ConfigError, LiveConfig};
pub use controller::ViewState;
pub use error::{DiscoveryError, Error, Result};
pub use freshness::FreshnessBaseline;
pub use sessions::Sessions;
pub use sink::{AnnotationSink, DecorationId, RegionId};
pub use tree::{SourcePoint, SourceRange, SyntaxNode, TreeCursor};
pub use view::{DocumentEvent, LiveDocument, LiveView};
