//! Owned snapshot of the host's structural tree.
//!
//! The host editor exposes its parse tree through a mutable cursor. Discovery
//! never works against that cursor directly: [`SyntaxNode::from_cursor`]
//! copies the tree into an owned, `Send` snapshot once per rebuild and every
//! later walk is a plain recursive traversal of that snapshot.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DiscoveryError;

/// Zero-based row/column position in the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourcePoint {
	/// Zero-based line.
	pub row: u32,
	/// Zero-based column.
	pub column: u32,
}

impl SourcePoint {
	/// Creates a point.
	pub const fn new(row: u32, column: u32) -> Self {
		Self { row, column }
	}
}

/// Half-open source range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceRange {
	/// Inclusive start.
	pub start: SourcePoint,
	/// Exclusive end.
	pub end: SourcePoint,
}

impl SourceRange {
	/// Creates a range.
	pub const fn new(start: SourcePoint, end: SourcePoint) -> Self {
		Self { start, end }
	}

	/// Single-line range on `row` spanning `start..end` columns.
	pub const fn on_row(row: u32, start: u32, end: u32) -> Self {
		Self::new(SourcePoint::new(row, start), SourcePoint::new(row, end))
	}

	/// Returns true if `other` lies within this range.
	pub fn contains(&self, other: &SourceRange) -> bool {
		self.start <= other.start && other.end <= self.end
	}
}

impl fmt::Display for SourceRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}:{}-{}:{}",
			self.start.row + 1,
			self.start.column + 1,
			self.end.row + 1,
			self.end.column + 1
		)
	}
}

/// Cursor over the host's parse tree.
///
/// Mirrors the usual incremental-parser cursor: the cursor sits on one node
/// and moves to its first child, next sibling, or parent.
pub trait TreeCursor {
	/// Node type of the current node.
	fn kind(&self) -> &str;
	/// Source text of the current node.
	fn text(&self) -> Cow<'_, str>;
	/// Source range of the current node.
	fn range(&self) -> SourceRange;
	/// Whether the current node is named (as opposed to punctuation).
	fn is_named(&self) -> bool;
	/// Moves to the first child; false if there is none.
	fn goto_first_child(&mut self) -> bool;
	/// Moves to the next sibling; false if there is none.
	fn goto_next_sibling(&mut self) -> bool;
	/// Moves to the parent; false at the root.
	fn goto_parent(&mut self) -> bool;
}

/// A node of the structural tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxNode {
	/// Node type, e.g. `cell`, `tag`, `head`.
	pub kind: String,
	/// Source text. Interior nodes captured from a cursor carry none.
	#[serde(default)]
	pub text: String,
	/// Source range.
	pub range: SourceRange,
	/// Whether the node is named.
	#[serde(default = "named_by_default")]
	pub named: bool,
	/// Child nodes in source order.
	#[serde(default)]
	pub children: Vec<SyntaxNode>,
}

fn named_by_default() -> bool {
	true
}

impl SyntaxNode {
	/// Creates a named leaf node.
	pub fn new(kind: impl Into<String>, text: impl Into<String>, range: SourceRange) -> Self {
		Self {
			kind: kind.into(),
			text: text.into(),
			range,
			named: true,
			children: Vec::new(),
		}
	}

	/// Replaces the children.
	pub fn with_children(mut self, children: impl IntoIterator<Item = SyntaxNode>) -> Self {
		self.children = children.into_iter().collect();
		self
	}

	/// Marks the node anonymous (punctuation).
	pub fn anonymous(mut self) -> Self {
		self.named = false;
		self
	}

	/// Returns true if the node has the given type.
	pub fn is(&self, kind: &str) -> bool {
		self.kind == kind
	}

	/// Named children in source order.
	pub fn named_children(&self) -> impl Iterator<Item = &SyntaxNode> {
		self.children.iter().filter(|c| c.named)
	}

	/// The single child of the given type, if any.
	///
	/// # Errors
	///
	/// Returns [`DiscoveryError::DuplicateChild`] if more than one child has that type.
	pub fn child_of_kind(&self, kind: &str) -> Result<Option<&SyntaxNode>, DiscoveryError> {
		let mut matches = self.children.iter().filter(|c| c.is(kind));
		let first = matches.next();
		if matches.next().is_some() {
			return Err(DiscoveryError::DuplicateChild {
				kind: kind.to_string(),
				range: self.range,
			});
		}
		Ok(first)
	}

	/// Own text, or the text of the first leaf beneath this node.
	pub fn leaf_text(&self) -> &str {
		if !self.text.is_empty() || self.children.is_empty() {
			return &self.text;
		}
		self.children.first().map_or("", SyntaxNode::leaf_text)
	}

	/// Copies the subtree under the cursor's current node.
	///
	/// The cursor is left on the node it started on.
	pub fn from_cursor<C: TreeCursor + ?Sized>(cursor: &mut C) -> Self {
		let mut node = Self {
			kind: cursor.kind().to_owned(),
			text: String::new(),
			range: cursor.range(),
			named: cursor.is_named(),
			children: Vec::new(),
		};

		if cursor.goto_first_child() {
			loop {
				node.children.push(Self::from_cursor(cursor));
				if !cursor.goto_next_sibling() {
					break;
				}
			}
			cursor.goto_parent();
		} else {
			node.text = cursor.text().into_owned();
		}

		node
	}
}
