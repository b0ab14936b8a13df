//! Tag discovery over a structural tree snapshot.
//!
//! [`discover`] returns a lazy, stack-based iterator over every tag-bearing
//! cell. Only `cell` nodes are descended into; any other node, and everything
//! beneath it, is skipped. A structural error in one cell aborts that cell's
//! subtree and is yielded in place, so the caller decides whether to log it
//! and carry on with the siblings.

use alv_proto::Tag;

use crate::error::DiscoveryError;
use crate::tree::{SourceRange, SyntaxNode};

/// Node type of a cell.
pub const CELL: &str = "cell";
/// Node type of a cell's tag token.
pub const TAG: &str = "tag";
/// Node type of a cell's head operator.
pub const HEAD: &str = "head";

/// A tag-bearing cell found in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCell {
	/// Parsed tag.
	pub tag: Tag,
	/// Tag token as written, e.g. `!5!`.
	pub tag_text: String,
	/// Source range of the tag token.
	pub tag_range: SourceRange,
	/// Source range of the whole cell.
	pub range: SourceRange,
	/// Head operator text, if the cell has a head.
	pub head: Option<String>,
	/// Sub-ranges eligible for branch highlighting.
	pub branch_ranges: Vec<SourceRange>,
	/// Number of enclosing cells.
	pub depth: usize,
}

/// Parses a delimited tag literal such as `!12!`.
///
/// One leading and one trailing character are stripped regardless of what
/// they are; the remainder must be a non-negative integer.
pub fn parse_tag(text: &str, range: SourceRange) -> Result<Tag, DiscoveryError> {
	let malformed = || DiscoveryError::MalformedTag {
		text: text.to_string(),
		range,
	};

	let mut chars = text.chars();
	chars.next().ok_or_else(malformed)?;
	chars.next_back().ok_or_else(malformed)?;
	let inner = chars.as_str();

	if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
		return Err(malformed());
	}
	inner.parse().map(Tag).map_err(|_| malformed())
}

/// Extracts a cell's tag and metadata.
///
/// Returns `Ok(None)` for a cell without a tag.
fn inspect(cell: &SyntaxNode, depth: usize) -> Result<Option<DiscoveredCell>, DiscoveryError> {
	let Some(tag_node) = cell.child_of_kind(TAG)? else {
		return Ok(None);
	};
	let head = cell.child_of_kind(HEAD)?.map(|h| h.leaf_text().to_string());
	let tag_text = tag_node.leaf_text();
	let tag = parse_tag(tag_text, tag_node.range)?;

	let branch_ranges = cell
		.named_children()
		.filter(|c| !c.is(TAG))
		.skip(1)
		.map(|c| c.range)
		.collect();

	Ok(Some(DiscoveredCell {
		tag,
		tag_text: tag_text.to_string(),
		tag_range: tag_node.range,
		range: cell.range,
		head,
		branch_ranges,
		depth,
	}))
}

/// Lazily walks `root` and yields every tag-bearing cell, depth-first in source order.
///
/// If `root` is itself a cell it is inspected; otherwise the walk starts at
/// its children.
pub fn discover(root: &SyntaxNode) -> Cells<'_> {
	let stack = if root.is(CELL) {
		vec![(root, 0)]
	} else {
		root.children.iter().rev().map(|c| (c, 0)).collect()
	};
	Cells { stack }
}

/// Iterator returned by [`discover`].
#[derive(Debug)]
pub struct Cells<'a> {
	stack: Vec<(&'a SyntaxNode, usize)>,
}

impl Iterator for Cells<'_> {
	type Item = Result<DiscoveredCell, DiscoveryError>;

	fn next(&mut self) -> Option<Self::Item> {
		while let Some((node, depth)) = self.stack.pop() {
			if !node.is(CELL) {
				continue;
			}
			match inspect(node, depth) {
				Ok(found) => {
					self.stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
					if let Some(cell) = found {
						return Some(Ok(cell));
					}
				}
				Err(e) => return Some(Err(e)),
			}
		}
		None
	}
}
