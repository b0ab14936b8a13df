//! Wire types for the live-view protocol.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier naming a point of interest inside the remote process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(pub u64);

impl fmt::Display for Tag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "!{}!", self.0)
	}
}

/// Correlation id assigned by the multiplexer.
pub type RequestId = u64;

/// Query kinds understood by the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Query {
	/// Current value and visualization descriptor for a tag.
	Info {
		/// Tag being queried.
		tag: Tag,
	},
	/// Legacy value/state query for a tag.
	State {
		/// Tag being queried.
		tag: Tag,
	},
	/// The remote's global tick counter.
	Tick,
}

/// An outgoing request: a query stamped with its correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
	/// Correlation id, assigned by the multiplexer just before sending.
	pub id: RequestId,
	/// The query payload.
	#[serde(flatten)]
	pub query: Query,
}

impl Request {
	/// Wraps a query in a request awaiting an id.
	#[must_use]
	pub fn new(query: Query) -> Self {
		Self { id: 0, query }
	}

	/// `{type: "info", tag}`.
	#[must_use]
	pub fn info(tag: Tag) -> Self {
		Self::new(Query::Info { tag })
	}

	/// `{type: "state", tag}`.
	#[must_use]
	pub fn state(tag: Tag) -> Self {
		Self::new(Query::State { tag })
	}

	/// `{type: "tick"}`.
	#[must_use]
	pub fn tick() -> Self {
		Self::new(Query::Tick)
	}
}

/// Response envelope: the echoed id, an optional error, and the remaining fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Response {
	/// Echoed correlation id.
	pub id: RequestId,
	/// Remote error; any truthy value rejects the transaction.
	#[serde(default)]
	pub error: Option<Value>,
	/// Every other field of the response object.
	#[serde(flatten)]
	pub fields: Map<String, Value>,
}

impl Response {
	/// Returns the error message if the envelope carries a truthy `error`.
	pub fn error_message(&self) -> Option<String> {
		match self.error.as_ref()? {
			Value::Null | Value::Bool(false) => None,
			Value::String(s) if s.is_empty() => None,
			Value::String(s) => Some(s.clone()),
			other => Some(other.to_string()),
		}
	}

	/// Decodes the non-envelope fields as a typed reply.
	///
	/// # Errors
	///
	/// Returns an error when the fields do not match `T`.
	pub fn parse<T: DeserializeOwned>(self) -> serde_json::Result<T> {
		serde_json::from_value(Value::Object(self.fields))
	}
}

/// Reply to an `info` query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfoResponse {
	/// Tag the reply describes.
	#[serde(default)]
	pub tag: Option<Tag>,
	/// Current value, if the tag has produced one.
	#[serde(default)]
	pub result: Option<ResultInfo>,
	/// Visualization descriptor; `null` or absent selects no visual output.
	#[serde(default)]
	pub vis: Option<Vis>,
	/// Metadata about the cell's head operator.
	#[serde(default)]
	pub head_meta: Option<HeadMeta>,
}

impl InfoResponse {
	/// The tick at which the value last changed.
	pub fn updated(&self) -> Option<u64> {
		self.result.as_ref().and_then(|r| r.updated)
	}

	/// The discriminator of the visualization descriptor.
	pub fn vis_type(&self) -> Option<&str> {
		self.vis.as_ref().and_then(|v| v.kind.as_deref())
	}

	/// Branch index carried by `vis.step`, falling back to `vis.active`.
	pub fn branch_index(&self) -> Option<i64> {
		let vis = self.vis.as_ref()?;
		vis.step.or(vis.active)
	}
}

/// Value snapshot of a tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultInfo {
	/// The value itself.
	#[serde(default)]
	pub value: Value,
	/// Type name of the value.
	#[serde(rename = "type", default)]
	pub type_name: Option<String>,
	/// Metatype marker; `"!"` denotes an event stream.
	#[serde(default)]
	pub metatype: Option<String>,
	/// Tick of the last update.
	#[serde(default)]
	pub updated: Option<u64>,
}

/// Visualization descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vis {
	/// Display strategy discriminator (`event`, `bool`, `bar`, `rgb`).
	#[serde(rename = "type", default)]
	pub kind: Option<String>,
	/// Fill proportion in `[0, 1]`.
	#[serde(default)]
	pub bar: Option<f64>,
	/// Color channels `[r, g, b, a?]`.
	#[serde(default)]
	pub rgb: Option<Vec<f64>>,
	/// Active step index of a stepped construct.
	#[serde(default)]
	pub step: Option<i64>,
	/// Active branch index of a switch construct.
	#[serde(default)]
	pub active: Option<i64>,
}

/// Head operator metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadMeta {
	/// Operator name.
	#[serde(default)]
	pub name: Option<String>,
}

/// Reply to a legacy `state` query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateResponse {
	/// Current value.
	#[serde(default)]
	pub value: Option<Value>,
	/// Opaque operator state.
	#[serde(default)]
	pub state: Option<Value>,
}

/// Reply to a `tick` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickResponse {
	/// Global tick counter.
	pub tick: u64,
}
