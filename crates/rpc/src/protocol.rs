//! Protocol abstraction for wire formats and id semantics.

use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Simple counter-based ID generator for protocols.
///
/// Ids start at 1 and are never reused for the lifetime of the generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct CounterIdGen(pub u64);

impl CounterIdGen {
	/// Creates a new counter; the first generated id is 1.
	#[must_use]
	pub const fn new() -> Self {
		Self(0)
	}

	/// Increments the counter and returns the new id.
	#[allow(clippy::should_implement_trait, reason = "convention")]
	pub fn next(&mut self) -> u64 {
		self.0 += 1;
		self.0
	}
}

/// Protocol binding between the generic pump and a concrete datagram format.
pub trait Protocol: Send + 'static {
	/// Identifier type correlating requests and responses.
	type Id: Eq + Hash + Clone + Debug + Display + Send + 'static;

	/// Outgoing request type.
	type Request: Send + 'static;

	/// Incoming response envelope type.
	type Response: Send + 'static;

	/// Error raised when encoding or decoding a datagram.
	type CodecError: Display + Send + 'static;

	/// State for generating unique request IDs.
	type IdGen: Send + 'static;

	/// Generate the next unique request ID.
	fn next_id(id_gen: &mut Self::IdGen) -> Self::Id;

	/// Stamp the ID onto a request before it is encoded.
	fn set_request_id(req: &mut Self::Request, id: Self::Id);

	/// Serialize a request into a single datagram payload.
	fn encode_request(&mut self, req: &Self::Request) -> Result<Vec<u8>, Self::CodecError>;

	/// Parse a datagram payload as a response envelope.
	fn decode_response(&mut self, datagram: &[u8]) -> Result<Self::Response, Self::CodecError>;

	/// Get the correlation ID from a response.
	fn response_id(resp: &Self::Response) -> Self::Id;

	/// Split an envelope into success or the remote's error string.
	fn into_result(resp: Self::Response) -> Result<Self::Response, String>;
}
