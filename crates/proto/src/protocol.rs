//! JSON datagram protocol implementation for alv-rpc.

use alv_rpc::CounterIdGen;

use crate::types::{Request, RequestId, Response};

/// JSON-object-per-datagram protocol.
#[derive(Debug, Clone, Default)]
pub struct LiveProtocol;

impl LiveProtocol {
	/// Creates a new protocol instance.
	#[must_use]
	pub const fn new() -> Self {
		Self
	}
}

impl alv_rpc::Protocol for LiveProtocol {
	type Id = RequestId;
	type Request = Request;
	type Response = Response;
	type CodecError = serde_json::Error;
	type IdGen = CounterIdGen;

	fn next_id(id_gen: &mut Self::IdGen) -> Self::Id {
		id_gen.next()
	}

	fn set_request_id(req: &mut Self::Request, id: Self::Id) {
		req.id = id;
	}

	fn encode_request(&mut self, req: &Self::Request) -> Result<Vec<u8>, Self::CodecError> {
		serde_json::to_vec(req)
	}

	fn decode_response(&mut self, datagram: &[u8]) -> Result<Self::Response, Self::CodecError> {
		serde_json::from_slice(datagram)
	}

	fn response_id(resp: &Self::Response) -> Self::Id {
		resp.id
	}

	fn into_result(resp: Self::Response) -> Result<Self::Response, String> {
		match resp.error_message() {
			Some(message) => Err(message),
			None => Ok(resp),
		}
	}
}
