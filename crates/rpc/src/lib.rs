//! Datagram transaction multiplexer.
//!
//! This crate provides protocol-agnostic primitives for request/response
//! correlation over a single unordered datagram channel:
//! * `MainLoop`: A tokio-driven pump owning the socket and the pending table
//! * `TxSocket`: Cloneable handle used to issue transactions to the main loop
//! * `Protocol`: Trait for defining wire formats and id semantics
//! * `CounterIdGen`: Strictly increasing transaction ids starting at 1

#![warn(missing_docs)]

pub mod error;
pub mod mainloop;
pub mod protocol;
pub mod socket;

pub use error::{Error, Result};
pub use mainloop::MainLoop;
pub use protocol::{CounterIdGen, Protocol};
pub use socket::{MainLoopEvent, TxSocket};
