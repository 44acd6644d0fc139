//! Protocol module - the JSON-RPC 2.0 envelope.
//!
//! Wire shapes for the control plane:
//! - [`Request`] - client -> server method invocation
//! - [`Response`] - server -> client result or error, id echoed
//! - [`Event`] - server -> client notification, no id, no reply
//! - [`ErrorObject`] - code / message / optional data
//!
//! Field names are part of the compatibility surface and must not change.

mod envelope;

pub use envelope::{
    codes, Event, ErrorObject, Request, RequestId, Response, ResponsePayload, JSONRPC_VERSION,
};
