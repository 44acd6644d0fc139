//! JSON-RPC 2.0 envelope types.
//!
//! Requests carry a named-parameter map and an opaque id; responses echo
//! the id verbatim and carry exactly one of `result` or `error`; events
//! carry no id at all. The `jsonrpc` tag on inbound requests is accepted
//! without validation, outbound messages always stamp `"2.0"`.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::Result;
use crate::handler::ParamMap;

/// Protocol version tag stamped on every outbound message.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC error codes used by the dispatcher.
pub mod codes {
    /// Malformed wire payload.
    pub const PARSE_ERROR: i64 = -32700;
    /// No registry entry for the requested method.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Binding failure or handler-reported error; `data` distinguishes.
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Opaque request id: absent, number, or string.
///
/// Passed through unexamined and echoed verbatim on the response. An
/// absent id deserializes to [`RequestId::Null`] and serializes back to
/// JSON `null`, so "absent" is normalized the same way on every path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id, kept as the exact wire number.
    Number(Number),
    /// String id.
    String(String),
    /// Absent (or literal null) id.
    #[default]
    Null,
}

impl RequestId {
    /// The neutral id used when the real one could not be recovered
    /// (i.e. the request failed to parse).
    pub fn zero() -> Self {
        RequestId::Number(Number::from(0))
    }

    fn is_null(&self) -> bool {
        matches!(self, RequestId::Null)
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(Number::from(n))
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// An inbound method invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version tag; not validated on inbound messages.
    #[serde(default)]
    pub jsonrpc: String,
    /// Method name, case-sensitive.
    pub method: String,
    /// Named parameters; an absent `params` field means "no parameters".
    #[serde(default, skip_serializing_if = "ParamMap::is_empty")]
    pub params: ParamMap,
    /// Opaque id, echoed on the response.
    #[serde(default, skip_serializing_if = "RequestId::is_null")]
    pub id: RequestId,
}

impl Request {
    /// Decode a request from raw bytes.
    ///
    /// Total: any payload that is not a syntactically valid request shape
    /// yields an error, never a panic or a partially-filled request.
    pub fn decode(bytes: &[u8]) -> Result<Request> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Either the success value or the error object of a response.
///
/// Modeled as an enum so a response structurally carries exactly one of
/// the two; `result` stays present even when the value is JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponsePayload {
    /// Success. The value may itself be `null`.
    #[serde(rename = "result")]
    Result(Value),
    /// Failure.
    #[serde(rename = "error")]
    Error(ErrorObject),
}

/// An outbound reply to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Always `"2.0"` on outbound messages.
    pub jsonrpc: String,
    /// Result or error.
    #[serde(flatten)]
    pub payload: ResponsePayload,
    /// Id echoed from the request; `null` when the request had none.
    pub id: RequestId,
}

impl Response {
    /// Create a success response.
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            payload: ResponsePayload::Result(result),
            id,
        }
    }

    /// Create an error response.
    pub fn error(id: RequestId, error: ErrorObject) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            payload: ResponsePayload::Error(error),
            id,
        }
    }

    /// The success value, if this is a success response.
    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            ResponsePayload::Result(v) => Some(v),
            ResponsePayload::Error(_) => None,
        }
    }

    /// The error object, if this is an error response.
    pub fn err(&self) -> Option<&ErrorObject> {
        match &self.payload {
            ResponsePayload::Result(_) => None,
            ResponsePayload::Error(e) => Some(e),
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Fixed protocol error code (see [`codes`]).
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Free-form detail: the offending parameter, or the handler's own
    /// error text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// `-32700` for a payload that could not be decoded.
    pub fn parse_error() -> Self {
        Self {
            code: codes::PARSE_ERROR,
            message: "Parse error".to_string(),
            data: None,
        }
    }

    /// `-32601` for a method absent from the registry.
    pub fn method_not_found() -> Self {
        Self {
            code: codes::METHOD_NOT_FOUND,
            message: "Method not found".to_string(),
            data: None,
        }
    }

    /// `-32603` with detail text in `data`.
    pub fn internal(data: impl Into<String>) -> Self {
        Self {
            code: codes::INTERNAL_ERROR,
            message: "Internal error".to_string(),
            data: Some(Value::String(data.into())),
        }
    }
}

/// A server-initiated notification. No id, no expected reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Event name.
    pub method: String,
    /// Arbitrary payload; omitted from the wire when `null`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Event {
    /// Build an event, dropping a `null` payload from the wire.
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params: if params.is_null() { None } else { Some(params) },
        }
    }
}
