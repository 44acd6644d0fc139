//! Codec module - serialization/deserialization for wire messages.
//!
//! The control plane speaks JSON-RPC 2.0 as newline-delimited JSON text,
//! so there is exactly one codec:
//!
//! - [`JsonCodec`] - JSON using `serde_json`
//!
//! # Design
//!
//! The codec is a marker struct with static methods rather than a trait
//! object. This keeps codec selection at compile time and avoids boxing on
//! the per-message path.
//!
//! # Example
//!
//! ```
//! use kvmlink::codec::JsonCodec;
//!
//! let encoded = JsonCodec::encode(&"hello").unwrap();
//! let decoded: String = JsonCodec::decode(encoded.as_bytes()).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

mod json;

pub use json::JsonCodec;
