//! # kvmlink
//!
//! Control-plane JSON-RPC dispatch core for a KVM-over-IP appliance.
//!
//! A remote client invokes named device operations (keyboard/mouse
//! injection, video quality control, virtual media, update management, ...)
//! over a JSON-RPC 2.0 envelope carried on any byte-oriented transport.
//! The core of the crate is the dispatcher: a declarative registration
//! table that binds untyped wire parameters onto statically-typed handler
//! functions without per-method glue.
//!
//! ## Architecture
//!
//! - **Envelope** ([`protocol`]): JSON-RPC 2.0 request/response/event types
//! - **Binder** ([`handler`]): named parameter bag -> typed argument tuples
//! - **Registry** ([`handler::MethodRegistry`]): method name -> erased adapter
//! - **Server** ([`server`]): decode -> lookup -> bind -> invoke -> encode
//! - **Writer** ([`writer`]): single writer task serializing all outbound frames
//! - **Events** ([`events`]): fire-and-forget server->client notifications
//!
//! ## Example
//!
//! ```
//! use kvmlink::server::ServerBuilder;
//! use kvmlink::handler::MethodError;
//!
//! struct Ctx;
//!
//! fn ping(_ctx: &Ctx) -> Result<&'static str, MethodError> {
//!     Ok("pong")
//! }
//!
//! let server = ServerBuilder::new().method("ping", [], ping).build(Ctx);
//! let response = server
//!     .handle_message(br#"{"jsonrpc":"2.0","method":"ping","id":1}"#)
//!     .unwrap();
//! assert_eq!(serde_json::to_value(&response).unwrap()["result"], "pong");
//! ```

pub mod codec;
pub mod device;
pub mod error;
pub mod events;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod state;
pub mod transport;
pub mod writer;

pub use error::{Result, RpcError};
pub use events::EventSender;
pub use handler::{MethodError, MethodRegistry};
pub use server::{RpcServer, ServerBuilder};
