//! Transport module - the concrete byte streams the dispatcher runs on.
//!
//! The dispatch core is transport-agnostic: anything readable and
//! writable works (see `RpcServer::serve_connection`). What ships here is
//! the appliance's local control socket, a Unix domain socket that
//! front-end processes (the WebRTC data-channel bridge, the on-device
//! terminal) connect to.

#[cfg(unix)]
mod socket;

#[cfg(unix)]
pub use socket::ControlListener;
