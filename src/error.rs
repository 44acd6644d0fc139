//! Error types for kvmlink.

use thiserror::Error;

/// Main error type for transport and infrastructure operations.
///
/// Protocol-level failures (parse errors, unknown methods, binding and
/// handler errors) never surface here; they are converted into JSON-RPC
/// error responses inside the dispatch pipeline.
#[derive(Debug, Error)]
pub enum RpcError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol error (oversized frame, malformed stream, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Backpressure timeout - outbound queue full.
    #[error("Backpressure timeout")]
    BackpressureTimeout,
}

/// Result type alias using RpcError.
pub type Result<T> = std::result::Result<T, RpcError>;
