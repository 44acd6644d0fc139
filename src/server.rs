//! Server builder and dispatch pipeline.
//!
//! One dispatch core serves every transport: the pipeline
//! (decode -> lookup -> bind -> invoke -> encode) lives in
//! [`RpcServer::handle_message`] and is pure with respect to the sink;
//! [`RpcServer::serve_connection`] wires it to a concrete byte stream,
//! and the session-specific code reduces to supplying that stream plus
//! the registration table.
//!
//! # Example
//!
//! ```
//! use kvmlink::handler::MethodError;
//! use kvmlink::server::ServerBuilder;
//!
//! struct Ctx;
//!
//! fn ping(_ctx: &Ctx) -> Result<&'static str, MethodError> {
//!     Ok("pong")
//! }
//!
//! let server = ServerBuilder::new().method("ping", [], ping).build(Ctx);
//! assert!(server.registry().contains("ping"));
//! ```

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader};

use crate::codec::JsonCodec;
use crate::error::{Result, RpcError};
use crate::events::EventSender;
use crate::handler::{DispatchError, FromParams, Handler, MethodRegistry};
use crate::protocol::{ErrorObject, Request, RequestId, Response};
use crate::writer::{spawn_writer_task, WriterConfig};

/// Default cap on a single inbound frame.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Builder for configuring and creating an [`RpcServer`].
///
/// Methods are registered fluently; the registry is sealed when `build`
/// is called and never changes afterwards.
pub struct ServerBuilder<C> {
    registry: MethodRegistry<C>,
    writer_config: WriterConfig,
    max_frame_len: usize,
}

impl<C: Send + Sync + 'static> ServerBuilder<C> {
    /// Create a new server builder.
    pub fn new() -> Self {
        Self {
            registry: MethodRegistry::new(),
            writer_config: WriterConfig::default(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Register a method handler.
    ///
    /// `params` is the ordered parameter-name list, matched to the
    /// handler's argument tuple at compile time.
    pub fn method<Args, H>(mut self, name: &'static str, params: Args::Names, handler: H) -> Self
    where
        Args: FromParams + 'static,
        H: Handler<C, Args>,
    {
        self.registry.register(name, params, handler);
        self
    }

    /// Merge an already-populated registry (a registration table built by
    /// the device layer).
    pub fn table(mut self, build: impl FnOnce(&mut MethodRegistry<C>)) -> Self {
        build(&mut self.registry);
        self
    }

    /// Replace the writer configuration.
    pub fn writer_config(mut self, config: WriterConfig) -> Self {
        self.writer_config = config;
        self
    }

    /// Cap the size of a single inbound frame.
    ///
    /// Default: 1 MiB.
    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// Seal the registry and build the server around a context value.
    pub fn build(self, ctx: C) -> RpcServer<C> {
        RpcServer {
            registry: Arc::new(self.registry),
            ctx: Arc::new(ctx),
            writer_config: self.writer_config,
            max_frame_len: self.max_frame_len,
        }
    }
}

impl<C: Send + Sync + 'static> Default for ServerBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// The dispatcher: a sealed method registry plus the context passed to
/// every handler call.
pub struct RpcServer<C> {
    registry: Arc<MethodRegistry<C>>,
    ctx: Arc<C>,
    writer_config: WriterConfig,
    max_frame_len: usize,
}

impl<C: Send + Sync + 'static> RpcServer<C> {
    /// The handler context.
    pub fn context(&self) -> &C {
        &self.ctx
    }

    /// The sealed method registry.
    pub fn registry(&self) -> &MethodRegistry<C> {
        &self.registry
    }

    /// Run one message through the full pipeline and produce the reply.
    ///
    /// Every failure mode maps to a well-formed error response, with one
    /// exception: when the handler's own result cannot be serialized
    /// there is no way to report that on the same channel, so the
    /// failure is logged and `None` is returned.
    pub fn handle_message(&self, data: &[u8]) -> Option<Response> {
        let request = match Request::decode(data) {
            Ok(r) => r,
            Err(_) => {
                // The real id is unrecoverable from a malformed payload.
                return Some(Response::error(RequestId::zero(), ErrorObject::parse_error()));
            }
        };

        let method = match self.registry.lookup(&request.method) {
            Some(m) => m,
            None => {
                return Some(Response::error(request.id, ErrorObject::method_not_found()));
            }
        };

        match method.invoke(&self.ctx, &request.params) {
            Ok(value) => Some(Response::success(request.id, value)),
            Err(DispatchError::Encode(e)) => {
                tracing::error!(method = %request.method, "dropping unencodable result: {e}");
                None
            }
            Err(e) => Some(Response::error(
                request.id,
                ErrorObject::internal(e.to_string()),
            )),
        }
    }

    /// Handle one message and encode the reply for the wire.
    ///
    /// Returns `None` when nothing should be written (see
    /// [`handle_message`](Self::handle_message)).
    pub fn process(&self, data: &[u8]) -> Option<String> {
        let response = self.handle_message(data)?;
        match JsonCodec::encode(&response) {
            Ok(encoded) => Some(encoded),
            Err(e) => {
                tracing::error!("dropping unencodable response: {e}");
                None
            }
        }
    }

    /// Serve one session over a byte stream.
    ///
    /// Inbound messages are newline-delimited JSON, processed strictly in
    /// order with no internal parallelism: the reply to message N is
    /// queued onto the writer before message N+1 is read, so a client
    /// observes responses in request order. A slow handler stalls the
    /// session; that is the explicit backpressure policy, and handlers
    /// that must not stall detach their work and report through `events`.
    ///
    /// The session's writer is attached to `events` for its lifetime, so
    /// background work emits toward the active connection.
    pub async fn serve_connection<S>(&self, stream: S, events: &EventSender) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (writer, writer_task) = spawn_writer_task(write_half, self.writer_config.clone());

        events.attach(writer.clone());

        let mut lines = BufReader::new(read_half)
            .take(self.max_frame_len as u64)
            .lines();

        let result = loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(()), // clean EOF
                Err(e) => break Err(RpcError::Io(e)),
            };

            // The reader cap is cumulative; rearm it for the next frame.
            lines.get_mut().set_limit(self.max_frame_len as u64);

            if line.len() >= self.max_frame_len {
                break Err(RpcError::Protocol(format!(
                    "inbound frame exceeds {} bytes",
                    self.max_frame_len
                )));
            }

            if line.trim().is_empty() {
                continue;
            }

            if let Some(reply) = self.process(line.as_bytes()) {
                if let Err(e) = writer.send(Bytes::from(reply)).await {
                    tracing::error!("response lost, writer unavailable: {e}");
                    break Err(e);
                }
            }
        };

        events.detach_writer(&writer);
        drop(writer);
        drop(lines);

        // Let the writer drain what was already queued.
        match writer_task.await {
            Ok(task_result) => result.and(task_result),
            Err(e) => {
                tracing::error!("writer task panicked: {e}");
                result
            }
        }
    }

    /// Accept loop over a connection source.
    ///
    /// Each accepted stream becomes an independent session task; sessions
    /// are processed concurrently with no ordering guarantee between
    /// them.
    #[cfg(unix)]
    pub async fn serve(
        self: Arc<Self>,
        listener: crate::transport::ControlListener,
        events: EventSender,
    ) -> Result<()> {
        loop {
            let stream = listener.accept().await?;
            let server = Arc::clone(&self);
            let session_events = events.clone();

            tokio::spawn(async move {
                if let Err(e) = server.serve_connection(stream, &session_events).await {
                    tracing::warn!("session ended with error: {e}");
                }
            });
        }
    }
}
