//! Fire-and-forget server -> client event path.
//!
//! Events bypass the request/response cycle entirely: no id, no reply, no
//! acknowledgment. Long-running handler-side work (an update download, a
//! media mount) detaches itself and reports progress here.
//!
//! The sender is created detached; a session attaches its writer handle on
//! connect and detaches on close. Emitting with no sink attached is a
//! logged no-op, never an error - there is nobody to report it to.

use std::sync::{Arc, RwLock};

use bytes::Bytes;

use crate::codec::JsonCodec;
use crate::protocol::Event;
use crate::writer::WriterHandle;

/// Shared handle for emitting events toward the currently attached
/// session.
///
/// Cheaply cloneable; handlers and background tasks keep clones. When
/// several sessions are alive the most recently attached one receives
/// events.
#[derive(Clone, Default)]
pub struct EventSender {
    sink: Arc<RwLock<Option<WriterHandle>>>,
}

impl EventSender {
    /// Create a detached sender.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the writer of the active session.
    pub fn attach(&self, writer: WriterHandle) {
        *self.write_lock() = Some(writer);
    }

    /// Detach the current sink; subsequent emits become no-ops.
    pub fn detach(&self) {
        *self.write_lock() = None;
    }

    /// Detach only if `writer` is still the attached sink.
    ///
    /// A session ending must not tear down the sink of a session that
    /// attached after it.
    pub fn detach_writer(&self, writer: &WriterHandle) {
        let mut guard = self.write_lock();
        if guard.as_ref().is_some_and(|w| w.same_channel(writer)) {
            *guard = None;
        }
    }

    /// Whether a sink is currently attached.
    pub fn is_attached(&self) -> bool {
        self.read_lock().is_some()
    }

    /// Emit an event toward the client.
    ///
    /// Fire-and-forget: encoding failures, a detached sink and a full
    /// outbound queue are all logged and swallowed. Callable from
    /// synchronous handler code.
    pub fn emit<T: serde::Serialize>(&self, method: &str, params: &T) {
        let payload = match JsonCodec::to_value(params) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("failed to encode event {method}: {e}");
                return;
            }
        };

        let encoded = match JsonCodec::encode(&Event::new(method, payload)) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("failed to encode event {method}: {e}");
                return;
            }
        };

        let guard = self.read_lock();
        match guard.as_ref() {
            None => {
                tracing::debug!("event sink not attached, dropping event {method}");
            }
            Some(writer) => {
                if let Err(e) = writer.try_send(Bytes::from(encoded)) {
                    tracing::warn!("failed to queue event {method}: {e}");
                }
            }
        }
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, Option<WriterHandle>> {
        self.sink.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Option<WriterHandle>> {
        self.sink.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::spawn_writer_task_default;
    use serde_json::{json, Value};
    use tokio::io::{duplex, AsyncBufReadExt, BufReader};

    #[test]
    fn test_emit_without_sink_is_noop() {
        let events = EventSender::new();
        assert!(!events.is_attached());

        // Must not panic or error.
        events.emit("otaState", &json!({"progress": 10}));
    }

    #[tokio::test]
    async fn test_emit_writes_event_envelope() {
        let (client, server) = duplex(4096);
        let (writer, _task) = spawn_writer_task_default(client);

        let events = EventSender::new();
        events.attach(writer);
        assert!(events.is_attached());

        events.emit("usbState", &json!({"configured": true}));

        let mut lines = BufReader::new(server).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        let parsed: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(parsed["jsonrpc"], "2.0");
        assert_eq!(parsed["method"], "usbState");
        assert_eq!(parsed["params"]["configured"], json!(true));
        assert!(parsed.get("id").is_none());
    }

    #[tokio::test]
    async fn test_null_params_are_omitted() {
        let (client, server) = duplex(4096);
        let (writer, _task) = spawn_writer_task_default(client);

        let events = EventSender::new();
        events.attach(writer);
        events.emit("updatePending", &Value::Null);

        let mut lines = BufReader::new(server).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        let parsed: Value = serde_json::from_str(&line).unwrap();

        assert!(parsed.get("params").is_none());
    }

    #[tokio::test]
    async fn test_stale_detach_keeps_newer_sink() {
        let (client_a, _server_a) = duplex(4096);
        let (writer_a, _task_a) = spawn_writer_task_default(client_a);
        let (client_b, _server_b) = duplex(4096);
        let (writer_b, _task_b) = spawn_writer_task_default(client_b);

        let events = EventSender::new();
        events.attach(writer_a.clone());
        events.attach(writer_b.clone());

        // Session A ending must not tear down session B's sink.
        events.detach_writer(&writer_a);
        assert!(events.is_attached());

        events.detach_writer(&writer_b);
        assert!(!events.is_attached());
    }

    #[tokio::test]
    async fn test_emit_after_detach_is_noop() {
        let (client, server) = duplex(4096);
        let (writer, _task) = spawn_writer_task_default(client);

        let events = EventSender::new();
        events.attach(writer);
        events.detach();
        assert!(!events.is_attached());

        events.emit("otaState", &json!({"progress": 50}));

        // Detach dropped the only writer handle, so the writer task ends
        // without having written anything and the reader sees a clean EOF.
        let mut lines = BufReader::new(server).lines();
        assert!(lines.next_line().await.unwrap().is_none());
    }
}
