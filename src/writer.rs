//! Dedicated writer task serializing all outbound messages.
//!
//! The transport sink is not assumed safe for concurrent writers: an
//! in-flight response and an asynchronously emitted event must never
//! interleave on the wire. All outbound messages therefore funnel through
//! a single writer task fed by an mpsc channel.
//!
//! # Architecture
//!
//! ```text
//! Session loop ──┐
//! Event emitter ─┼─► mpsc::Sender<Bytes> ─► Writer Task ─► sink
//! Background    ─┘
//! ```
//!
//! Messages are framed as one line of JSON each; the writer appends the
//! trailing newline. Write failures are logged and terminate the task -
//! the message is considered lost, there is no retry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, RpcError};

/// Default maximum pending messages before backpressure kicks in.
pub const DEFAULT_MAX_PENDING_MESSAGES: usize = 256;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Default backpressure timeout.
pub const DEFAULT_BACKPRESSURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum messages to drain per wakeup before flushing.
const MAX_BATCH_SIZE: usize = 32;

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Maximum pending messages before backpressure kicks in.
    pub max_pending_messages: usize,
    /// Channel capacity for the outbound queue.
    pub channel_capacity: usize,
    /// Timeout when waiting for backpressure to clear.
    pub backpressure_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_pending_messages: DEFAULT_MAX_PENDING_MESSAGES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            backpressure_timeout: DEFAULT_BACKPRESSURE_TIMEOUT,
        }
    }
}

/// Handle for queueing messages onto the writer task.
///
/// Cheaply cloneable; the session loop and the event emitter share one.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Bytes>,
    pending: Arc<AtomicUsize>,
    max_pending: usize,
    timeout: Duration,
}

impl WriterHandle {
    fn new(
        tx: mpsc::Sender<Bytes>,
        pending: Arc<AtomicUsize>,
        max_pending: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            tx,
            pending,
            max_pending,
            timeout,
        }
    }

    /// Queue a message, waiting out backpressure up to the configured
    /// timeout.
    pub async fn send(&self, message: Bytes) -> Result<()> {
        if self.pending.load(Ordering::Acquire) >= self.max_pending {
            self.wait_for_backpressure().await?;
        }

        self.pending.fetch_add(1, Ordering::AcqRel);

        self.tx.send(message).await.map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            RpcError::ConnectionClosed
        })
    }

    /// Queue a message without waiting; rejects immediately at capacity.
    ///
    /// Used by the event path, which is fire-and-forget by contract.
    pub fn try_send(&self, message: Bytes) -> Result<()> {
        if self.pending.load(Ordering::Acquire) >= self.max_pending {
            return Err(RpcError::BackpressureTimeout);
        }

        self.pending.fetch_add(1, Ordering::AcqRel);

        self.tx.try_send(message).map_err(|e| {
            self.pending.fetch_sub(1, Ordering::Release);
            match e {
                mpsc::error::TrySendError::Full(_) => RpcError::BackpressureTimeout,
                mpsc::error::TrySendError::Closed(_) => RpcError::ConnectionClosed,
            }
        })
    }

    async fn wait_for_backpressure(&self) -> Result<()> {
        let start = Instant::now();
        let check_interval = Duration::from_micros(100);

        loop {
            if self.pending.load(Ordering::Acquire) < self.max_pending {
                return Ok(());
            }

            if start.elapsed() > self.timeout {
                return Err(RpcError::BackpressureTimeout);
            }

            tokio::time::sleep(check_interval).await;
        }
    }

    /// Whether two handles feed the same writer task.
    #[inline]
    pub fn same_channel(&self, other: &WriterHandle) -> bool {
        self.tx.same_channel(&other.tx)
    }

    /// Check whether backpressure is currently active.
    #[inline]
    pub fn is_backpressure_active(&self) -> bool {
        self.pending.load(Ordering::Acquire) >= self.max_pending
    }

    /// Current pending message count.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

/// Spawn the writer task and return a handle for queueing messages.
///
/// The task ends when every handle is dropped (clean shutdown) or the
/// sink rejects a write.
pub fn spawn_writer_task<W>(sink: W, config: WriterConfig) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle::new(
        tx,
        pending.clone(),
        config.max_pending_messages,
        config.backpressure_timeout,
    );

    let task = tokio::spawn(writer_loop(rx, sink, pending));

    (handle, task)
}

/// Spawn the writer task with default configuration.
pub fn spawn_writer_task_default<W>(sink: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    spawn_writer_task(sink, WriterConfig::default())
}

/// Main writer loop: drain queued messages in arrival order, newline
/// after each, one flush per batch.
async fn writer_loop<W>(
    mut rx: mpsc::Receiver<Bytes>,
    mut sink: W,
    pending: Arc<AtomicUsize>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(m) => m,
            None => return Ok(()), // all handles dropped
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(message) => batch.push(message),
                Err(_) => break,
            }
        }

        let batch_size = batch.len();
        let result = write_batch(&mut sink, &batch).await;
        pending.fetch_sub(batch_size, Ordering::Release);

        if let Err(e) = result {
            tracing::error!("writer task stopping, sink rejected write: {e}");
            return Err(e);
        }
    }
}

async fn write_batch<W>(sink: &mut W, batch: &[Bytes]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    for message in batch {
        sink.write_all(message).await?;
        sink.write_all(b"\n").await?;
    }
    sink.flush().await?;
    Ok(())
}
