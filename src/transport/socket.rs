//! Unix domain control socket.
//!
//! # Example
//!
//! ```ignore
//! use kvmlink::transport::ControlListener;
//!
//! let listener = ControlListener::bind("/run/kvmlink/rpc.sock").await?;
//! let stream = listener.accept().await?;
//! ```

use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};

use crate::error::Result;

/// Listener on the appliance control socket.
pub struct ControlListener {
    inner: UnixListener,
    path: PathBuf,
}

impl ControlListener {
    /// Bind the control socket, replacing a stale socket file left over
    /// from an unclean shutdown.
    pub async fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!("removed stale control socket at {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let inner = UnixListener::bind(&path)?;
        Ok(Self { inner, path })
    }

    /// Accept one client connection.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.inner.accept().await?;
        Ok(stream)
    }

    /// Path the socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ControlListener {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!("failed to remove control socket: {e}");
            }
        }
    }
}
