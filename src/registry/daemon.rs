//! The daemon exporter contract (`ImageSave`, `Push`) and the one
//! shell-backed implementation this crate ships.

use crate::error::{PusherError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::Command;

/// Out of scope: the daemon-based image exporter and fallback
/// pusher. `ImagePusher` depends only on this trait so the fallback path
/// can be exercised against an in-memory mock in tests.
#[async_trait]
pub trait DaemonClient: Send + Sync {
    /// Produces a daemon-format image archive (tar containing manifests +
    /// layer tarballs) for `reference`.
    async fn image_save(&self, reference: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>>;

    /// Daemon-native push fallback.
    async fn push(&self, reference: &str) -> Result<()>;
}

/// Shells out to the local Docker/Podman CLI. The binary name is
/// configurable so Podman-only hosts can be supported without a second
/// implementation.
pub struct ShellDaemonClient {
    binary: String,
}

impl ShellDaemonClient {
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for ShellDaemonClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DaemonClient for ShellDaemonClient {
    async fn image_save(&self, reference: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        let mut child = Command::new(&self.binary)
            .args(["save", reference])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PusherError::ExportFailed(format!("spawn `{} save`: {e}", self.binary)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PusherError::ExportFailed("daemon save produced no stdout".into()))?;

        // The child is left to run to completion independently; the reader
        // end of the pipe is what callers consume. If `save` exits non-zero
        // the pipe simply closes early and the downstream tar read fails,
        // which surfaces as an ExportFailed at the point of use.
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        Ok(Box::new(stdout))
    }

    async fn push(&self, reference: &str) -> Result<()> {
        let output = Command::new(&self.binary)
            .args(["push", reference])
            .output()
            .await
            .map_err(|e| PusherError::ExportFailed(format!("spawn `{} push`: {e}", self.binary)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(PusherError::ExportFailed(format!(
                "`{} push {reference}` failed: {}",
                self.binary,
                String::from_utf8_lossy(&output.stderr)
            )))
        }
    }
}
