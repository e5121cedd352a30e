//! `LayerUploader` (C1): wraps `RegistryClient::write_layer` with
//! progress-channel lifecycle management.

use crate::common::{RetryConfig, RetryFn};
use crate::error::Result;
use crate::registry::client::{Layer, ProgressUpdate, RegistryClient};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Progress callback invoked for every update drained off the channel.
pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

const PROGRESS_CHANNEL_CAPACITY: usize = 100;

#[derive(Clone)]
pub struct LayerUploader {
    registry: Arc<dyn RegistryClient>,
}

impl LayerUploader {
    pub fn new(registry: Arc<dyn RegistryClient>) -> Self {
        Self { registry }
    }

    /// Uploads `layer` to `repo`. When `on_progress` is given, a buffered
    /// channel and dedicated consumer task relay updates to it; the
    /// registry client sends on the channel but never closes it — this
    /// method closes it only after `write_layer` returns, and always
    /// waits for the consumer task to drain before returning. A naive
    /// implementation that closes the channel before `write_layer`
    /// returns would trigger a send-on-closed-channel fault in the
    /// registry client; one that never closes it would leak the consumer
    /// task.
    pub async fn upload_layer(
        &self,
        repo: &str,
        layer: Arc<dyn Layer>,
        on_progress: Option<ProgressFn>,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.upload_layer_with_retry(repo, layer, on_progress, None, None, cancel)
            .await
    }

    /// Like [`Self::upload_layer`], but also threads an optional retry
    /// config and callback through to `RegistryClient::write_layer`.
    /// `WeightPusher` is the one caller that exercises this;
    /// `ImagePusher` always calls [`Self::upload_layer`] since an OCI push
    /// failure there is handled by falling back to the daemon path instead
    /// of retrying in place.
    pub async fn upload_layer_with_retry(
        &self,
        repo: &str,
        layer: Arc<dyn Layer>,
        on_progress: Option<ProgressFn>,
        retry: Option<RetryConfig>,
        retry_fn: Option<RetryFn>,
        cancel: CancellationToken,
    ) -> Result<()> {
        match on_progress {
            Some(callback) => {
                let (tx, mut rx) = mpsc::channel::<ProgressUpdate>(PROGRESS_CHANNEL_CAPACITY);
                let consumer = tokio::spawn(async move {
                    while let Some(update) = rx.recv().await {
                        callback(update);
                    }
                });

                let result = self
                    .registry
                    .write_layer(repo, layer, Some(tx.clone()), retry, retry_fn, cancel)
                    .await;
                drop(tx);
                let _ = consumer.await;
                result
            }
            None => {
                self.registry
                    .write_layer(repo, layer, None, retry, retry_fn, cancel)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PusherError;
    use crate::registry::client::{Index, ManifestDoc};
    use crate::model::Descriptor;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeLayer;
    impl Layer for FakeLayer {
        fn digest(&self) -> &str {
            "sha256:fake"
        }
        fn diff_id(&self) -> &str {
            "sha256:fake"
        }
        fn size(&self) -> u64 {
            3
        }
        fn media_type(&self) -> &str {
            "application/octet-stream"
        }
        fn compressed(&self) -> Result<Box<dyn std::io::Read + Send>> {
            Ok(Box::new(Cursor::new(vec![1, 2, 3])))
        }
        fn uncompressed(&self) -> Result<Box<dyn std::io::Read + Send>> {
            self.compressed()
        }
    }

    struct ProgressEmittingRegistry;
    #[async_trait]
    impl RegistryClient for ProgressEmittingRegistry {
        async fn write_layer(
            &self,
            _repo: &str,
            _layer: Arc<dyn Layer>,
            progress: Option<mpsc::Sender<ProgressUpdate>>,
            _retry: Option<crate::common::RetryConfig>,
            _retry_fn: Option<crate::common::RetryFn>,
            _cancel: CancellationToken,
        ) -> Result<()> {
            if let Some(tx) = progress {
                for complete in [1, 2, 3] {
                    tx.send(ProgressUpdate { complete, total: 3 }).await.unwrap();
                }
            }
            Ok(())
        }
        async fn push_image(&self, _reference: &str, _manifest: &ManifestDoc) -> Result<()> {
            Ok(())
        }
        async fn push_index(&self, _reference: &str, _index: &Index) -> Result<()> {
            Ok(())
        }
        async fn get_descriptor(&self, _reference: &str) -> Result<Descriptor> {
            unimplemented!()
        }
    }

    struct FailingRegistry;
    #[async_trait]
    impl RegistryClient for FailingRegistry {
        async fn write_layer(
            &self,
            _repo: &str,
            _layer: Arc<dyn Layer>,
            _progress: Option<mpsc::Sender<ProgressUpdate>>,
            _retry: Option<crate::common::RetryConfig>,
            _retry_fn: Option<crate::common::RetryFn>,
            _cancel: CancellationToken,
        ) -> Result<()> {
            Err(PusherError::TransientRegistryError("connection reset".into()))
        }
        async fn push_image(&self, _reference: &str, _manifest: &ManifestDoc) -> Result<()> {
            Ok(())
        }
        async fn push_index(&self, _reference: &str, _index: &Index) -> Result<()> {
            Ok(())
        }
        async fn get_descriptor(&self, _reference: &str) -> Result<Descriptor> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn progress_updates_are_forwarded_and_drained() {
        let uploader = LayerUploader::new(Arc::new(ProgressEmittingRegistry));
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let callback: ProgressFn = Arc::new(move |update| {
            received_clone.lock().unwrap().push(update.complete);
        });

        uploader
            .upload_layer("r8.im/u/m", Arc::new(FakeLayer), Some(callback), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*received.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn error_is_surfaced_verbatim_and_progress_still_drains() {
        let uploader = LayerUploader::new(Arc::new(FailingRegistry));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let callback: ProgressFn = Arc::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let err = uploader
            .upload_layer("r8.im/u/m", Arc::new(FakeLayer), Some(callback), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PusherError::TransientRegistryError(_)));
    }

    #[tokio::test]
    async fn upload_without_progress_callback_skips_channel_setup() {
        let uploader = LayerUploader::new(Arc::new(ProgressEmittingRegistry));
        uploader
            .upload_layer("r8.im/u/m", Arc::new(FakeLayer), None, CancellationToken::new())
            .await
            .unwrap();
    }
}
