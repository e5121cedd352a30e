//! `ImagePusher` (C5): dual-path image push — OCI chunked upload with
//! selective fallback to the daemon push on non-fatal failure.

use crate::common;
use crate::concurrency;
use crate::config::PushConfig;
use crate::error::{self, PusherError, Result};
use crate::image::TarImage;
use crate::logging::Logger;
use crate::media_types;
use crate::model::ImageArtifact;
use crate::registry::client::Layer;
use crate::registry::{DaemonClient, RegistryClient};
use crate::upload::{ConfigBlobLayer, LayerUploader, ProgressFn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Invoked once the OCI path has failed and a fallback to the daemon push
/// is about to begin, so the caller can clear any OCI-specific progress UI.
pub type FallbackFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
pub struct ImagePushOptions {
    pub progress: Option<ProgressFn>,
    pub on_fallback: Option<FallbackFn>,
}

pub struct ImagePusher {
    registry: Arc<dyn RegistryClient>,
    daemon: Arc<dyn DaemonClient>,
    config: PushConfig,
    logger: Logger,
}

impl ImagePusher {
    pub fn new(registry: Arc<dyn RegistryClient>, daemon: Arc<dyn DaemonClient>, config: PushConfig) -> Self {
        Self {
            registry,
            daemon,
            config,
            logger: Logger::new(false),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub async fn push(
        &self,
        artifact: &ImageArtifact,
        cancel: CancellationToken,
        opts: ImagePushOptions,
    ) -> Result<()> {
        if artifact.reference.is_empty() {
            return Err(PusherError::InvalidArgument("image reference is empty".into()));
        }
        if cancel.is_cancelled() {
            return Err(PusherError::Cancelled);
        }

        if !self.config.oci_enabled {
            return error::context(self.daemon.push(&artifact.reference).await, "daemon push");
        }

        match self.try_oci_push(artifact, cancel, opts.progress.clone()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if error::should_fallback_to_docker(&e) {
                    if let Some(on_fallback) = &opts.on_fallback {
                        on_fallback();
                    }
                    self.logger.warning(&format!(
                        "OCI push failed, falling back to daemon push: {}",
                        error::sanitize_error_message(&e.to_string())
                    ));
                    error::context(self.daemon.push(&artifact.reference).await, "daemon push fallback")
                } else {
                    error::context(Err(e), "OCI chunked push")
                }
            }
        }
    }

    async fn try_oci_push(
        &self,
        artifact: &ImageArtifact,
        cancel: CancellationToken,
        progress: Option<ProgressFn>,
    ) -> Result<()> {
        let export_stream = error::context(
            self.daemon.image_save(&artifact.reference).await,
            "daemon image export",
        )?;

        let temp_file = tempfile::NamedTempFile::new()?;
        let temp_path = temp_file.path().to_path_buf();
        persist_export(export_stream, &temp_path).await?;

        let repo = common::repo_from_reference(&artifact.reference);
        let temp_path_for_index = temp_path.clone();
        let image = tokio::task::spawn_blocking(move || TarImage::open(&temp_path_for_index))
            .await
            .map_err(|e| PusherError::ExportFailed(e.to_string()))??;

        let config_layer: Arc<dyn Layer> = Arc::new(ConfigBlobLayer::new(
            image.config_bytes(),
            media_types::IMAGE_CONFIG,
        ));

        let mut items: Vec<Arc<dyn Layer>> = image.layers();
        items.push(config_layer.clone());

        let uploader = LayerUploader::new(self.registry.clone());
        let limit = concurrency::get_push_concurrency();
        let repo_for_task = repo.clone();
        error::context(
            concurrency::run_bounded(items, limit, cancel.clone(), move |layer, cancel| {
                let uploader = uploader.clone();
                let repo = repo_for_task.clone();
                let progress = progress.clone();
                async move { uploader.upload_layer(&repo, layer, progress, cancel).await }
            })
            .await,
            "write layer",
        )?;

        let manifest = image.build_manifest(config_layer.as_ref());
        error::context(
            self.registry.push_image(&artifact.reference, &manifest).await,
            "push image manifest",
        )?;

        drop(temp_file);
        Ok(())
    }
}

async fn persist_export(
    mut stream: Box<dyn tokio::io::AsyncRead + Send + Unpin>,
    dest: &std::path::Path,
) -> Result<()> {
    let mut file = tokio::fs::File::create(dest).await?;
    tokio::io::copy(&mut stream, &mut file).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Descriptor;
    use crate::registry::client::{Index, ManifestDoc, ProgressUpdate};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::AsyncRead;

    fn docker_save_tar(layers: usize) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let append = |b: &mut tar::Builder<Vec<u8>>, name: &str, content: &[u8]| {
            let mut header = tar::Header::new_ustar();
            header.set_path(name).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            b.append(&header, std::io::Cursor::new(content)).unwrap();
        };
        append(&mut builder, "config.json", br#"{"architecture":"amd64"}"#);
        let layer_names: Vec<String> = (0..layers).map(|i| format!("layer{i}/layer.tar")).collect();
        for name in &layer_names {
            append(&mut builder, name, b"layer content bytes");
        }
        let manifest = serde_json::json!([{
            "Config": "config.json",
            "RepoTags": ["example:latest"],
            "Layers": layer_names,
        }]);
        append(&mut builder, "manifest.json", manifest.to_string().as_bytes());
        builder.into_inner().unwrap()
    }

    struct CountingDaemon {
        tar_bytes: Vec<u8>,
        push_calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DaemonClient for CountingDaemon {
        async fn image_save(&self, _reference: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
            Ok(Box::new(std::io::Cursor::new(self.tar_bytes.clone())))
        }
        async fn push(&self, _reference: &str) -> Result<()> {
            self.push_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CountingRegistry {
        write_layer_calls: Arc<AtomicUsize>,
        push_image_calls: Arc<AtomicUsize>,
        fail_write_layer: Option<PusherError>,
    }

    #[async_trait]
    impl RegistryClient for CountingRegistry {
        async fn write_layer(
            &self,
            _repo: &str,
            _layer: Arc<dyn Layer>,
            _progress: Option<tokio::sync::mpsc::Sender<ProgressUpdate>>,
            _retry: Option<crate::common::RetryConfig>,
            _retry_fn: Option<crate::common::RetryFn>,
            _cancel: CancellationToken,
        ) -> Result<()> {
            self.write_layer_calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_write_layer {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }
        async fn push_image(&self, _reference: &str, _manifest: &ManifestDoc) -> Result<()> {
            self.push_image_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn push_index(&self, _reference: &str, _index: &Index) -> Result<()> {
            Ok(())
        }
        async fn get_descriptor(&self, _reference: &str) -> Result<Descriptor> {
            unimplemented!()
        }
    }

    fn artifact() -> ImageArtifact {
        ImageArtifact::new("r8.im/u/m:v1")
    }

    #[tokio::test]
    async fn happy_path_pushes_every_layer_plus_config_and_manifest() {
        let write_layer_calls = Arc::new(AtomicUsize::new(0));
        let push_image_calls = Arc::new(AtomicUsize::new(0));
        let push_calls = Arc::new(AtomicUsize::new(0));

        let registry = Arc::new(CountingRegistry {
            write_layer_calls: write_layer_calls.clone(),
            push_image_calls: push_image_calls.clone(),
            fail_write_layer: None,
        });
        let daemon = Arc::new(CountingDaemon {
            tar_bytes: docker_save_tar(2),
            push_calls: push_calls.clone(),
        });

        let pusher = ImagePusher::new(registry, daemon, PushConfig { oci_enabled: true, index_enabled: false });
        pusher
            .push(&artifact(), CancellationToken::new(), ImagePushOptions::default())
            .await
            .unwrap();

        assert_eq!(write_layer_calls.load(Ordering::SeqCst), 3);
        assert_eq!(push_image_calls.load(Ordering::SeqCst), 1);
        assert_eq!(push_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_image_pushes_config_only() {
        let write_layer_calls = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(CountingRegistry {
            write_layer_calls: write_layer_calls.clone(),
            push_image_calls: Arc::new(AtomicUsize::new(0)),
            fail_write_layer: None,
        });
        let daemon = Arc::new(CountingDaemon {
            tar_bytes: docker_save_tar(0),
            push_calls: Arc::new(AtomicUsize::new(0)),
        });

        let pusher = ImagePusher::new(registry, daemon, PushConfig { oci_enabled: true, index_enabled: false });
        pusher
            .push(&artifact(), CancellationToken::new(), ImagePushOptions::default())
            .await
            .unwrap();

        assert_eq!(write_layer_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failure_falls_back_to_daemon_push() {
        let push_calls = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(CountingRegistry {
            write_layer_calls: Arc::new(AtomicUsize::new(0)),
            push_image_calls: Arc::new(AtomicUsize::new(0)),
            fail_write_layer: Some(PusherError::TransientRegistryError("connection reset".into())),
        });
        let daemon = Arc::new(CountingDaemon {
            tar_bytes: docker_save_tar(1),
            push_calls: push_calls.clone(),
        });

        let fallback_invoked = Arc::new(AtomicUsize::new(0));
        let fallback_invoked_clone = fallback_invoked.clone();
        let opts = ImagePushOptions {
            progress: None,
            on_fallback: Some(Arc::new(move || {
                fallback_invoked_clone.fetch_add(1, Ordering::SeqCst);
            })),
        };

        let pusher = ImagePusher::new(registry, daemon, PushConfig { oci_enabled: true, index_enabled: false });
        pusher
            .push(&artifact(), CancellationToken::new(), opts)
            .await
            .unwrap();

        assert_eq!(push_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_invoked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auth_failure_does_not_fall_back() {
        let push_calls = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(CountingRegistry {
            write_layer_calls: Arc::new(AtomicUsize::new(0)),
            push_image_calls: Arc::new(AtomicUsize::new(0)),
            fail_write_layer: Some(PusherError::AuthFailed("401".into())),
        });
        let daemon = Arc::new(CountingDaemon {
            tar_bytes: docker_save_tar(1),
            push_calls: push_calls.clone(),
        });

        let pusher = ImagePusher::new(registry, daemon, PushConfig { oci_enabled: true, index_enabled: false });
        let err = pusher
            .push(&artifact(), CancellationToken::new(), ImagePushOptions::default())
            .await
            .unwrap_err();

        assert_eq!(push_calls.load(Ordering::SeqCst), 0);
        assert!(err.to_string().contains("OCI chunked push"));
        assert!(matches!(err, PusherError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn cancelled_before_push_never_attempts_daemon_fallback() {
        let push_calls = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(CountingRegistry {
            write_layer_calls: Arc::new(AtomicUsize::new(0)),
            push_image_calls: Arc::new(AtomicUsize::new(0)),
            fail_write_layer: None,
        });
        let daemon = Arc::new(CountingDaemon {
            tar_bytes: docker_save_tar(1),
            push_calls: push_calls.clone(),
        });

        let cancel = CancellationToken::new();
        cancel.cancel();

        let pusher = ImagePusher::new(registry, daemon, PushConfig { oci_enabled: true, index_enabled: false });
        let err = pusher
            .push(&artifact(), cancel, ImagePushOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PusherError::Cancelled));
        assert_eq!(push_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_reference_is_rejected_before_any_io() {
        let registry = Arc::new(CountingRegistry {
            write_layer_calls: Arc::new(AtomicUsize::new(0)),
            push_image_calls: Arc::new(AtomicUsize::new(0)),
            fail_write_layer: None,
        });
        let daemon = Arc::new(CountingDaemon {
            tar_bytes: docker_save_tar(0),
            push_calls: Arc::new(AtomicUsize::new(0)),
        });

        let pusher = ImagePusher::new(registry, daemon, PushConfig { oci_enabled: true, index_enabled: false });
        let artifact = ImageArtifact::new("");
        let err = pusher
            .push(&artifact, CancellationToken::new(), ImagePushOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PusherError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn oci_disabled_pushes_via_daemon_directly() {
        let push_calls = Arc::new(AtomicUsize::new(0));
        let write_layer_calls = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(CountingRegistry {
            write_layer_calls: write_layer_calls.clone(),
            push_image_calls: Arc::new(AtomicUsize::new(0)),
            fail_write_layer: None,
        });
        let daemon = Arc::new(CountingDaemon {
            tar_bytes: docker_save_tar(1),
            push_calls: push_calls.clone(),
        });

        let pusher = ImagePusher::new(registry, daemon, PushConfig { oci_enabled: false, index_enabled: false });
        pusher
            .push(&artifact(), CancellationToken::new(), ImagePushOptions::default())
            .await
            .unwrap();

        assert_eq!(push_calls.load(Ordering::SeqCst), 1);
        assert_eq!(write_layer_calls.load(Ordering::SeqCst), 0);
    }
}
