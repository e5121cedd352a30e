//! `BundlePusher` (C8): orchestrates `ImagePusher`, `WeightPusher`, and
//! `IndexBuilder` — image push → descriptor fetch → concurrent weight push
//! → index push.

use crate::common;
use crate::concurrency;
use crate::config::PushConfig;
use crate::error::{self, Result};
use crate::model::{Model, Platform};
use crate::push::image_pusher::{ImagePushOptions, ImagePusher};
use crate::push::index_builder::{IndexBuilder, WeightDescriptorEntry};
use crate::push::weight_pusher::{WeightPushOptions, WeightPusher};
use crate::registry::{DaemonClient, RegistryClient};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
pub struct BundlePushOptions {
    pub platform: Option<Platform>,
}

pub struct BundlePusher {
    registry: Arc<dyn RegistryClient>,
    daemon: Arc<dyn DaemonClient>,
    config: PushConfig,
}

impl BundlePusher {
    pub fn new(registry: Arc<dyn RegistryClient>, daemon: Arc<dyn DaemonClient>, config: PushConfig) -> Self {
        Self {
            registry,
            daemon,
            config,
        }
    }

    /// Not transactional: a failure between the image push and the index
    /// push leaves orphaned blobs in the registry and the tag possibly
    /// unmoved. Registries garbage-collect unreferenced blobs, so this is
    /// acceptable, but callers should not assume all-or-nothing semantics.
    pub async fn push(&self, model: &Model, opts: BundlePushOptions) -> Result<()> {
        let repo = common::repo_from_reference(&model.image.reference);
        let cancel = CancellationToken::new();

        let image_pusher = ImagePusher::new(self.registry.clone(), self.daemon.clone(), self.config);
        image_pusher
            .push(&model.image, cancel.clone(), ImagePushOptions::default())
            .await?;

        let image_descriptor = self.registry.get_descriptor(&model.image.reference).await?;
        let image_digest = image_descriptor.digest.clone();
        let platform = opts.platform.unwrap_or_else(Platform::linux_amd64);

        let weight_entries = if model.weights.is_empty() {
            Vec::new()
        } else {
            let registry = self.registry.clone();
            let repo = repo.clone();
            let image_digest = image_digest.clone();
            let limit = concurrency::get_push_concurrency();

            concurrency::run_bounded_collect(
                model.weights.clone(),
                limit,
                cancel.clone(),
                move |artifact, cancel| {
                    let registry = registry.clone();
                    let repo = repo.clone();
                    async move {
                        let pusher = WeightPusher::new(registry);
                        let result = pusher
                            .push(&repo, &artifact, WeightPushOptions::default(), cancel)
                            .await;
                        let result = error::context(result, &format!("push weight \"{}\"", artifact.name))?;
                        Ok(WeightDescriptorEntry {
                            descriptor: result.descriptor,
                            name: artifact.name.clone(),
                            target: artifact.target.clone(),
                        })
                    }
                },
            )
            .await?
        };

        let index = IndexBuilder::build(image_descriptor, platform, &weight_entries, &image_digest);
        self.registry.push_index(&model.image.reference, &index).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Descriptor, ImageArtifact, WeightArtifact};
    use crate::registry::client::{Index, Layer, ManifestDoc, ProgressUpdate};
    use crate::weights::WeightConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::io::AsyncRead;

    fn docker_save_tar() -> Vec<u8> {
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
        let manifest = serde_json::json!([{
            "Config": "config.json",
            "RepoTags": ["example:latest"],
            "Layers": [],
        }]);
        append(&mut builder, "manifest.json", manifest.to_string().as_bytes());
        builder.into_inner().unwrap()
    }

    struct FakeDaemon {
        tar_bytes: Vec<u8>,
    }

    #[async_trait]
    impl DaemonClient for FakeDaemon {
        async fn image_save(&self, _reference: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
            Ok(Box::new(std::io::Cursor::new(self.tar_bytes.clone())))
        }
        async fn push(&self, _reference: &str) -> Result<()> {
            Ok(())
        }
    }

    struct BundleRegistry {
        write_layer_calls: Arc<AtomicUsize>,
        push_image_calls: Arc<AtomicUsize>,
        get_descriptor_calls: Arc<AtomicUsize>,
        push_index_calls: Arc<Mutex<Vec<Index>>>,
    }

    #[async_trait]
    impl RegistryClient for BundleRegistry {
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
            Ok(())
        }
        async fn push_image(&self, _reference: &str, _manifest: &ManifestDoc) -> Result<()> {
            self.push_image_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn push_index(&self, _reference: &str, index: &Index) -> Result<()> {
            self.push_index_calls.lock().unwrap().push(index.clone());
            Ok(())
        }
        async fn get_descriptor(&self, _reference: &str) -> Result<Descriptor> {
            self.get_descriptor_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Descriptor {
                media_type: crate::media_types::IMAGE_MANIFEST.to_string(),
                size: 100,
                digest: "sha256:imagedigest".to_string(),
            })
        }
    }

    fn weight_artifact(dir: &std::path::Path, name: &str) -> WeightArtifact {
        let path = dir.join(format!("{name}.safetensors"));
        std::fs::write(&path, b"weight bytes for bundle test").unwrap();
        WeightArtifact {
            name: name.to_string(),
            file_path: path,
            target: format!("/weights/{name}.safetensors"),
            config: WeightConfig::new("0.15.0", name, format!("/weights/{name}.safetensors")),
        }
    }

    #[tokio::test]
    async fn bundle_with_three_weights_pushes_four_manifest_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = Model::new(ImageArtifact::new("r8.im/u/m:v1"), "0.15.0");
        model.weights = vec![
            weight_artifact(dir.path(), "w0"),
            weight_artifact(dir.path(), "w1"),
            weight_artifact(dir.path(), "w2"),
        ];

        let push_index_calls = Arc::new(Mutex::new(Vec::new()));
        let registry = Arc::new(BundleRegistry {
            write_layer_calls: Arc::new(AtomicUsize::new(0)),
            push_image_calls: Arc::new(AtomicUsize::new(0)),
            get_descriptor_calls: Arc::new(AtomicUsize::new(0)),
            push_index_calls: push_index_calls.clone(),
        });
        let daemon = Arc::new(FakeDaemon { tar_bytes: docker_save_tar() });

        let pusher = BundlePusher::new(
            registry.clone(),
            daemon,
            PushConfig { oci_enabled: true, index_enabled: true },
        );
        pusher.push(&model, BundlePushOptions::default()).await.unwrap();

        assert_eq!(registry.get_descriptor_calls.load(Ordering::SeqCst), 1);
        let indexes = push_index_calls.lock().unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].manifests.len(), 4);
        assert_eq!(
            indexes[0].manifests.iter().filter(|m| m.platform.is_some()).count(),
            1
        );
        for m in indexes[0].manifests.iter().skip(1) {
            let annotations = m.annotations.as_ref().unwrap();
            assert_eq!(
                annotations.get(crate::media_types::ANNOTATION_REFERENCE_DIGEST).unwrap(),
                "sha256:imagedigest"
            );
        }
    }

    #[tokio::test]
    async fn standalone_model_pushes_single_manifest_index() {
        let model = Model::new(ImageArtifact::new("r8.im/u/m:v1"), "0.15.0");

        let push_index_calls = Arc::new(Mutex::new(Vec::new()));
        let registry = Arc::new(BundleRegistry {
            write_layer_calls: Arc::new(AtomicUsize::new(0)),
            push_image_calls: Arc::new(AtomicUsize::new(0)),
            get_descriptor_calls: Arc::new(AtomicUsize::new(0)),
            push_index_calls: push_index_calls.clone(),
        });
        let daemon = Arc::new(FakeDaemon { tar_bytes: docker_save_tar() });

        let pusher = BundlePusher::new(
            registry,
            daemon,
            PushConfig { oci_enabled: true, index_enabled: false },
        );
        pusher.push(&model, BundlePushOptions::default()).await.unwrap();

        let indexes = push_index_calls.lock().unwrap();
        assert_eq!(indexes[0].manifests.len(), 1);
    }
}
