//! The registry client contract the core consumes and the `Layer`/manifest
//! shapes it operates on. Out of scope: the production implementation's
//! auth policy (delegated entirely to whatever `RegistryClient` is wired
//! in) — see `http` for the one HTTP-backed implementation this crate
//! ships.

use crate::common::{RetryConfig, RetryFn};
use crate::error::Result;
use crate::model::Descriptor;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// `{complete, total}` sent on the progress channel during a layer upload.
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate {
    pub complete: u64,
    pub total: u64,
}

/// The layer contract the registry client writes: a content-addressed blob
/// with independent compressed/uncompressed views. `ConfigBlobLayer` and
/// the lazily-loaded tar image layers are the two implementations in this
/// crate.
pub trait Layer: Send + Sync {
    fn digest(&self) -> &str;
    /// Digest of the uncompressed content (== `digest()` when the layer
    /// carries no compression, as with config blobs and weight layers).
    fn diff_id(&self) -> &str;
    fn size(&self) -> u64;
    fn media_type(&self) -> &str;
    fn compressed(&self) -> Result<Box<dyn Read + Send>>;
    fn uncompressed(&self) -> Result<Box<dyn Read + Send>>;
}

/// A manifest ready to push: either a real OCI image manifest or an OCI 1.1
/// artifact manifest (`artifact_type` set). The raw bytes are produced by
/// the builder that assembles it (`TarImage`, `WeightArtifactBuilder`) and
/// must be cached there — this struct is only ever serialized once per
/// distinct manifest, by whoever built it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestDoc {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    #[serde(rename = "mediaType")]
    pub media_type: String,
    #[serde(rename = "artifactType", skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    pub config: Descriptor,
    pub layers: Vec<Descriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// An OCI Image Index: a top-level manifest referencing child manifests.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Index {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub manifests: Vec<IndexManifest>,
}

/// One child entry of an `Index`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IndexManifest {
    pub digest: String,
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<crate::model::Platform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Out of scope: the production registry client implementing
/// chunked uploads, retries, and progress emission. The core only depends
/// on this trait so it can be exercised against in-memory mocks in tests.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Chunked blob upload. Sends progress updates on `progress` if given
    /// but never closes the channel — the caller (`LayerUploader`) owns
    /// that lifecycle. When `retry` is given, a failed attempt is retried
    /// up to `retry.max_attempts` times; `retry_fn`, if given, is invoked
    /// before each retry with the attempt number, cause, and next delay,
    /// and may return `false` to abort further attempts. Retries within a
    /// single blob upload are the registry client's responsibility.
    async fn write_layer(
        &self,
        repo: &str,
        layer: Arc<dyn Layer>,
        progress: Option<mpsc::Sender<ProgressUpdate>>,
        retry: Option<RetryConfig>,
        retry_fn: Option<RetryFn>,
        cancel: CancellationToken,
    ) -> Result<()>;

    /// Manifest upload.
    async fn push_image(&self, reference: &str, manifest: &ManifestDoc) -> Result<()>;

    /// Index upload.
    async fn push_index(&self, reference: &str, index: &Index) -> Result<()>;

    /// HEAD for the manifest descriptor currently at `reference`.
    async fn get_descriptor(&self, reference: &str) -> Result<Descriptor>;
}
