//! `WeightArtifactBuilder` (C4): produces an OCI 1.1 artifact image for a
//! single weight file — one tar-wrapped layer, a JSON config blob, and the
//! `artifactType`-bearing manifest that ties them together.

use crate::digest::DigestUtils;
use crate::error::{PusherError, Result};
use crate::media_types;
use crate::model::{Descriptor, WeightArtifact};
use crate::registry::client::{Layer, ManifestDoc};
use crate::upload::ConfigBlobLayer;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The assembled artifact image for one weight. `manifest_bytes` is
/// computed once by [`WeightArtifactBuilder::build`] and stored here —
/// every subsequent read of it (via [`Self::manifest_bytes`] or
/// [`Self::descriptor`]) returns the identical bytes, satisfying the
/// digest-stability invariant without a cache that could drift from what
/// was actually assembled.
pub struct BuiltWeightArtifact {
    pub layer: Arc<dyn Layer>,
    pub config: Arc<ConfigBlobLayer>,
    manifest: ManifestDoc,
    manifest_bytes: Vec<u8>,
}

impl BuiltWeightArtifact {
    pub fn manifest(&self) -> &ManifestDoc {
        &self.manifest
    }

    pub fn manifest_bytes(&self) -> &[u8] {
        &self.manifest_bytes
    }

    /// Media type `application/vnd.oci.image.manifest.v1+json`, size and
    /// digest of the raw manifest bytes.
    pub fn descriptor(&self) -> Descriptor {
        Descriptor {
            media_type: media_types::IMAGE_MANIFEST.to_string(),
            size: self.manifest_bytes.len() as u64,
            digest: DigestUtils::compute_docker_digest(&self.manifest_bytes),
        }
    }
}

pub struct WeightArtifactBuilder;

impl WeightArtifactBuilder {
    pub async fn build(artifact: &WeightArtifact) -> Result<BuiltWeightArtifact> {
        if !artifact.file_path.exists() {
            return Err(PusherError::WeightFileNotFound(
                artifact.file_path.display().to_string(),
            ));
        }

        let entry_name = artifact
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| artifact.name.clone());

        let path = artifact.file_path.clone();
        let entry_name_for_hash = entry_name.clone();
        let (digest, size) = tokio::task::spawn_blocking(move || {
            hash_tar_entry(&path, &entry_name_for_hash)
        })
        .await
        .map_err(|e| PusherError::ExportFailed(e.to_string()))??;

        let layer: Arc<dyn Layer> = Arc::new(WeightTarLayer {
            path: artifact.file_path.clone(),
            entry_name,
            digest,
            size,
        });

        let config_bytes = artifact.config.to_json_bytes()?;
        let config = Arc::new(ConfigBlobLayer::new(config_bytes, media_types::WEIGHT_CONFIG));

        // TODO(weight-compression): select WEIGHT_LAYER_GZIP/ZSTD here once a
        // compression format is decided; for now the layer is always emitted
        // uncompressed.
        let manifest = ManifestDoc {
            schema_version: 2,
            media_type: media_types::IMAGE_MANIFEST.to_string(),
            artifact_type: Some(media_types::WEIGHT_ARTIFACT_MANIFEST.to_string()),
            config: Descriptor {
                media_type: config.media_type().to_string(),
                size: config.size(),
                digest: config.digest().to_string(),
            },
            layers: vec![Descriptor {
                media_type: layer.media_type().to_string(),
                size: layer.size(),
                digest: layer.digest().to_string(),
            }],
            annotations: None,
        };
        let manifest_bytes = serde_json::to_vec(&manifest)?;

        Ok(BuiltWeightArtifact {
            layer,
            config,
            manifest,
            manifest_bytes,
        })
    }
}

/// A single-entry tar archive wrapping one weight file, built and streamed
/// lazily — the file's bytes are never buffered in full, on hashing or on
/// upload.
struct WeightTarLayer {
    path: PathBuf,
    entry_name: String,
    digest: String,
    size: u64,
}

impl Layer for WeightTarLayer {
    fn digest(&self) -> &str {
        &self.digest
    }

    fn diff_id(&self) -> &str {
        &self.digest
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn media_type(&self) -> &str {
        media_types::WEIGHT_LAYER
    }

    fn compressed(&self) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(TarEntryReader::open(&self.path, &self.entry_name)?))
    }

    fn uncompressed(&self) -> Result<Box<dyn Read + Send>> {
        self.compressed()
    }
}

fn hash_tar_entry(path: &Path, entry_name: &str) -> Result<(String, u64)> {
    use sha2::Digest;
    let mut reader = TarEntryReader::open(path, entry_name)?;
    let mut hasher = sha2::Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut total: u64 = 0;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((format!("sha256:{:x}", hasher.finalize()), total))
}

enum Stage {
    Header(usize),
    Content,
    Padding(usize),
    EndMarker(usize),
    Done,
}

/// Streams a single-file tar archive: a 512-byte USTAR header, the file's
/// bytes, zero padding to the next 512-byte boundary, and the two-block
/// end-of-archive marker. Re-opens the source file per instance so it can
/// be constructed fresh for every read pass (hashing, then upload).
struct TarEntryReader {
    stage: Stage,
    header: [u8; 512],
    file: File,
    content_remaining: u64,
    padding_len: usize,
}

impl TarEntryReader {
    fn open(path: &Path, entry_name: &str) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        let mut header = tar::Header::new_ustar();
        header
            .set_path(entry_name)
            .map_err(|e| PusherError::ExportFailed(format!("invalid tar entry name: {e}")))?;
        header.set_size(size);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();

        let mut header_bytes = [0u8; 512];
        header_bytes.copy_from_slice(header.as_bytes());

        let padding_len = ((512 - (size % 512)) % 512) as usize;

        Ok(Self {
            stage: Stage::Header(0),
            header: header_bytes,
            file,
            content_remaining: size,
            padding_len,
        })
    }
}

impl Read for TarEntryReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match &mut self.stage {
                Stage::Header(offset) => {
                    if *offset >= self.header.len() {
                        self.stage = Stage::Content;
                        continue;
                    }
                    let remaining = &self.header[*offset..];
                    let n = remaining.len().min(buf.len());
                    buf[..n].copy_from_slice(&remaining[..n]);
                    *offset += n;
                    return Ok(n);
                }
                Stage::Content => {
                    if self.content_remaining == 0 {
                        self.stage = Stage::Padding(0);
                        continue;
                    }
                    let max = (buf.len() as u64).min(self.content_remaining) as usize;
                    let n = self.file.read(&mut buf[..max])?;
                    if n == 0 {
                        self.content_remaining = 0;
                        continue;
                    }
                    self.content_remaining -= n as u64;
                    return Ok(n);
                }
                Stage::Padding(offset) => {
                    if *offset >= self.padding_len {
                        self.stage = Stage::EndMarker(0);
                        continue;
                    }
                    let n = (self.padding_len - *offset).min(buf.len());
                    buf[..n].fill(0);
                    *offset += n;
                    return Ok(n);
                }
                Stage::EndMarker(offset) => {
                    const END_LEN: usize = 1024;
                    if *offset >= END_LEN {
                        self.stage = Stage::Done;
                        continue;
                    }
                    let n = (END_LEN - *offset).min(buf.len());
                    buf[..n].fill(0);
                    *offset += n;
                    return Ok(n);
                }
                Stage::Done => return Ok(0),
            }
        }
    }
}
