//! Lazy-loaded image access over a daemon-exported tar.
//!
//! Model images may be tens of gigabytes; this type indexes entry offsets
//! during a single streaming pass and only ever reads layer content again
//! on demand, by seeking the temp file — it never holds a full layer in
//! memory.

use crate::error::{PusherError, Result};
use crate::media_types;
use crate::registry::client::{Layer, ManifestDoc};
use crate::model::Descriptor;
use flate2::read::GzEncoder;
use flate2::write::GzEncoder as GzWriteEncoder;
use flate2::Compression;
use serde::Deserialize;
use sha2::Digest;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct DockerManifestEntry {
    #[serde(rename = "Config")]
    config: String,
    #[serde(rename = "Layers")]
    layers: Vec<String>,
}

pub struct TarImage {
    config_bytes: Vec<u8>,
    layers: Vec<Arc<dyn Layer>>,
}

impl TarImage {
    /// Opens a daemon-exported image tar (a `docker save`/`podman save`
    /// format archive: `manifest.json` plus per-layer tarballs) and
    /// indexes it. Layer content is streamed through twice during
    /// indexing — once to learn its byte range, once to compute its
    /// digests — but never buffered whole.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut archive = tar::Archive::new(file);

        let mut manifest_json: Option<String> = None;
        let mut offsets: HashMap<String, (u64, u64)> = HashMap::new();

        for entry in archive.entries()? {
            let mut entry = entry?;
            let entry_path = entry.path()?.to_string_lossy().to_string();
            if entry_path == "manifest.json" {
                let mut s = String::new();
                entry.read_to_string(&mut s)?;
                manifest_json = Some(s);
            } else {
                let offset = entry.raw_file_position();
                let size = entry.header().entry_size()?;
                offsets.insert(entry_path, (offset, size));
            }
        }

        let manifest_json = manifest_json.ok_or_else(|| {
            PusherError::ExportFailed("daemon export tar is missing manifest.json".into())
        })?;
        let manifests: Vec<DockerManifestEntry> = serde_json::from_str(&manifest_json)?;
        let entry = manifests.into_iter().next().ok_or_else(|| {
            PusherError::ExportFailed("daemon export manifest.json has no entries".into())
        })?;

        let &(config_offset, config_size) = offsets.get(&entry.config).ok_or_else(|| {
            PusherError::ExportFailed(format!("config blob {} missing from tar", entry.config))
        })?;
        let config_bytes = read_range(path, config_offset, config_size)?;

        let mut layers: Vec<Arc<dyn Layer>> = Vec::with_capacity(entry.layers.len());
        for layer_path in &entry.layers {
            let &(offset, size) = offsets.get(layer_path).ok_or_else(|| {
                PusherError::ExportFailed(format!("layer {layer_path} missing from tar"))
            })?;
            let (diff_id, digest, compressed_size) = hash_range_both(path, offset, size)?;
            layers.push(Arc::new(TarSeekLayer {
                tar_path: path.to_path_buf(),
                offset,
                raw_size: size,
                compressed_size,
                digest,
                diff_id,
            }));
        }

        Ok(Self {
            config_bytes,
            layers,
        })
    }

    pub fn layers(&self) -> Vec<Arc<dyn Layer>> {
        self.layers.clone()
    }

    pub fn config_bytes(&self) -> Vec<u8> {
        self.config_bytes.clone()
    }

    /// Assembles the OCI image manifest from the already-pushed config and
    /// the indexed layers. No `artifactType` — this is a real image, not a
    /// weight artifact.
    pub fn build_manifest(&self, config: &dyn Layer) -> ManifestDoc {
        ManifestDoc {
            schema_version: 2,
            media_type: media_types::IMAGE_MANIFEST.to_string(),
            artifact_type: None,
            config: Descriptor {
                media_type: config.media_type().to_string(),
                size: config.size(),
                digest: config.digest().to_string(),
            },
            layers: self
                .layers
                .iter()
                .map(|l| Descriptor {
                    media_type: l.media_type().to_string(),
                    size: l.size(),
                    digest: l.digest().to_string(),
                })
                .collect(),
            annotations: None,
        }
    }
}

fn open_range(path: &Path, offset: u64, size: u64) -> Result<std::io::Take<File>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    Ok(file.take(size))
}

fn read_range(path: &Path, offset: u64, size: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(size as usize);
    open_range(path, offset, size)?.read_to_end(&mut buf)?;
    Ok(buf)
}

struct HashCounter {
    hasher: sha2::Sha256,
    count: u64,
}

impl Write for HashCounter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.hasher.update(buf);
        self.count += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Streams the raw tar range once, feeding it through a plain hasher (for
/// `diffID`, the OCI digest of uncompressed content) and, in lockstep,
/// through a gzip encoder whose output feeds a second hasher and byte
/// counter (for the pushed blob's digest and size). Docker-style layer
/// digests are computed over the gzip-compressed bytes, not the raw tar.
fn hash_range_both(path: &Path, offset: u64, size: u64) -> Result<(String, String, u64)> {
    let mut reader = open_range(path, offset, size)?;
    let mut raw_hasher = sha2::Sha256::new();
    let counter = HashCounter {
        hasher: sha2::Sha256::new(),
        count: 0,
    };
    let mut encoder = GzWriteEncoder::new(counter, Compression::default());
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        raw_hasher.update(&buf[..n]);
        encoder.write_all(&buf[..n])?;
    }

    let counter = encoder.finish()?;
    Ok((
        format!("sha256:{:x}", raw_hasher.finalize()),
        format!("sha256:{:x}", counter.hasher.finalize()),
        counter.count,
    ))
}

/// A single image layer, read lazily from the indexed byte range in the
/// temp tar. Compressed (gzip) and uncompressed views are produced by
/// re-opening and re-streaming the range on each call — never cached.
struct TarSeekLayer {
    tar_path: PathBuf,
    offset: u64,
    raw_size: u64,
    compressed_size: u64,
    digest: String,
    diff_id: String,
}

impl Layer for TarSeekLayer {
    fn digest(&self) -> &str {
        &self.digest
    }

    fn diff_id(&self) -> &str {
        &self.diff_id
    }

    fn size(&self) -> u64 {
        self.compressed_size
    }

    fn media_type(&self) -> &str {
        "application/vnd.oci.image.layer.v1.tar+gzip"
    }

    fn compressed(&self) -> Result<Box<dyn Read + Send>> {
        let range = open_range(&self.tar_path, self.offset, self.raw_size)?;
        Ok(Box::new(GzEncoder::new(range, Compression::default())))
    }

    fn uncompressed(&self) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(open_range(&self.tar_path, self.offset, self.raw_size)?))
    }
}
