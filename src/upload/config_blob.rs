//! `ConfigBlobLayer` (C2): adapts an in-memory byte buffer (an image or
//! artifact config) to the `Layer` contract expected by the registry
//! client.

use crate::digest::DigestUtils;
use crate::error::Result;
use crate::registry::client::Layer;
use std::io::Cursor;

pub struct ConfigBlobLayer {
    data: Vec<u8>,
    digest: String,
    media_type: String,
}

impl ConfigBlobLayer {
    /// Computes the digest from `data`; there is no compressed form to
    /// independently track since config blobs are never gzipped.
    pub fn new(data: Vec<u8>, media_type: impl Into<String>) -> Self {
        let digest = DigestUtils::compute_docker_digest(&data);
        Self {
            data,
            digest,
            media_type: media_type.into(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Layer for ConfigBlobLayer {
    fn digest(&self) -> &str {
        &self.digest
    }

    /// Uncompressed == compressed for a config blob.
    fn diff_id(&self) -> &str {
        &self.digest
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn compressed(&self) -> Result<Box<dyn std::io::Read + Send>> {
        Ok(Box::new(Cursor::new(self.data.clone())))
    }

    fn uncompressed(&self) -> Result<Box<dyn std::io::Read + Send>> {
        self.compressed()
    }
}
