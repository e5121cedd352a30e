//! SHA256 digest utilities shared by image layers, config blobs and weight
//! files.
//!
//! Centralizes digest computation, validation and formatting so every
//! component agrees on the same `sha256:<hex>` representation.

use crate::error::{PusherError, Result};
use sha2::Digest;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Standard SHA256 digest for empty files/layers.
pub const EMPTY_LAYER_DIGEST: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Empty-layer digest with the `sha256:` prefix.
pub const EMPTY_LAYER_DIGEST_FULL: &str =
    "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

const STREAM_CHUNK: usize = 64 * 1024;

/// Utilities for working with SHA256 digests.
pub struct DigestUtils;

impl DigestUtils {
    /// Computes a SHA256 digest from byte data.
    pub fn compute_sha256(data: &[u8]) -> String {
        let mut hasher = sha2::Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    }

    /// Computes a SHA256 digest from string data.
    pub fn compute_sha256_str(data: &str) -> String {
        Self::compute_sha256(data.as_bytes())
    }

    /// Computes the full `sha256:<hex>` digest of byte data.
    pub fn compute_docker_digest(data: &[u8]) -> String {
        format!("sha256:{}", Self::compute_sha256(data))
    }

    /// Computes the full `sha256:<hex>` digest of string data.
    pub fn compute_docker_digest_str(data: &str) -> String {
        format!("sha256:{}", Self::compute_sha256_str(data))
    }

    /// Validates a 64-character hex SHA256 string.
    pub fn is_valid_sha256_hex(digest: &str) -> bool {
        digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Validates a full `sha256:<hex>` digest.
    pub fn is_valid_docker_digest(digest: &str) -> bool {
        digest
            .strip_prefix("sha256:")
            .is_some_and(Self::is_valid_sha256_hex)
    }

    /// Adds the `sha256:` prefix if missing, validating either form.
    pub fn normalize_digest(digest: &str) -> Result<String> {
        if let Some(hex_part) = digest.strip_prefix("sha256:") {
            if !Self::is_valid_sha256_hex(hex_part) {
                return Err(PusherError::InvalidArgument(format!(
                    "invalid sha256 digest: {digest}"
                )));
            }
            Ok(digest.to_string())
        } else {
            if !Self::is_valid_sha256_hex(digest) {
                return Err(PusherError::InvalidArgument(format!(
                    "invalid sha256 hex: expected 64 hex characters, got '{digest}'"
                )));
            }
            Ok(format!("sha256:{digest}"))
        }
    }

    /// Extracts the hex part from a full `sha256:<hex>` digest.
    pub fn extract_hex_part(digest: &str) -> Result<&str> {
        digest
            .strip_prefix("sha256:")
            .filter(|hex| Self::is_valid_sha256_hex(hex))
            .ok_or_else(|| PusherError::InvalidArgument(format!("malformed digest: {digest}")))
    }

    /// Returns true when `digest` denotes the empty-layer content.
    pub fn is_empty_layer_digest(digest: &str) -> bool {
        digest == EMPTY_LAYER_DIGEST_FULL || digest == EMPTY_LAYER_DIGEST
    }

    /// Verifies `data` matches `expected_digest`.
    pub fn verify_data_integrity(data: &[u8], expected_digest: &str) -> Result<()> {
        let computed = Self::compute_sha256(data);
        let expected_hex = Self::extract_hex_part(expected_digest)?;
        if computed != expected_hex {
            return Err(PusherError::InvalidArgument(format!(
                "digest mismatch: expected {expected_digest}, computed sha256:{computed}"
            )));
        }
        Ok(())
    }

    /// Formats a digest for display, truncated for readability.
    pub fn format_digest_short(digest: &str) -> String {
        if digest.len() > 23 {
            format!("{}...", &digest[..23])
        } else {
            digest.to_string()
        }
    }
}

/// Streams a file through SHA256 without loading it fully into memory.
/// Returns `(sha256:<hex>, byte_count)`. Used by the weight-lock generator,
/// where weight files may be many gigabytes.
pub async fn hash_file_streaming(path: &Path) -> Result<(String, u64)> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = sha2::Sha256::new();
    let mut buf = vec![0u8; STREAM_CHUNK];
    let mut total: u64 = 0;

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }

    Ok((format!("sha256:{:x}", hasher.finalize()), total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_sha256_matches_known_vector() {
        let digest = DigestUtils::compute_sha256(b"hello world");
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn compute_docker_digest_adds_prefix() {
        let digest = DigestUtils::compute_docker_digest(b"hello world");
        assert_eq!(
            digest,
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn empty_layer_digest_is_stable() {
        assert_eq!(DigestUtils::compute_sha256(b""), EMPTY_LAYER_DIGEST);
    }

    #[test]
    fn validate_digest_rejects_malformed_forms() {
        assert!(DigestUtils::is_valid_docker_digest(
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        ));
        assert!(!DigestUtils::is_valid_docker_digest("sha256:invalid"));
        assert!(!DigestUtils::is_valid_docker_digest(
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        ));
    }

    #[test]
    fn normalize_digest_adds_missing_prefix() {
        let hex_only = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        assert_eq!(
            DigestUtils::normalize_digest(hex_only).unwrap(),
            format!("sha256:{hex_only}")
        );
    }

    #[test]
    fn verify_data_integrity_detects_mismatch() {
        let data = b"hello world";
        let digest = "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        assert!(DigestUtils::verify_data_integrity(data, digest).is_ok());

        let wrong =
            "sha256:0000000000000000000000000000000000000000000000000000000000000000";
        assert!(DigestUtils::verify_data_integrity(data, wrong).is_err());
    }

    #[tokio::test]
    async fn hash_file_streaming_matches_in_memory_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weight.bin");
        let content = b"fake weight data for testing digest streaming";
        tokio::fs::write(&path, content).await.unwrap();

        let (digest, size) = hash_file_streaming(&path).await.unwrap();
        assert_eq!(digest, DigestUtils::compute_docker_digest(content));
        assert_eq!(size, content.len() as u64);
    }
}
