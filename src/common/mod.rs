//! Small utilities shared by the push components: reference/repo string
//! splitting and the retry-callback shape `WeightPusher` exposes.

use std::sync::Arc;
use std::time::Duration;

/// Strips the tag or digest suffix off a reference, e.g.
/// `r8.im/user/model:v1` -> `r8.im/user/model`,
/// `r8.im/user/model@sha256:abc` -> `r8.im/user/model`.
pub fn repo_from_reference(reference: &str) -> String {
    if let Some(at_pos) = reference.rfind('@') {
        return reference[..at_pos].to_string();
    }
    if let Some(colon_pos) = reference.rfind(':') {
        let slash_pos = reference.rfind('/').unwrap_or(0);
        if colon_pos > slash_pos {
            return reference[..colon_pos].to_string();
        }
    }
    reference.to_string()
}

/// The tag or digest suffix of a reference, defaulting to `latest` when
/// neither is present.
pub fn tag_or_digest(reference: &str) -> String {
    if let Some(at_pos) = reference.rfind('@') {
        return reference[at_pos + 1..].to_string();
    }
    if let Some(colon_pos) = reference.rfind(':') {
        let slash_pos = reference.rfind('/').unwrap_or(0);
        if colon_pos > slash_pos {
            return reference[colon_pos + 1..].to_string();
        }
    }
    "latest".to_string()
}

/// Splits a repo into `(registry host, name)`. A first path segment
/// containing a dot, a colon (port), or literally `localhost` is treated
/// as the host; otherwise the repo is assumed to live on Docker Hub.
pub fn split_repo(repo: &str) -> (String, String) {
    if let Some(slash_pos) = repo.find('/') {
        let candidate = &repo[..slash_pos];
        if candidate.contains('.') || candidate.contains(':') || candidate == "localhost" {
            return (candidate.to_string(), repo[slash_pos + 1..].to_string());
        }
    }
    ("registry-1.docker.io".to_string(), repo.to_string())
}

/// Bounds a single blob upload's retry attempts. Retries themselves are
/// delegated to the registry client; this is the shape its
/// retry callback reports through.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// One retry attempt reported to the caller's `retry_fn`.
#[derive(Debug, Clone)]
pub struct RetryEvent {
    pub attempt: u32,
    pub max_attempts: u32,
    pub cause: String,
    pub next_delay: Duration,
}

/// Returning `false` aborts further retries.
pub type RetryFn = Arc<dyn Fn(&RetryEvent) -> bool + Send + Sync>;
