//! Error handling for the artifact push engine.
//!
//! `PusherError` is the single error type threaded through every component.
//! Each variant corresponds to one entry in the error taxonomy; the two free
//! functions [`should_fallback_to_docker`] and [`sanitize_error_message`] are
//! the independently-testable classification helpers the push/fallback logic
//! builds on.

use std::fmt;

#[derive(Debug, Clone)]
pub enum PusherError {
    /// Nil artifact, empty reference, empty repo.
    InvalidArgument(String),
    /// A `WeightSource` entry does not exist on disk.
    WeightSourceNotFound(String),
    /// A resolved weight file disappeared before push.
    WeightFileNotFound(String),
    /// Daemon export or temp-file I/O failure.
    ExportFailed(String),
    /// Layer or config blob push failed.
    BlobUploadFailed(String),
    /// Manifest push failed.
    ManifestPushFailed(String),
    /// Index push failed.
    IndexPushFailed(String),
    /// HTTP 401/403, non-retryable and never eligible for daemon fallback.
    AuthFailed(String),
    /// Context was cancelled cooperatively.
    Cancelled,
    /// Context deadline elapsed.
    DeadlineExceeded,
    /// 5xx, connection reset, or other transient registry failure.
    TransientRegistryError(String),
    /// Generic I/O error not otherwise classified.
    Io(String),
    /// JSON (de)serialization failure.
    Parse(String),
}

impl fmt::Display for PusherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PusherError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            PusherError::WeightSourceNotFound(msg) => write!(f, "weight source not found: {msg}"),
            PusherError::WeightFileNotFound(msg) => write!(f, "weight file not found: {msg}"),
            PusherError::ExportFailed(msg) => write!(f, "export failed: {msg}"),
            PusherError::BlobUploadFailed(msg) => write!(f, "blob upload failed: {msg}"),
            PusherError::ManifestPushFailed(msg) => write!(f, "manifest push failed: {msg}"),
            PusherError::IndexPushFailed(msg) => write!(f, "index push failed: {msg}"),
            PusherError::AuthFailed(msg) => write!(f, "authentication failed: {msg}"),
            PusherError::Cancelled => write!(f, "operation cancelled"),
            PusherError::DeadlineExceeded => write!(f, "deadline exceeded"),
            PusherError::TransientRegistryError(msg) => {
                write!(f, "transient registry error: {msg}")
            }
            PusherError::Io(msg) => write!(f, "I/O error: {msg}"),
            PusherError::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for PusherError {}

impl From<std::io::Error> for PusherError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            PusherError::Io(format!("file not found: {err}"))
        } else {
            PusherError::Io(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PusherError {
    fn from(err: serde_json::Error) -> Self {
        PusherError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for PusherError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PusherError::DeadlineExceeded
        } else if let Some(status) = err.status() {
            classify_status(status, &err.to_string())
        } else {
            PusherError::TransientRegistryError(err.to_string())
        }
    }
}

fn classify_status(status: reqwest::StatusCode, msg: &str) -> PusherError {
    match status.as_u16() {
        401 | 403 => PusherError::AuthFailed(msg.to_string()),
        _ => PusherError::TransientRegistryError(msg.to_string()),
    }
}

pub type Result<T> = std::result::Result<T, PusherError>;

/// Wraps an error with a stable contextual prefix, e.g.
/// `context(e, "OCI chunked push")` -> `"OCI chunked push: <cause>"`, while
/// preserving the variant so later classification still unwraps correctly.
pub fn context<T>(result: Result<T>, prefix: &str) -> Result<T> {
    result.map_err(|e| prefix_variant(e, prefix))
}

fn prefix_variant(err: PusherError, prefix: &str) -> PusherError {
    let wrap = |msg: &str| format!("{prefix}: {msg}");
    match err {
        PusherError::InvalidArgument(m) => PusherError::InvalidArgument(wrap(&m)),
        PusherError::WeightSourceNotFound(m) => PusherError::WeightSourceNotFound(wrap(&m)),
        PusherError::WeightFileNotFound(m) => PusherError::WeightFileNotFound(wrap(&m)),
        PusherError::ExportFailed(m) => PusherError::ExportFailed(wrap(&m)),
        PusherError::BlobUploadFailed(m) => PusherError::BlobUploadFailed(wrap(&m)),
        PusherError::ManifestPushFailed(m) => PusherError::ManifestPushFailed(wrap(&m)),
        PusherError::IndexPushFailed(m) => PusherError::IndexPushFailed(wrap(&m)),
        PusherError::AuthFailed(m) => PusherError::AuthFailed(wrap(&m)),
        PusherError::TransientRegistryError(m) => PusherError::TransientRegistryError(wrap(&m)),
        PusherError::Io(m) => PusherError::Io(wrap(&m)),
        PusherError::Parse(m) => PusherError::Parse(wrap(&m)),
        PusherError::Cancelled => PusherError::Cancelled,
        PusherError::DeadlineExceeded => PusherError::DeadlineExceeded,
    }
}

/// Classifies whether an OCI chunked-push failure should fall back to the
/// daemon (`docker push`) path.
///
/// `false` for cancellation, deadlines, and auth failures (401/403) —
/// retrying through a different path would not help and may actively
/// resubmit a user-cancelled action. `true` for everything else: network
/// errors, 5xx, daemon export failures, unclassified errors. Total: never
/// panics, handles arbitrarily wrapped messages since classification is by
/// variant, not by string matching.
pub fn should_fallback_to_docker(err: &PusherError) -> bool {
    !matches!(
        err,
        PusherError::Cancelled | PusherError::DeadlineExceeded | PusherError::AuthFailed(_)
    )
}

/// Strips registry transport error bodies (often full HTML pages) down to
/// `HTTP <code> <reason>` for user-visible reporting. Callers that need to
/// branch on the failure kind should match on `PusherError`, not this
/// string.
pub fn sanitize_error_message(message: &str) -> String {
    extract_http_status_line(message).unwrap_or_else(|| message.to_string())
}

fn extract_http_status_line(message: &str) -> Option<String> {
    let idx = message.find("HTTP ")?;
    let rest = &message[idx + 5..];
    let code_str: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if code_str.is_empty() {
        return None;
    }
    let code: u16 = code_str.parse().ok()?;
    let after_code = strip_html_tags(&rest[code_str.len()..]);
    let reason = after_code
        .trim()
        .split(|c| c == ',' || c == '\n')
        .next()
        .unwrap_or("")
        .trim();
    if reason.is_empty() {
        return None;
    }
    Some(format!("HTTP {code} {reason}"))
}

/// Drops everything between `<` and `>` (inclusive) so an HTML error body's
/// tags don't leak into the extracted reason phrase.
fn strip_html_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_classifier_is_total() {
        assert!(!should_fallback_to_docker(&PusherError::Cancelled));
        assert!(!should_fallback_to_docker(&PusherError::DeadlineExceeded));
        assert!(!should_fallback_to_docker(&PusherError::AuthFailed(
            "401".into()
        )));
        assert!(!should_fallback_to_docker(&PusherError::AuthFailed(
            "wrapped: 403 forbidden".into()
        )));
        assert!(should_fallback_to_docker(&PusherError::TransientRegistryError(
            "connection reset".into()
        )));
        assert!(should_fallback_to_docker(&PusherError::ExportFailed(
            "daemon export failed".into()
        )));
        assert!(should_fallback_to_docker(&PusherError::Io(
            "disk full".into()
        )));
    }

    #[test]
    fn context_preserves_variant_for_classification() {
        let wrapped = context(Err(PusherError::AuthFailed("401".into())), "OCI chunked push");
        match wrapped {
            Err(e) => {
                assert!(e.to_string().contains("OCI chunked push"));
                assert!(!should_fallback_to_docker(&e));
            }
            Ok(()) => panic!("expected error"),
        }
    }

    #[test]
    fn sanitize_strips_html_body() {
        let raw = "Failed to upload blob: HTTP 413 <html><body>Request Entity Too Large, payload exceeds limit...</body></html>";
        assert_eq!(sanitize_error_message(raw), "HTTP 413 Request Entity Too Large");
    }

    #[test]
    fn sanitize_passes_through_plain_messages() {
        let raw = "connection reset by peer";
        assert_eq!(sanitize_error_message(raw), raw);
    }
}
