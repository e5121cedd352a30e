//! Push configuration: the environment-variable gates that select the push
//! path and bundle format.

use std::env;

/// Value of `COG_PUSH_OCI`/`COG_OCI_INDEX` that enables the feature.
const ENABLED: &str = "1";

/// Gates read once per push invocation. Neither field is mutable at
/// runtime; re-read the environment to pick up a change.
#[derive(Debug, Clone, Copy)]
pub struct PushConfig {
    /// `COG_PUSH_OCI=1` attempts the OCI chunked push path before falling
    /// back to the daemon; any other value pushes via the daemon only.
    pub oci_enabled: bool,
    /// `COG_OCI_INDEX=1` packages the model as a bundle (image + weights
    /// behind an OCI Image Index); otherwise the model is standalone.
    pub index_enabled: bool,
}

impl PushConfig {
    pub fn from_env() -> Self {
        Self {
            oci_enabled: env::var("COG_PUSH_OCI").is_ok_and(|v| v == ENABLED),
            index_enabled: env::var("COG_OCI_INDEX").is_ok_and(|v| v == ENABLED),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
