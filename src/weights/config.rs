//! `WeightConfig`: the JSON document pushed as a weight artifact's config
//! blob, and `WeightSource`: the build-time input describing where a
//! weight file comes from.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One build-time entry in the weight-source list fed to
/// `WeightLockGenerator`. `source` is a path relative to the project root
/// and may name a file or a directory.
#[derive(Debug, Clone)]
pub struct WeightSource {
    pub source: PathBuf,
    pub target: Option<String>,
    pub name: Option<String>,
}

impl WeightSource {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: None,
            name: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Serialized as the weight artifact's config blob
/// (`application/vnd.cog.weight.config.v1+json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightConfig {
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    #[serde(rename = "cogVersion")]
    pub cog_version: String,
    pub name: String,
    pub target: String,
    /// RFC 3339 timestamp.
    pub created: String,
}

impl WeightConfig {
    pub fn new(cog_version: impl Into<String>, name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            schema_version: "1.0".to_string(),
            cog_version: cog_version.into(),
            name: name.into(),
            target: target.into(),
            created: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
