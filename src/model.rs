//! The artifact/model data model: the polymorphic artifact set a `Model`
//! owns and the descriptors produced once those artifacts are pushed.

use crate::weights::config::WeightConfig;
use std::collections::HashMap;
use std::path::PathBuf;

/// `{ mediaType, size, digest }` — the minimal pointer to a pushed blob or
/// manifest.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Descriptor {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub size: u64,
    pub digest: String,
}

/// A single-platform target, e.g. `linux/amd64`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
}

impl Platform {
    pub fn linux_amd64() -> Self {
        Self {
            os: "linux".to_string(),
            architecture: "amd64".to_string(),
        }
    }
}

/// A locally built container image artifact, not yet pushed (or pushed and
/// now referenced only by its `reference`; the post-push descriptor is
/// obtained separately via `RegistryClient::get_descriptor`, not stored
/// here.
#[derive(Debug, Clone)]
pub struct ImageArtifact {
    /// Repo plus tag or digest, e.g. `r8.im/user/model:v1`.
    pub reference: String,
    /// Digest of the image the local daemon holds, if known up front.
    pub digest: Option<String>,
    pub labels: HashMap<String, String>,
    pub platform: Option<Platform>,
    /// Local build source (for diagnostics only; not read by the pusher).
    pub source: Option<PathBuf>,
}

impl ImageArtifact {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            digest: None,
            labels: HashMap::new(),
            platform: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ArtifactType {
        ArtifactType::Image
    }

    pub fn name(&self) -> &str {
        &self.reference
    }
}

/// A model-weight file paired with the config describing how it's mounted.
#[derive(Debug, Clone)]
pub struct WeightArtifact {
    pub name: String,
    pub file_path: PathBuf,
    pub target: String,
    pub config: WeightConfig,
}

impl WeightArtifact {
    pub fn kind(&self) -> ArtifactType {
        ArtifactType::Weight
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Tag distinguishing the two `Artifact` variants without a downcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactType {
    Image,
    Weight,
}

/// The polymorphic artifact set a `Model` owns. Downstream code iterating a
/// mixed collection matches on the variant rather than downcasting.
#[derive(Debug, Clone)]
pub enum Artifact {
    Image(ImageArtifact),
    Weight(WeightArtifact),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactType {
        match self {
            Artifact::Image(a) => a.kind(),
            Artifact::Weight(a) => a.kind(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Artifact::Image(a) => a.name(),
            Artifact::Weight(a) => a.name(),
        }
    }
}

/// Whether a model is packaged as a single image with weights baked in, or
/// as an OCI Image Index pointing at an image plus separate weight
/// artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Standalone,
    Bundle,
}

/// A locally built model: one runnable image plus zero or more weight
/// artifacts. The sole owner of its artifacts — artifacts are never shared
/// between models.
#[derive(Debug, Clone)]
pub struct Model {
    pub image: ImageArtifact,
    pub weights: Vec<WeightArtifact>,
    pub schema: Option<String>,
    pub cog_version: String,
    pub format: ImageFormat,
}

impl Model {
    pub fn new(image: ImageArtifact, cog_version: impl Into<String>) -> Self {
        Self {
            image,
            weights: Vec::new(),
            schema: None,
            cog_version: cog_version.into(),
            format: ImageFormat::Standalone,
        }
    }

    /// `isBundle() <=> weightArtifacts.length > 0`.
    pub fn is_bundle(&self) -> bool {
        !self.weights.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_is_bundle_tracks_weight_presence() {
        let image = ImageArtifact::new("r8.im/u/m:v1");
        let mut model = Model::new(image, "0.15.0");
        assert!(!model.is_bundle());

        model.weights.push(WeightArtifact {
            name: "model-v1".into(),
            file_path: PathBuf::from("weights/m.st"),
            target: "/weights/m.st".into(),
            config: WeightConfig::new("0.15.0", "model-v1", "/weights/m.st"),
        });
        assert!(model.is_bundle());
    }
}
