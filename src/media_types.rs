//! Wire-exact OCI and weight-artifact media types and annotation keys.
//!
//! Every constant here is part of the registry wire protocol: changing a
//! value changes what bytes get pushed, not just an internal label.

/// Weight artifact manifest media type; also the manifest's `artifactType`.
pub const WEIGHT_ARTIFACT_MANIFEST: &str = "application/vnd.cog.weight.v1";
/// Weight config blob media type.
pub const WEIGHT_CONFIG: &str = "application/vnd.cog.weight.config.v1+json";
/// Weight layer media type (uncompressed tar).
pub const WEIGHT_LAYER: &str = "application/vnd.cog.weight.layer.v1";
/// Reserved: gzip-compressed weight layer. Not yet emitted by
/// `WeightArtifactBuilder` — see the builder module for why.
pub const WEIGHT_LAYER_GZIP: &str = "application/vnd.cog.weight.layer.v1+gzip";
/// Reserved: zstd-compressed weight layer. Not yet emitted by
/// `WeightArtifactBuilder` — see the builder module for why.
pub const WEIGHT_LAYER_ZSTD: &str = "application/vnd.cog.weight.layer.v1+zstd";

/// OCI image config blob media type.
pub const IMAGE_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
/// OCI image manifest media type.
pub const IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
/// OCI image index media type.
pub const IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// Weight annotation: resolved weight name.
pub const ANNOTATION_WEIGHT_NAME: &str = "vnd.cog.weight.name";
/// Weight annotation: destination path inside the runtime container.
pub const ANNOTATION_WEIGHT_DEST: &str = "vnd.cog.weight.dest";
/// Weight annotation: digest of the original (pre-push) file bytes.
pub const ANNOTATION_WEIGHT_DIGEST_ORIGINAL: &str = "vnd.cog.weight.digest.original";
/// Weight annotation: uncompressed size of the original file bytes.
pub const ANNOTATION_WEIGHT_SIZE_UNCOMPRESSED: &str = "vnd.cog.weight.size.uncompressed";

/// Index child annotation: what kind of artifact this manifest references.
pub const ANNOTATION_REFERENCE_TYPE: &str = "vnd.cog.reference.type";
/// Index child annotation: digest of the image this weight belongs to.
pub const ANNOTATION_REFERENCE_DIGEST: &str = "vnd.cog.reference.digest";

/// The only value `ANNOTATION_REFERENCE_TYPE` currently takes.
pub const REFERENCE_TYPE_WEIGHTS: &str = "weights";
