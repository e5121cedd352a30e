//! `IndexBuilder` (C7): assembles an OCI Image Index from a pushed image
//! descriptor and zero or more pushed weight descriptors.

use crate::media_types;
use crate::model::{Descriptor, Platform};
use crate::registry::client::{Index, IndexManifest};
use std::collections::BTreeMap;

/// A pushed weight artifact's descriptor plus the name/target it was
/// resolved under, needed to populate the index's referrer annotations.
pub struct WeightDescriptorEntry {
    pub descriptor: Descriptor,
    pub name: String,
    pub target: String,
}

pub struct IndexBuilder;

impl IndexBuilder {
    /// `image_digest` is the digest the weight children's
    /// `vnd.cog.reference.digest` annotation points back at — normally
    /// `image_descriptor.digest`, passed separately since callers already
    /// have it in hand from the `GetDescriptor` step.
    pub fn build(
        image_descriptor: Descriptor,
        platform: Platform,
        weights: &[WeightDescriptorEntry],
        image_digest: &str,
    ) -> Index {
        let mut manifests = vec![IndexManifest {
            digest: image_descriptor.digest,
            media_type: image_descriptor.media_type,
            size: image_descriptor.size,
            platform: Some(platform),
            annotations: None,
        }];

        for weight in weights {
            let mut annotations = BTreeMap::new();
            annotations.insert(
                media_types::ANNOTATION_REFERENCE_TYPE.to_string(),
                media_types::REFERENCE_TYPE_WEIGHTS.to_string(),
            );
            annotations.insert(
                media_types::ANNOTATION_REFERENCE_DIGEST.to_string(),
                image_digest.to_string(),
            );
            annotations.insert(
                media_types::ANNOTATION_WEIGHT_NAME.to_string(),
                weight.name.clone(),
            );
            annotations.insert(
                media_types::ANNOTATION_WEIGHT_DEST.to_string(),
                weight.target.clone(),
            );

            manifests.push(IndexManifest {
                digest: weight.descriptor.digest.clone(),
                media_type: weight.descriptor.media_type.clone(),
                size: weight.descriptor.size,
                platform: None,
                annotations: Some(annotations),
            });
        }

        Index {
            schema_version: 2,
            media_type: media_types::IMAGE_INDEX.to_string(),
            manifests,
        }
    }
}
