//! `WeightPusher` (C6): pushes a single weight artifact — blob layer via
//! `LayerUploader`, then the artifact manifest.

use crate::common::{RetryConfig, RetryFn};
use crate::error::{self, PusherError, Result};
use crate::model::{Descriptor, WeightArtifact};
use crate::registry::RegistryClient;
use crate::upload::{LayerUploader, ProgressFn};
use crate::weights::WeightArtifactBuilder;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
pub struct WeightPushOptions {
    pub progress: Option<ProgressFn>,
    /// Bounds retry attempts for the layer upload step. `None` disables
    /// retry — a single failed attempt surfaces immediately.
    pub retry: Option<RetryConfig>,
    /// Invoked before each retry; returning `false` aborts further
    /// attempts and surfaces the triggering error.
    pub retry_fn: Option<RetryFn>,
}

#[derive(Debug, Clone)]
pub struct WeightPushResult {
    pub descriptor: Descriptor,
}

pub struct WeightPusher {
    registry: Arc<dyn RegistryClient>,
}

impl WeightPusher {
    pub fn new(registry: Arc<dyn RegistryClient>) -> Self {
        Self { registry }
    }

    pub async fn push(
        &self,
        repo: &str,
        artifact: &WeightArtifact,
        opts: WeightPushOptions,
        cancel: CancellationToken,
    ) -> Result<WeightPushResult> {
        if repo.is_empty() {
            return Err(PusherError::InvalidArgument("repo is empty".into()));
        }
        if !artifact.file_path.exists() {
            return Err(PusherError::WeightFileNotFound(
                artifact.file_path.display().to_string(),
            ));
        }

        let prefix = format!("push weight \"{}\"", artifact.name);

        let built = error::context(WeightArtifactBuilder::build(artifact).await, &prefix)?;

        let uploader = LayerUploader::new(self.registry.clone());
        error::context(
            uploader
                .upload_layer_with_retry(
                    repo,
                    built.layer.clone(),
                    opts.progress.clone(),
                    opts.retry,
                    opts.retry_fn.clone(),
                    cancel,
                )
                .await,
            &prefix,
        )?;

        error::context(
            self.registry.push_image(repo, built.manifest()).await,
            &prefix,
        )?;

        Ok(WeightPushResult {
            descriptor: built.descriptor(),
        })
    }
}
