//! `HttpRegistryClient`: an OCI Distribution Spec chunked-upload
//! implementation of [`RegistryClient`], the one production implementation
//! this crate ships (the registry client is left external; this is
//! the reference implementation for hosts that want to use the crate
//! standalone rather than wiring in their own).

use crate::common::{RetryConfig, RetryEvent, RetryFn};
use crate::error::{PusherError, Result};
use crate::model::Descriptor;
use crate::registry::client::{Index, Layer, ManifestDoc, ProgressUpdate, RegistryClient};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::io::Read;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const CHUNK_SIZE: usize = 10 * 1024 * 1024;

pub struct HttpRegistryClient {
    client: Client,
    bearer_token: Option<String>,
}

impl HttpRegistryClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            bearer_token: None,
        }
    }

    /// Registry authentication policy is delegated to the caller; this is
    /// the one hook this implementation exposes.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn blob_url(&self, host: &str, name: &str, digest: &str) -> String {
        format!("https://{host}/v2/{name}/blobs/{digest}")
    }

    fn upload_start_url(&self, host: &str, name: &str) -> String {
        format!("https://{host}/v2/{name}/blobs/uploads/")
    }

    fn manifest_url(&self, host: &str, name: &str, reference: &str) -> String {
        format!("https://{host}/v2/{name}/manifests/{reference}")
    }

    async fn transport_error(resp: reqwest::Response) -> PusherError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let message = format!("HTTP {} {}", status.as_u16(), body);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PusherError::AuthFailed(message),
            s if s.is_server_error() => PusherError::TransientRegistryError(message),
            _ => PusherError::TransientRegistryError(message),
        }
    }

    async fn blob_exists(&self, host: &str, name: &str, digest: &str) -> Result<bool> {
        let resp = self
            .authed(self.client.head(self.blob_url(host, name, digest)))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// One attempt of the full chunked-upload sequence: existence check,
    /// session start, chunked `PATCH`es, and the finishing `PUT`. Wrapped
    /// in a retry loop by `write_layer` — a retried attempt restarts the
    /// blob from the beginning rather than resuming the failed session.
    async fn try_write_layer(
        &self,
        repo: &str,
        layer: Arc<dyn Layer>,
        progress: Option<mpsc::Sender<ProgressUpdate>>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let (host, name) = crate::common::split_repo(repo);
        let digest = layer.digest().to_string();

        if self.blob_exists(&host, &name, &digest).await? {
            return Ok(());
        }

        let mut location = self.start_upload(&host, &name).await?;
        let total = layer.size();
        let mut sent: u64 = 0;
        let mut reader = layer.compressed()?;

        loop {
            if cancel.is_cancelled() {
                return Err(PusherError::Cancelled);
            }
            let (r, chunk) = read_chunk(reader)
                .await
                .map_err(|e| PusherError::BlobUploadFailed(e.to_string()))?;
            reader = r;
            if chunk.is_empty() {
                break;
            }

            let range_end = sent + chunk.len() as u64 - 1;
            let resp = self
                .authed(self.client.patch(&location))
                .header("Content-Type", "application/octet-stream")
                .header("Content-Range", format!("{sent}-{range_end}"))
                .body(chunk.clone())
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(Self::transport_error(resp).await);
            }
            if let Some(next) = resp.headers().get("Location").and_then(|v| v.to_str().ok()) {
                location = next.to_string();
            }

            sent += chunk.len() as u64;
            if let Some(tx) = &progress {
                let _ = tx
                    .send(ProgressUpdate {
                        complete: sent,
                        total,
                    })
                    .await;
            }
        }

        let sep = if location.contains('?') { '&' } else { '?' };
        let finish_url = format!("{location}{sep}digest={digest}");
        let resp = self
            .authed(self.client.put(&finish_url))
            .header("Content-Length", "0")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::transport_error(resp).await);
        }
        Ok(())
    }

    async fn start_upload(&self, host: &str, name: &str) -> Result<String> {
        let resp = self
            .authed(self.client.post(self.upload_start_url(host, name)))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::transport_error(resp).await);
        }
        resp.headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                PusherError::BlobUploadFailed("upload session missing Location header".into())
            })
    }
}

impl Default for HttpRegistryClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_chunk(mut reader: Box<dyn Read + Send>) -> std::io::Result<(Box<dyn Read + Send>, Vec<u8>)> {
    tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = reader.read(&mut buf)?;
        buf.truncate(n);
        Ok((reader, buf))
    })
    .await
    .map_err(|e| std::io::Error::other(e.to_string()))?
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn write_layer(
        &self,
        repo: &str,
        layer: Arc<dyn Layer>,
        progress: Option<mpsc::Sender<ProgressUpdate>>,
        retry: Option<RetryConfig>,
        retry_fn: Option<RetryFn>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let max_attempts = retry.map(|r| r.max_attempts).unwrap_or(1).max(1);
        let base_delay = retry.map(|r| r.base_delay).unwrap_or_default();
        let mut attempt = 1;

        loop {
            match self
                .try_write_layer(repo, layer.clone(), progress.clone(), cancel.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if attempt < max_attempts && crate::error::should_fallback_to_docker(&e) => {
                    let next_delay = base_delay * 2u32.pow(attempt - 1);
                    if let Some(retry_fn) = &retry_fn {
                        let proceed = retry_fn(&RetryEvent {
                            attempt,
                            max_attempts,
                            cause: e.to_string(),
                            next_delay,
                        });
                        if !proceed {
                            return Err(e);
                        }
                    }
                    tokio::time::sleep(next_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn push_image(&self, reference: &str, manifest: &ManifestDoc) -> Result<()> {
        let (host, name) = crate::common::split_repo(crate::common::repo_from_reference(reference).as_str());
        let tag = crate::common::tag_or_digest(reference);
        let body = serde_json::to_vec(manifest)?;
        let resp = self
            .authed(self.client.put(self.manifest_url(&host, &name, &tag)))
            .header("Content-Type", &manifest.media_type)
            .body(body)
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(PusherError::ManifestPushFailed(
                Self::transport_error(resp).await.to_string(),
            ))
        }
    }

    async fn push_index(&self, reference: &str, index: &Index) -> Result<()> {
        let (host, name) = crate::common::split_repo(crate::common::repo_from_reference(reference).as_str());
        let tag = crate::common::tag_or_digest(reference);
        let body = serde_json::to_vec(index)?;
        let resp = self
            .authed(self.client.put(self.manifest_url(&host, &name, &tag)))
            .header("Content-Type", &index.media_type)
            .body(body)
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(PusherError::IndexPushFailed(
                Self::transport_error(resp).await.to_string(),
            ))
        }
    }

    async fn get_descriptor(&self, reference: &str) -> Result<Descriptor> {
        let (host, name) = crate::common::split_repo(crate::common::repo_from_reference(reference).as_str());
        let tag = crate::common::tag_or_digest(reference);
        let resp = self
            .authed(
                self.client
                    .head(self.manifest_url(&host, &name, &tag))
                    .header(
                        "Accept",
                        "application/vnd.oci.image.manifest.v1+json, application/vnd.oci.image.index.v1+json",
                    ),
            )
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::transport_error(resp).await);
        }
        let media_type = resp
            .headers()
            .get("Content-Type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or(crate::media_types::IMAGE_MANIFEST)
            .to_string();
        let size = resp
            .headers()
            .get("Content-Length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let digest = resp
            .headers()
            .get("Docker-Content-Digest")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                PusherError::ManifestPushFailed("manifest HEAD missing Docker-Content-Digest".into())
            })?
            .to_string();

        Ok(Descriptor {
            media_type,
            size,
            digest,
        })
    }
}
