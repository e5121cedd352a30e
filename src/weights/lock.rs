//! `WeightLockGenerator` (C3): walks weight sources, computes content
//! digests, and produces a deterministic `WeightsLock`.

use crate::digest::hash_file_streaming;
use crate::error::{PusherError, Result};
use crate::media_types;
use crate::weights::config::WeightSource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// One resolved file inside a `WeightsLock`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightFile {
    pub name: String,
    pub dest: String,
    pub digest: String,
    #[serde(rename = "digestOriginal")]
    pub digest_original: String,
    pub size: u64,
    #[serde(rename = "sizeUncompressed")]
    pub size_uncompressed: u64,
    #[serde(rename = "mediaType")]
    pub media_type: String,
}

/// Deterministic, reproducible build output checked into the project tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightsLock {
    pub version: String,
    pub created: String,
    pub files: Vec<WeightFile>,
}

pub struct WeightLockGenerator;

impl WeightLockGenerator {
    /// Walks `sources` (paths relative to `project_dir`) and produces a
    /// `WeightsLock` plus a `name -> absolute path` map for downstream
    /// pushers. Honors cancellation between files and between sources; a
    /// hash already in flight for a single file runs to completion.
    pub async fn generate(
        project_dir: &Path,
        sources: &[WeightSource],
        dest_prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<(WeightsLock, HashMap<String, PathBuf>)> {
        let mut files = Vec::new();
        let mut paths = HashMap::new();

        for source in sources {
            if cancel.is_cancelled() {
                return Err(PusherError::Cancelled);
            }

            let abs_source = project_dir.join(&source.source);
            if !abs_source.exists() {
                return Err(PusherError::WeightSourceNotFound(
                    source.source.display().to_string(),
                ));
            }

            if abs_source.is_dir() {
                Self::walk_directory(&abs_source, source, dest_prefix, cancel, &mut files, &mut paths)
                    .await?;
            } else {
                let rel_base = abs_source.parent().unwrap_or(project_dir);
                Self::process_file(&abs_source, rel_base, source, dest_prefix, &mut files, &mut paths)
                    .await?;
            }
        }

        Ok((
            WeightsLock {
                version: "1.0".to_string(),
                created: chrono::Utc::now().to_rfc3339(),
                files,
            },
            paths,
        ))
    }

    async fn walk_directory(
        dir: &Path,
        source: &WeightSource,
        dest_prefix: &str,
        cancel: &CancellationToken,
        files: &mut Vec<WeightFile>,
        paths: &mut HashMap<String, PathBuf>,
    ) -> Result<()> {
        let entries: Vec<PathBuf> = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .collect();

        for abs_path in entries {
            if cancel.is_cancelled() {
                return Err(PusherError::Cancelled);
            }
            Self::process_file(&abs_path, dir, source, dest_prefix, files, paths).await?;
        }
        Ok(())
    }

    async fn process_file(
        abs_path: &Path,
        rel_base: &Path,
        source: &WeightSource,
        dest_prefix: &str,
        files: &mut Vec<WeightFile>,
        paths: &mut HashMap<String, PathBuf>,
    ) -> Result<()> {
        let (digest, size) = hash_file_streaming(abs_path).await?;

        let name = source.name.clone().unwrap_or_else(|| {
            abs_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| abs_path.display().to_string())
        });

        let dest = source.target.clone().unwrap_or_else(|| {
            let rel = abs_path
                .strip_prefix(rel_base)
                .unwrap_or(abs_path)
                .to_string_lossy()
                .replace('\\', "/");
            format!("{}/{}", dest_prefix.trim_end_matches('/'), rel)
        });

        files.push(WeightFile {
            name: name.clone(),
            dest,
            digest: digest.clone(),
            digest_original: digest,
            size,
            size_uncompressed: size,
            media_type: media_types::WEIGHT_LAYER.to_string(),
        });
        paths.insert(name, abs_path.to_path_buf());
        Ok(())
    }
}
