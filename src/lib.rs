//! Artifact Push Engine
//!
//! Uploads a locally built machine-learning model — a container image plus
//! optional weight files — to an OCI-compatible registry, either as a plain
//! image or as an OCI Image Index referencing the image and separate weight
//! artifacts.
//!
//! ## Features
//! - **Chunked, concurrency-bounded layer upload** with progress reporting.
//! - **Dual-path image push**: OCI chunked upload with selective fallback to
//!   a daemon (`docker push`) path on transient failure.
//! - **OCI 1.1 artifact manifests** for weight blobs, with a custom
//!   `artifactType`.
//! - **Content-addressed weight lock generation**, streamed so multi-GB
//!   weight files are never buffered whole.
//! - **Bundle assembly**: an OCI Image Index tying an image manifest to its
//!   weight artifacts via referrer annotations.
//!
//! ## Main Modules
//! - [`push`] - The pushers (`ImagePusher`, `WeightPusher`, `BundlePusher`, `IndexBuilder`).
//! - [`upload`] - Layer upload and config-blob adaptation.
//! - [`weights`] - Weight-lock generation and artifact-image building.
//! - [`registry`] - Registry/daemon client contracts and implementations.
//! - [`image`] - Lazy access to a daemon-exported image tar.
//! - [`model`] - The artifact/model data model.
//! - [`concurrency`] - Bounded-concurrency fan-out shared by every pusher.
//! - [`config`] - Environment-driven push configuration.
//! - [`digest`] - Digest calculation and validation utilities.
//! - [`error`] - Error types and classification helpers.
//! - [`logging`] - Verbosity-gated structured output.
//! - [`media_types`] - Wire-exact OCI and weight media types/annotation keys.
//! - [`common`] - Reference/repo string utilities shared across pushers.
//!
//! ## Library Usage
//! This crate has no CLI of its own — callers wire a `RegistryClient` and
//! `DaemonClient` implementation and drive `BundlePusher`/`ImagePusher`
//! directly.

pub mod common;
pub mod concurrency;
pub mod config;
pub mod digest;
pub mod error;
pub mod image;
pub mod logging;
pub mod media_types;
pub mod model;
pub mod push;
pub mod registry;
pub mod upload;
pub mod weights;

pub use config::PushConfig;
pub use digest::DigestUtils;
pub use error::{PusherError, Result};
pub use logging::Logger;
