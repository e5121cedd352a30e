//! The registry/daemon client contracts the core pushes through, plus the
//! one production implementation of each this crate ships.

pub mod client;
pub mod daemon;
pub mod http;

pub use client::{Index, IndexManifest, Layer, ManifestDoc, ProgressUpdate, RegistryClient};
pub use daemon::{DaemonClient, ShellDaemonClient};
pub use http::HttpRegistryClient;
