//! Upload-side adapters: wrapping the registry client's `WriteLayer` with
//! progress-channel lifecycle management, and adapting in-memory config
//! blobs to the layer contract.

pub mod config_blob;
pub mod layer_uploader;

pub use config_blob::ConfigBlobLayer;
pub use layer_uploader::{LayerUploader, ProgressFn};
