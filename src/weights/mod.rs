//! Weight-side modules: the build-time config shape, the lock-file
//! generator (C3), and the OCI artifact builder (C4).

pub mod artifact_builder;
pub mod config;
pub mod lock;

pub use artifact_builder::{BuiltWeightArtifact, WeightArtifactBuilder};
pub use config::{WeightConfig, WeightSource};
pub use lock::{WeightFile, WeightLockGenerator, WeightsLock};
