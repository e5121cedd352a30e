//! The pushers: `ImagePusher` (C5), `WeightPusher` (C6), `IndexBuilder`
//! (C7), and `BundlePusher` (C8), which composes the first three.

pub mod bundle_pusher;
pub mod image_pusher;
pub mod index_builder;
pub mod weight_pusher;

pub use bundle_pusher::{BundlePushOptions, BundlePusher};
pub use image_pusher::{ImagePushOptions, ImagePusher};
pub use index_builder::{IndexBuilder, WeightDescriptorEntry};
pub use weight_pusher::{WeightPushOptions, WeightPushResult, WeightPusher};
