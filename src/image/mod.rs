//! Access to a daemon-exported image tar.

pub mod tar_image;

pub use tar_image::TarImage;
