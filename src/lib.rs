//! Focal-point detection, image-type classification and content-aware
//! crop-to-fill.
//!
//! [`FocalPointResolver`] picks the point of interest of an RGB image and
//! [`CropEngine`] cuts the largest window of the target aspect ratio around
//! it before resampling to the exact target size.
pub mod cli;
pub mod config_file;
pub mod error;
pub mod geometry;
pub mod image_processing;
pub mod json_output;
pub mod report;
pub mod utils;

pub use error::{FocalError, Result};
pub use geometry::{BoundingBox, CropRect, NormalizedPoint};
pub use image_processing::{
    CropEngine, CropStrategy, EngineConfig, FaceCascade, FocalPointResolver, FocalSource,
    ImageType, RawDetection, Resolution,
};
pub use json_output::JsonMessage;
