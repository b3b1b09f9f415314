pub mod batch;
pub mod classify;
pub mod face_detection;
pub mod fallback;
pub mod resize;
pub mod resolver;
pub mod saliency;
pub mod stats;

use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{FocalError, Result};

pub use classify::{ClassifierConfig, CropStrategy, ImageType, ImageTypeClassifier};
#[cfg(feature = "rustface")]
pub use face_detection::RustfaceCascade;
pub use face_detection::{FaceCascade, FaceConfig, FaceDetector, RawDetection};
pub use fallback::FallbackConfig;
pub use resize::CropEngine;
pub use resolver::{FocalPointResolver, FocalSource, Resolution};
pub use saliency::{SaliencyConfig, SaliencyEstimator, SaliencyMap, SaliencyMethod};

/// Tunables for every stage of the engine.
///
/// Every field falls back to its default when absent from a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub faces: FaceConfig,
    pub classifier: ClassifierConfig,
    pub saliency: SaliencyConfig,
    pub fallback: FallbackConfig,
    /// Render the saliency debug overlay into [`Resolution::debug_image`]
    pub render_debug: bool,
}

/// Borrow the raster if it is already 8-bit RGB with a non-zero area.
pub fn validate_input(img: &DynamicImage) -> Result<&RgbImage> {
    let rgb = img
        .as_rgb8()
        .ok_or_else(|| FocalError::UnsupportedColorType(format!("{:?}", img.color())))?;

    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(FocalError::EmptyImage { width, height });
    }
    Ok(rgb)
}

/// Convert any decoded image into the 8-bit RGB raster the engine expects.
pub fn normalize_input(img: DynamicImage) -> Result<RgbImage> {
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(FocalError::EmptyImage { width, height });
    }

    Ok(match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    })
}
