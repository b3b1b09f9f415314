use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{imageops, RgbImage};
use tracing::trace;

use crate::error::{FocalError, Result};
use crate::geometry::{CropRect, NormalizedPoint};

/// Focal-point-aware crop-to-fill.
///
/// The largest rectangle with the target aspect ratio is centered on the
/// focal point, slid back inside the frame when it would overhang, and
/// resampled to the exact target size with a Lanczos3 convolution.
#[derive(Debug, Clone, Copy)]
pub struct CropEngine {
    filter: FilterType,
}

impl Default for CropEngine {
    fn default() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }
}

impl CropEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source region that [`CropEngine::crop`] will resample.
    pub fn crop_rect(
        &self,
        src_width: u32,
        src_height: u32,
        target_width: u32,
        target_height: u32,
        focal: NormalizedPoint,
    ) -> Result<CropRect> {
        if src_width == 0 || src_height == 0 {
            return Err(FocalError::EmptyImage {
                width: src_width,
                height: src_height,
            });
        }
        if target_width == 0 || target_height == 0 {
            return Err(FocalError::InvalidTargetSize {
                width: target_width,
                height: target_height,
            });
        }

        let source_is_wider =
            src_width as u64 * target_height as u64 > target_width as u64 * src_height as u64;

        let (crop_width, crop_height) = if source_is_wider {
            let width = (src_height as f64 * target_width as f64 / target_height as f64).round() as u32;
            (width.clamp(1, src_width), src_height)
        } else {
            let height = (src_width as f64 * target_height as f64 / target_width as f64).round() as u32;
            (src_width, height.clamp(1, src_height))
        };

        let x = crop_origin(focal.x, src_width, crop_width);
        let y = crop_origin(focal.y, src_height, crop_height);

        Ok(CropRect {
            x,
            y,
            width: crop_width,
            height: crop_height,
        })
    }

    /// Crop around `focal` and resize to exactly `target_width` x `target_height`.
    pub fn crop(
        &self,
        img: &RgbImage,
        target_width: u32,
        target_height: u32,
        focal: NormalizedPoint,
    ) -> Result<RgbImage> {
        let (src_width, src_height) = img.dimensions();
        let rect = self.crop_rect(src_width, src_height, target_width, target_height, focal)?;
        trace!(?rect, target_width, target_height, "Crop rectangle");

        if rect.width == target_width && rect.height == target_height {
            return Ok(imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image());
        }

        self.resample(img, rect, target_width, target_height)
    }

    fn resample(
        &self,
        img: &RgbImage,
        rect: CropRect,
        target_width: u32,
        target_height: u32,
    ) -> Result<RgbImage> {
        let (src_width, src_height) = img.dimensions();

        let src_image = Image::from_vec_u8(src_width, src_height, img.as_raw().clone(), PixelType::U8x3)
            .map_err(|e| FocalError::Resize(e.to_string()))?;
        let mut dst_image = Image::new(target_width, target_height, PixelType::U8x3);

        let options = ResizeOptions::new()
            .resize_alg(ResizeAlg::Convolution(self.filter))
            .crop(
                rect.x as f64,
                rect.y as f64,
                rect.width as f64,
                rect.height as f64,
            );

        let mut resizer = Resizer::new();
        resizer
            .resize(&src_image, &mut dst_image, &options)
            .map_err(|e| FocalError::Resize(e.to_string()))?;

        RgbImage::from_raw(target_width, target_height, dst_image.into_vec()).ok_or_else(|| {
            FocalError::Resize(format!(
                "resampled buffer does not match {}x{}",
                target_width, target_height
            ))
        })
    }
}

/// `round(focal * src - crop / 2)`, clamped to `[0, src - crop]`.
fn crop_origin(focal: f64, src: u32, crop: u32) -> u32 {
    let ideal = (focal * src as f64 - crop as f64 / 2.0).round();
    let max = (src - crop) as f64;
    ideal.clamp(0.0, max) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn create_test_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_crop_rect_wide_source() {
        let engine = CropEngine::new();
        // 400x200 into a square: full height, 200 wide
        let rect = engine
            .crop_rect(400, 200, 100, 100, NormalizedPoint::CENTER)
            .unwrap();
        assert_eq!(rect, CropRect { x: 100, y: 0, width: 200, height: 200 });
    }

    #[test]
    fn test_crop_rect_tall_source() {
        let engine = CropEngine::new();
        // 300x600 into 3:2: full width, height 200
        let rect = engine
            .crop_rect(300, 600, 300, 200, NormalizedPoint::new(0.5, 0.25))
            .unwrap();
        assert_eq!(rect, CropRect { x: 0, y: 50, width: 300, height: 200 });
    }

    #[test]
    fn test_crop_rect_clamps_at_corners() {
        let engine = CropEngine::new();
        let origin = engine
            .crop_rect(400, 200, 100, 100, NormalizedPoint::new(0.0, 0.0))
            .unwrap();
        assert_eq!((origin.x, origin.y), (0, 0));

        let far = engine
            .crop_rect(400, 200, 100, 100, NormalizedPoint::new(1.0, 1.0))
            .unwrap();
        assert_eq!((far.x, far.y), (200, 0));
        assert!(far.x + far.width <= 400);
    }

    #[test]
    fn test_crop_rect_rejects_bad_sizes() {
        let engine = CropEngine::new();
        assert!(matches!(
            engine.crop_rect(100, 100, 0, 10, NormalizedPoint::CENTER),
            Err(FocalError::InvalidTargetSize { width: 0, height: 10 })
        ));
        assert!(matches!(
            engine.crop_rect(0, 100, 10, 10, NormalizedPoint::CENTER),
            Err(FocalError::EmptyImage { .. })
        ));
    }

    #[test]
    fn test_crop_exact_size_copies_pixels() {
        let img = create_test_image(200, 100);
        let out = CropEngine::new()
            .crop(&img, 100, 100, NormalizedPoint::new(1.0, 0.5))
            .unwrap();

        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(out.get_pixel(0, 0), img.get_pixel(100, 0));
        assert_eq!(out.get_pixel(99, 99), img.get_pixel(199, 99));
    }

    #[test]
    fn test_crop_resamples_to_target() {
        let img = create_test_image(640, 480);
        let engine = CropEngine::new();
        for &(w, h) in &[(100, 100), (320, 90), (50, 400), (1, 1)] {
            let out = engine.crop(&img, w, h, NormalizedPoint::new(0.3, 0.7)).unwrap();
            assert_eq!(out.dimensions(), (w, h));
        }
    }

    #[test]
    fn test_crop_upscales_small_source() {
        let img = create_test_image(20, 10);
        let out = CropEngine::new()
            .crop(&img, 80, 80, NormalizedPoint::CENTER)
            .unwrap();
        assert_eq!(out.dimensions(), (80, 80));
    }

    #[test]
    fn test_crop_is_deterministic() {
        let img = create_test_image(300, 200);
        let engine = CropEngine::new();
        let focal = NormalizedPoint::new(0.2, 0.9);
        let a = engine.crop(&img, 120, 90, focal).unwrap();
        let b = engine.crop(&img, 120, 90, focal).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }
}
