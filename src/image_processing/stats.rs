//! Pixel statistics shared by the classifier, saliency and fallback stages.

use image::imageops::FilterType;
use image::{GrayImage, Rgb, RgbImage};
use imageproc::edges::canny;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::geometry::BoundingBox;

/// HSV triple on the 8-bit scale used by most vision toolkits:
/// hue in `0..180` (degrees / 2), saturation and value in `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

/// Convert an RGB pixel to 8-bit HSV
pub fn to_hsv(pixel: &Rgb<u8>) -> Hsv {
    let r = pixel[0] as f32;
    let g = pixel[1] as f32;
    let b = pixel[2] as f32;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };

    let hue_degrees = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let hue_degrees = if hue_degrees < 0.0 {
        hue_degrees + 360.0
    } else {
        hue_degrees
    };

    Hsv {
        h: ((hue_degrees / 2.0).round() as u32 % 180) as u8,
        s: s.round().min(255.0) as u8,
        v: max as u8,
    }
}

/// Luminance histogram split into the four quartile buckets
/// `[0,64) [64,128) [128,192) [192,256)`.
pub fn luminance_quartiles(gray: &GrayImage) -> [u64; 4] {
    let mut buckets = [0u64; 4];
    for pixel in gray.pixels() {
        buckets[(pixel[0] >> 6) as usize] += 1;
    }
    buckets
}

/// Variance of the 4-neighbour Laplacian response inside `region`.
///
/// Border pixels of the region are skipped; regions narrower than 3 px
/// report zero sharpness.
pub fn laplacian_variance(gray: &GrayImage, region: BoundingBox) -> f64 {
    if region.width < 3 || region.height < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;

    for y in (region.y + 1)..(region.bottom() - 1) {
        for x in (region.x + 1)..(region.right() - 1) {
            let center = gray.get_pixel(x, y)[0] as i32;
            let top = gray.get_pixel(x, y - 1)[0] as i32;
            let bottom = gray.get_pixel(x, y + 1)[0] as i32;
            let left = gray.get_pixel(x - 1, y)[0] as i32;
            let right = gray.get_pixel(x + 1, y)[0] as i32;

            let lap = (top + bottom + left + right - 4 * center) as f64;
            sum += lap;
            sum_sq += lap * lap;
            count += 1;
        }
    }

    if count == 0 {
        return 0.0;
    }
    let mean = sum / count as f64;
    (sum_sq / count as f64 - mean * mean).max(0.0)
}

/// Shannon entropy (bits) of the luminance values inside `region`.
pub fn region_entropy(gray: &GrayImage, region: BoundingBox) -> f64 {
    let mut histogram = [0u32; 256];
    for y in region.y..region.bottom() {
        for x in region.x..region.right() {
            histogram[gray.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    shannon_entropy(&histogram)
}

pub fn shannon_entropy(histogram: &[u32]) -> f64 {
    let total: u64 = histogram.iter().map(|&c| c as u64).sum();
    if total == 0 {
        return 0.0;
    }
    histogram
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

/// Value at quantile `q` (0..=1) using the nearest-rank rule on a sorted copy.
pub fn percentile(values: &[f32], q: f64) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = ((sorted.len() - 1) as f64 * q.clamp(0.0, 1.0)).round() as usize;
    sorted[rank]
}

/// A sub-region covering `fraction` of each dimension, centered in the frame.
pub fn central_region(width: u32, height: u32, fraction: f64) -> BoundingBox {
    let w = ((width as f64 * fraction).round() as u32).min(width);
    let h = ((height as f64 * fraction).round() as u32).min(height);
    BoundingBox::new((width - w) / 2, (height - h) / 2, w, h)
}

/// Hysteresis thresholds for [`edge_map`].
///
/// imageproc smooths with a sigma 1.4 Gaussian before the Sobel pass, so an
/// ideal step of `d` grey levels peaks at roughly `2 * d`. The defaults keep
/// steps of about 30 levels and up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeThresholds {
    pub low: f32,
    pub high: f32,
}

impl Default for EdgeThresholds {
    fn default() -> Self {
        Self { low: 20.0, high: 60.0 }
    }
}

/// Binary Canny edge map (0 or 255)
pub fn edge_map(gray: &GrayImage, thresholds: EdgeThresholds) -> GrayImage {
    canny(gray, thresholds.low, thresholds.high)
}

/// Downscale so that the longer side is at most `max_side`. Smaller images are borrowed.
pub fn downscale_to_max_side(img: &RgbImage, max_side: u32) -> Cow<'_, RgbImage> {
    let (width, height) = img.dimensions();
    let longest = width.max(height);
    if max_side == 0 || longest <= max_side {
        return Cow::Borrowed(img);
    }

    let scale = max_side as f64 / longest as f64;
    let new_width = ((width as f64 * scale).round() as u32).max(1);
    let new_height = ((height as f64 * scale).round() as u32).max(1);
    Cow::Owned(image::imageops::resize(
        img,
        new_width,
        new_height,
        FilterType::Triangle,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(to_hsv(&Rgb([255, 0, 0])), Hsv { h: 0, s: 255, v: 255 });
        assert_eq!(to_hsv(&Rgb([0, 255, 0])), Hsv { h: 60, s: 255, v: 255 });
        assert_eq!(to_hsv(&Rgb([0, 0, 255])), Hsv { h: 120, s: 255, v: 255 });
        assert_eq!(to_hsv(&Rgb([128, 128, 128])), Hsv { h: 0, s: 0, v: 128 });
    }

    #[test]
    fn test_hsv_wraps_magenta_reds() {
        // Hue of 350 degrees maps to 175 on the half-degree scale
        let hsv = to_hsv(&Rgb([255, 0, 43]));
        assert!(hsv.h >= 170 && hsv.h < 180, "got {:?}", hsv);
    }

    #[test]
    fn test_quartiles() {
        let img: GrayImage = ImageBuffer::from_fn(4, 1, |x, _| Luma([(x * 64) as u8]));
        assert_eq!(luminance_quartiles(&img), [1, 1, 1, 1]);
    }

    #[test]
    fn test_laplacian_variance_flat_vs_checker() {
        let flat: GrayImage = ImageBuffer::from_pixel(16, 16, Luma([90]));
        let checker: GrayImage =
            ImageBuffer::from_fn(16, 16, |x, y| Luma([if (x + y) % 2 == 0 { 0 } else { 255 }]));

        let region = BoundingBox::new(0, 0, 16, 16);
        assert_eq!(laplacian_variance(&flat, region), 0.0);
        assert!(laplacian_variance(&checker, region) > 1000.0);
        assert_eq!(laplacian_variance(&checker, BoundingBox::new(0, 0, 2, 16)), 0.0);
    }

    #[test]
    fn test_entropy() {
        assert_eq!(shannon_entropy(&[10, 0, 0]), 0.0);
        assert!((shannon_entropy(&[5, 5]) - 1.0).abs() < 1e-12);
        assert!((shannon_entropy(&[1, 1, 1, 1]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_percentile() {
        let values: Vec<f32> = (0..=100).map(|v| v as f32).collect();
        assert_eq!(percentile(&values, 0.8), 80.0);
        assert_eq!(percentile(&values, 0.0), 0.0);
        assert_eq!(percentile(&values, 1.0), 100.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_central_region() {
        assert_eq!(central_region(100, 50, 0.4), BoundingBox::new(30, 15, 40, 20));
        assert_eq!(central_region(1, 1, 0.5), BoundingBox::new(0, 0, 1, 1));
    }

    #[test]
    fn test_downscale_borrows_small_images() {
        let img = RgbImage::new(100, 40);
        assert!(matches!(downscale_to_max_side(&img, 256), Cow::Borrowed(_)));

        let scaled = downscale_to_max_side(&img, 50);
        assert_eq!(scaled.dimensions(), (50, 20));
    }

    #[test]
    fn test_default_edges_find_moderate_steps() {
        // 60-level step, the contrast of a plain facade against its mullions
        let step: GrayImage = ImageBuffer::from_fn(64, 64, |x, _| Luma([if x < 32 { 90 } else { 150 }]));
        let edges = edge_map(&step, EdgeThresholds::default());
        assert!(edges.enumerate_pixels().any(|(x, _, p)| p[0] == 255 && (30..=33).contains(&x)));
        assert!(edges.enumerate_pixels().all(|(x, _, p)| p[0] == 0 || (29..=34).contains(&x)));

        // Faint shading stays below the high threshold
        let faint: GrayImage = ImageBuffer::from_fn(64, 64, |x, _| Luma([if x < 32 { 120 } else { 128 }]));
        assert!(edge_map(&faint, EdgeThresholds::default()).pixels().all(|p| p[0] == 0));
    }
}
