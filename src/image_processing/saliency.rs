//! Bottom-up visual saliency.
//!
//! Two estimators are tried in order: a fine-grained center-surround contrast
//! map and, when that yields no usable response, the spectral residual of the
//! log-amplitude spectrum. Both run on a downscaled grayscale proxy.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::filter::gaussian_blur_f32;
use imageproc::rect::Rect;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tracing::{debug, trace};

use super::stats::{downscale_to_max_side, percentile};
use crate::geometry::{BoundingBox, NormalizedPoint};

/// Below this size on either side a map carries no usable structure
const MIN_MAP_SIDE: u32 = 8;

/// (center radius, surround radius) pairs, in proxy pixels
const CENTER_SURROUND_SCALES: [(u32, u32); 4] = [(0, 3), (1, 7), (2, 15), (4, 31)];

/// The widest surround window must fit inside the proxy for every scale to count
const MIN_FINE_GRAINED_SIDE: u32 = 2 * CENTER_SURROUND_SCALES[3].1 + 1;

/// Side of the square raster the spectral residual is computed on
const SPECTRAL_SIDE: u32 = 64;

const FLAT_EPSILON: f32 = 1e-6;

const FACE_OUTLINE: Rgb<u8> = Rgb([0, 255, 0]);
const MARKER_FILL: Rgb<u8> = Rgb([255, 0, 0]);
const MARKER_CROSS: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaliencyConfig {
    /// When false the resolver skips saliency and goes straight to the fallback path
    pub enabled: bool,
    /// Longer side of the analysis proxy
    pub max_side: u32,
    /// Values below this quantile are zeroed before the centroid is taken
    pub percentile: f64,
}

impl Default for SaliencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_side: 256,
            percentile: 0.80,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SaliencyMethod {
    FineGrained,
    SpectralResidual,
}

/// 8-bit attention map stretched over the full source frame.
#[derive(Debug, Clone)]
pub struct SaliencyMap {
    values: GrayImage,
    source_width: u32,
    source_height: u32,
    method: SaliencyMethod,
}

impl SaliencyMap {
    pub fn new(values: GrayImage, source_width: u32, source_height: u32, method: SaliencyMethod) -> Self {
        Self {
            values,
            source_width,
            source_height,
            method,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.values.dimensions()
    }

    pub fn source_dimensions(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }

    pub fn method(&self) -> SaliencyMethod {
        self.method
    }

    /// The map as a standalone grayscale artifact at map resolution.
    pub fn to_image(&self) -> GrayImage {
        self.values.clone()
    }

    /// Intensity-weighted centroid after zeroing everything below `quantile`.
    ///
    /// Returns `None` when no weight survives the threshold.
    pub fn centroid(&self, quantile: f64) -> Option<NormalizedPoint> {
        let samples: Vec<f32> = self.values.pixels().map(|p| p[0] as f32).collect();
        let threshold = percentile(&samples, quantile);

        let mut total = 0.0f64;
        let mut sum_x = 0.0f64;
        let mut sum_y = 0.0f64;
        for (x, y, pixel) in self.values.enumerate_pixels() {
            let value = pixel[0] as f32;
            if value < threshold || value == 0.0 {
                continue;
            }
            let weight = value as f64;
            total += weight;
            sum_x += weight * (x as f64 + 0.5);
            sum_y += weight * (y as f64 + 0.5);
        }

        if total <= 0.0 {
            return None;
        }

        let (width, height) = self.values.dimensions();
        Some(NormalizedPoint::from_pixels(
            sum_x / total,
            sum_y / total,
            width,
            height,
        ))
    }

    /// Map upscaled to the source frame with face outlines and a focal marker.
    pub fn render_debug(&self, point: NormalizedPoint, faces: &[BoundingBox]) -> RgbImage {
        let width = self.source_width.max(1);
        let height = self.source_height.max(1);
        let scaled = imageops::resize(&self.values, width, height, FilterType::Triangle);
        let mut canvas = DynamicImage::ImageLuma8(scaled).to_rgb8();

        for face in faces {
            let rect = Rect::at(face.x as i32, face.y as i32)
                .of_size(face.width.max(1), face.height.max(1));
            draw_hollow_rect_mut(&mut canvas, rect, FACE_OUTLINE);
        }

        let cx = ((point.x * width as f64) as i32).min(width as i32 - 1);
        let cy = ((point.y * height as f64) as i32).min(height as i32 - 1);
        let radius = (width.min(height) as i32 / 60).max(3);
        draw_filled_circle_mut(&mut canvas, (cx, cy), radius, MARKER_FILL);
        draw_cross_mut(&mut canvas, MARKER_CROSS, cx, cy);

        canvas
    }
}

#[derive(Debug, Clone, Default)]
pub struct SaliencyEstimator {
    config: SaliencyConfig,
}

impl SaliencyEstimator {
    pub fn new(config: SaliencyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SaliencyConfig {
        &self.config
    }

    /// Focal point and map, or `None` when neither method yields a usable map.
    pub fn estimate(&self, image: &RgbImage) -> Option<(NormalizedPoint, SaliencyMap)> {
        if !self.config.enabled {
            return None;
        }

        let (source_width, source_height) = image.dimensions();
        let proxy = downscale_to_max_side(image, self.config.max_side);
        let gray = imageops::grayscale(&*proxy);

        let (method, values) = match fine_grained(&gray) {
            Some(values) => (SaliencyMethod::FineGrained, values),
            None => {
                debug!("Fine-grained saliency produced no response, trying spectral residual");
                match spectral_residual(&gray) {
                    Some(values) => (SaliencyMethod::SpectralResidual, values),
                    None => {
                        debug!("Saliency unavailable for this image");
                        return None;
                    }
                }
            }
        };

        let map = SaliencyMap::new(values, source_width, source_height, method);
        let point = map.centroid(self.config.percentile)?;
        debug!(%method, x = point.x, y = point.y, "Saliency centroid");
        Some((point, map))
    }
}

/// Summed-area table over a grayscale raster, one row and column of padding.
struct IntegralImage {
    width: u32,
    height: u32,
    sums: Vec<u64>,
}

impl IntegralImage {
    fn new(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let stride = width as usize + 1;
        let mut sums = vec![0u64; stride * (height as usize + 1)];

        for y in 0..height as usize {
            let mut row = 0u64;
            for x in 0..width as usize {
                row += gray.get_pixel(x as u32, y as u32)[0] as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }

        Self { width, height, sums }
    }

    /// Mean over the `(2r+1)^2` box around `(x, y)`, clipped to the raster.
    fn box_mean(&self, x: u32, y: u32, radius: u32) -> f64 {
        let left = x.saturating_sub(radius) as usize;
        let top = y.saturating_sub(radius) as usize;
        let right = (x + radius + 1).min(self.width) as usize;
        let bottom = (y + radius + 1).min(self.height) as usize;

        let stride = self.width as usize + 1;
        let sum = self.sums[bottom * stride + right] + self.sums[top * stride + left]
            - self.sums[top * stride + right]
            - self.sums[bottom * stride + left];
        let count = ((right - left) * (bottom - top)) as f64;
        sum as f64 / count
    }
}

/// On/off center-surround contrast summed over several scales.
///
/// Proxies narrower than the widest surround window are left to the
/// spectral residual.
fn fine_grained(gray: &GrayImage) -> Option<GrayImage> {
    let (width, height) = gray.dimensions();
    if width < MIN_FINE_GRAINED_SIDE || height < MIN_FINE_GRAINED_SIDE {
        trace!(width, height, "Proxy smaller than the widest surround window");
        return None;
    }

    let integral = IntegralImage::new(gray);
    let mut response = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let contrast: f64 = CENTER_SURROUND_SCALES
                .iter()
                .map(|&(center, surround)| {
                    (integral.box_mean(x, y, center) - integral.box_mean(x, y, surround)).abs()
                })
                .sum();
            response.push(contrast as f32);
        }
    }

    stretch_to_u8(width, height, &response)
}

/// Spectral residual saliency on a fixed-size square resample.
fn spectral_residual(gray: &GrayImage) -> Option<GrayImage> {
    let (width, height) = gray.dimensions();
    if width < MIN_MAP_SIDE || height < MIN_MAP_SIDE {
        return None;
    }
    let first = gray.get_pixel(0, 0)[0];
    if gray.pixels().all(|p| p[0] == first) {
        return None;
    }

    let n = SPECTRAL_SIDE as usize;
    let small = imageops::resize(gray, SPECTRAL_SIDE, SPECTRAL_SIDE, FilterType::Triangle);
    let mut spectrum: Vec<Complex<f64>> = small
        .pixels()
        .map(|p| Complex::new(p[0] as f64 / 255.0, 0.0))
        .collect();

    let mut planner = FftPlanner::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    fft_2d(&mut spectrum, n, forward.as_ref());

    let log_amplitude: Vec<f64> = spectrum.iter().map(|c| c.norm().max(1e-12).ln()).collect();
    let smoothed = mean_3x3(&log_amplitude, n);
    for (i, c) in spectrum.iter_mut().enumerate() {
        *c = Complex::from_polar((log_amplitude[i] - smoothed[i]).exp(), c.arg());
    }

    fft_2d(&mut spectrum, n, inverse.as_ref());

    let energy: Vec<f32> = spectrum.iter().map(|c| c.norm_sqr() as f32).collect();
    let raw = stretch_to_u8(SPECTRAL_SIDE, SPECTRAL_SIDE, &energy)?;
    let blurred = gaussian_blur_f32(&raw, 2.5);
    let values: Vec<f32> = blurred.pixels().map(|p| p[0] as f32).collect();
    trace!("Spectral residual computed");
    stretch_to_u8(SPECTRAL_SIDE, SPECTRAL_SIDE, &values)
}

fn fft_2d(data: &mut [Complex<f64>], n: usize, fft: &dyn Fft<f64>) {
    for row in data.chunks_exact_mut(n) {
        fft.process(row);
    }
    transpose(data, n);
    for row in data.chunks_exact_mut(n) {
        fft.process(row);
    }
    transpose(data, n);
}

fn transpose(data: &mut [Complex<f64>], n: usize) {
    for i in 0..n {
        for j in (i + 1)..n {
            data.swap(i * n + j, j * n + i);
        }
    }
}

/// 3x3 box mean with edge replication.
fn mean_3x3(values: &[f64], n: usize) -> Vec<f64> {
    let at = |x: isize, y: isize| {
        let x = x.clamp(0, n as isize - 1) as usize;
        let y = y.clamp(0, n as isize - 1) as usize;
        values[y * n + x]
    };

    let mut out = Vec::with_capacity(values.len());
    for y in 0..n as isize {
        for x in 0..n as isize {
            let mut sum = 0.0;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    sum += at(x + dx, y + dy);
                }
            }
            out.push(sum / 9.0);
        }
    }
    out
}

/// Min-max stretch into `0..=255`; `None` for a flat response.
fn stretch_to_u8(width: u32, height: u32, values: &[f32]) -> Option<GrayImage> {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if !range.is_finite() || range <= FLAT_EPSILON {
        return None;
    }

    Some(GrayImage::from_fn(width, height, |x, y| {
        let v = values[(y * width + x) as usize];
        Luma([((v - min) / range * 255.0).round() as u8])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    fn square_on_black(size: u32, left: u32, top: u32, side: u32) -> RgbImage {
        ImageBuffer::from_fn(size, size, |x, y| {
            if (left..left + side).contains(&x) && (top..top + side).contains(&y) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn test_centroid_tracks_bright_square() {
        let img = square_on_black(128, 80, 16, 32);
        let (point, map) = SaliencyEstimator::default().estimate(&img).unwrap();
        assert_eq!(map.method(), SaliencyMethod::FineGrained);
        assert_eq!(map.source_dimensions(), (128, 128));
        assert!((point.x - 0.75).abs() < 0.06, "x = {}", point.x);
        assert!((point.y - 0.25).abs() < 0.06, "y = {}", point.y);
    }

    #[test]
    fn test_proxy_is_bounded() {
        let img = square_on_black(600, 100, 100, 200);
        let (_, map) = SaliencyEstimator::default().estimate(&img).unwrap();
        assert_eq!(map.dimensions(), (256, 256));
        assert_eq!(map.to_image().dimensions(), (256, 256));
    }

    #[test]
    fn test_flat_image_has_no_saliency() {
        let img: RgbImage = ImageBuffer::from_pixel(64, 48, Rgb([255, 255, 255]));
        assert!(SaliencyEstimator::default().estimate(&img).is_none());
    }

    #[test]
    fn test_tiny_image_has_no_saliency() {
        let img = square_on_black(4, 1, 1, 2);
        assert!(SaliencyEstimator::default().estimate(&img).is_none());
    }

    #[test]
    fn test_disabled_estimator() {
        let estimator = SaliencyEstimator::new(SaliencyConfig {
            enabled: false,
            ..Default::default()
        });
        assert!(estimator.estimate(&square_on_black(64, 8, 8, 16)).is_none());
    }

    #[test]
    fn test_small_image_falls_back_to_spectral_residual() {
        let img = square_on_black(40, 26, 6, 8);
        let gray = imageops::grayscale(&img);
        assert!(fine_grained(&gray).is_none());

        let (point, map) = SaliencyEstimator::default().estimate(&img).unwrap();
        assert_eq!(map.method(), SaliencyMethod::SpectralResidual);
        assert_eq!(map.source_dimensions(), (40, 40));
        assert!((0.0..=1.0).contains(&point.x) && (0.0..=1.0).contains(&point.y));
    }

    #[test]
    fn test_narrow_strip_falls_back_to_spectral_residual() {
        let img: RgbImage = ImageBuffer::from_fn(300, 20, |x, _| {
            if (200..230).contains(&x) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let (_, map) = SaliencyEstimator::default().estimate(&img).unwrap();
        assert_eq!(map.method(), SaliencyMethod::SpectralResidual);
    }

    #[test]
    fn test_spectral_residual_direct() {
        let gray = imageops::grayscale(&square_on_black(96, 10, 50, 20));
        let map = spectral_residual(&gray).unwrap();
        assert_eq!(map.dimensions(), (SPECTRAL_SIDE, SPECTRAL_SIDE));
        assert!(map.pixels().any(|p| p[0] == 255));

        let flat: GrayImage = ImageBuffer::from_pixel(32, 32, Luma([17]));
        assert!(spectral_residual(&flat).is_none());
    }

    #[test]
    fn test_centroid_single_hot_pixel() {
        let mut values = GrayImage::new(10, 10);
        values.put_pixel(7, 2, Luma([200]));
        let map = SaliencyMap::new(values, 1000, 1000, SaliencyMethod::FineGrained);
        let point = map.centroid(0.8).unwrap();
        assert!((point.x - 0.75).abs() < 1e-12);
        assert!((point.y - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_centroid_of_empty_map() {
        let map = SaliencyMap::new(GrayImage::new(10, 10), 10, 10, SaliencyMethod::FineGrained);
        assert!(map.centroid(0.8).is_none());
    }

    #[test]
    fn test_render_debug_marks_point_and_faces() {
        let map = SaliencyMap::new(GrayImage::new(16, 16), 200, 100, SaliencyMethod::FineGrained);
        let faces = [BoundingBox::new(10, 10, 40, 40)];
        let canvas = map.render_debug(NormalizedPoint::new(0.5, 0.5), &faces);

        assert_eq!(canvas.dimensions(), (200, 100));
        assert_eq!(*canvas.get_pixel(10, 30), FACE_OUTLINE);
        assert_eq!(*canvas.get_pixel(100, 50), MARKER_CROSS);
        assert_eq!(*canvas.get_pixel(102, 52), MARKER_FILL);
    }
}
