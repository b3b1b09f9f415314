//! Heuristic image-type classification.
//!
//! Faces decide first (Group, Portrait). Everything else is an ordered cascade
//! of pixel-statistics predicates, one per label; the first predicate that
//! holds names the image. Each label maps to exactly one [`CropStrategy`].

use image::{GrayImage, RgbImage};
use imageproc::hough::{detect_lines, LineDetectionOptions};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::{debug, trace};

use super::stats::{
    central_region, downscale_to_max_side, edge_map, laplacian_variance, luminance_quartiles,
    to_hsv, EdgeThresholds,
};
use crate::geometry::BoundingBox;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImageType {
    Portrait,
    Group,
    Landscape,
    Architecture,
    Macro,
    Food,
    Document,
    Unknown,
}

/// How the resolver should weigh its signals for one image type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropStrategy {
    /// Share of the face centroid when blending with saliency (0 disables faces)
    pub face_weight: f64,
    /// Nominal share of the saliency signal
    pub saliency_weight: f64,
    /// Pull saliency-only focal points toward the frame center
    pub prefer_center: bool,
    /// Vertical anchor used when nudging toward the center, 0 = top
    pub focal_y_bias: f64,
}

impl ImageType {
    /// Labels reachable from pixel statistics alone, in evaluation order.
    pub const PIXEL_CASCADE: [ImageType; 5] = [
        ImageType::Document,
        ImageType::Architecture,
        ImageType::Landscape,
        ImageType::Food,
        ImageType::Macro,
    ];

    /// Static strategy table, one entry per label.
    pub const fn strategy(self) -> CropStrategy {
        match self {
            ImageType::Portrait => CropStrategy {
                face_weight: 0.9,
                saliency_weight: 0.1,
                prefer_center: false,
                focal_y_bias: 0.35,
            },
            ImageType::Group => CropStrategy {
                face_weight: 0.8,
                saliency_weight: 0.2,
                prefer_center: false,
                focal_y_bias: 0.4,
            },
            ImageType::Landscape => CropStrategy {
                face_weight: 0.0,
                saliency_weight: 1.0,
                prefer_center: false,
                focal_y_bias: 0.55,
            },
            ImageType::Architecture => CropStrategy {
                face_weight: 0.0,
                saliency_weight: 1.0,
                prefer_center: true,
                focal_y_bias: 0.45,
            },
            ImageType::Macro | ImageType::Food | ImageType::Document => CropStrategy {
                face_weight: 0.0,
                saliency_weight: 1.0,
                prefer_center: true,
                focal_y_bias: 0.5,
            },
            ImageType::Unknown => CropStrategy {
                face_weight: 0.7,
                saliency_weight: 0.3,
                prefer_center: false,
                focal_y_bias: 0.5,
            },
        }
    }
}

/// Thresholds for the pixel-statistics predicates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Statistics are computed on a proxy no larger than this on its longer side
    pub analysis_max_side: u32,
    /// Images smaller than this on either side skip the pixel tests
    pub min_analysis_side: u32,
    pub portrait_min_face_fraction: f64,
    /// Fraction of pixels in the darkest + lightest luminance quartiles
    pub document_mass: f64,
    pub architecture_min_lines: usize,
    /// Canny thresholds for the architecture line count
    pub edges: EdgeThresholds,
    /// Hough vote threshold as a fraction of the proxy's shorter side
    pub hough_vote_fraction: f64,
    pub sky_fraction: f64,
    pub vegetation_fraction: f64,
    pub warm_fraction: f64,
    pub macro_ratio: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            analysis_max_side: 1024,
            min_analysis_side: 8,
            portrait_min_face_fraction: 0.03,
            document_mass: 0.70,
            architecture_min_lines: 50,
            edges: EdgeThresholds::default(),
            hough_vote_fraction: 0.25,
            sky_fraction: 0.15,
            vegetation_fraction: 0.20,
            warm_fraction: 0.25,
            macro_ratio: 2.0,
        }
    }
}

/// Proxy raster and its luminance plane, shared by every predicate.
struct Analysis<'a> {
    rgb: &'a RgbImage,
    gray: GrayImage,
}

#[derive(Debug, Clone, Default)]
pub struct ImageTypeClassifier {
    config: ClassifierConfig,
}

impl ImageTypeClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Label the image. Always returns exactly one of the eight labels.
    pub fn classify(&self, image: &RgbImage, faces: &[BoundingBox]) -> ImageType {
        let (width, height) = image.dimensions();

        if let Some(label) = self.classify_by_faces(faces, width, height) {
            debug!(faces = faces.len(), %label, "Classified from faces");
            return label;
        }

        if width < self.config.min_analysis_side || height < self.config.min_analysis_side {
            trace!(width, height, "Image too small for pixel statistics");
            return ImageType::Unknown;
        }

        let proxy = downscale_to_max_side(image, self.config.analysis_max_side);
        let analysis = Analysis {
            rgb: &proxy,
            gray: image::imageops::grayscale(&*proxy),
        };

        let label = ImageType::PIXEL_CASCADE
            .into_iter()
            .find(|&label| self.matches(label, &analysis))
            .unwrap_or(ImageType::Unknown);

        debug!(%label, "Classified from pixel statistics");
        label
    }

    fn classify_by_faces(&self, faces: &[BoundingBox], width: u32, height: u32) -> Option<ImageType> {
        match faces {
            [] => None,
            [face] => {
                let frame_area = width as f64 * height as f64;
                let large_enough =
                    face.area() as f64 >= frame_area * self.config.portrait_min_face_fraction;
                let (_, center_y) = face.center();
                let upper_two_thirds = center_y < height as f64 * 2.0 / 3.0;
                (large_enough && upper_two_thirds).then_some(ImageType::Portrait)
            }
            _ => Some(ImageType::Group),
        }
    }

    fn matches(&self, label: ImageType, analysis: &Analysis) -> bool {
        match label {
            ImageType::Document => self.is_document(&analysis.gray),
            ImageType::Architecture => self.is_architecture(&analysis.gray),
            ImageType::Landscape => self.is_landscape(analysis.rgb),
            ImageType::Food => self.is_food(analysis.rgb),
            ImageType::Macro => self.is_macro(&analysis.gray),
            ImageType::Portrait | ImageType::Group | ImageType::Unknown => false,
        }
    }

    /// Bimodal luminance: mass in the darkest and lightest quartiles.
    fn is_document(&self, gray: &GrayImage) -> bool {
        let buckets = luminance_quartiles(gray);
        let total: u64 = buckets.iter().sum();
        let extremes = (buckets[0] + buckets[3]) as f64 / total.max(1) as f64;
        trace!(extremes, "Document test");
        extremes > self.config.document_mass
    }

    /// Count axis-aligned Hough lines over Canny edges.
    fn is_architecture(&self, gray: &GrayImage) -> bool {
        let count = axis_aligned_line_count(gray, self.config.edges, self.config.hough_vote_fraction);
        trace!(lines = count, "Architecture test");
        count >= self.config.architecture_min_lines
    }

    /// Sky-blue in the upper 40% of the frame, or vegetation green anywhere.
    fn is_landscape(&self, rgb: &RgbImage) -> bool {
        let (width, height) = rgb.dimensions();
        let sky_rows = (height as f64 * 0.4) as u32;

        let mut sky = 0u64;
        let mut green = 0u64;
        for (_, y, pixel) in rgb.enumerate_pixels() {
            let hsv = to_hsv(pixel);
            if y < sky_rows && (90..=130).contains(&hsv.h) && hsv.s >= 50 && hsv.v >= 50 {
                sky += 1;
            }
            if (35..=85).contains(&hsv.h) && hsv.s >= 40 && hsv.v >= 40 {
                green += 1;
            }
        }

        let sky_ratio = sky as f64 / (width as u64 * sky_rows as u64).max(1) as f64;
        let green_ratio = green as f64 / (width as u64 * height as u64).max(1) as f64;
        trace!(sky_ratio, green_ratio, "Landscape test");

        (sky_rows > 0 && sky_ratio >= self.config.sky_fraction)
            || green_ratio >= self.config.vegetation_fraction
    }

    /// Warm hues (reds, oranges, yellows) in the central 50% x 50%.
    fn is_food(&self, rgb: &RgbImage) -> bool {
        let (width, height) = rgb.dimensions();
        let region = central_region(width, height, 0.5);
        if region.area() == 0 {
            return false;
        }

        let mut warm = 0u64;
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                let hsv = to_hsv(rgb.get_pixel(x, y));
                if (hsv.h <= 25 || hsv.h >= 160) && hsv.s >= 50 && hsv.v >= 50 {
                    warm += 1;
                }
            }
        }

        let ratio = warm as f64 / region.area() as f64;
        trace!(ratio, "Food test");
        ratio >= self.config.warm_fraction
    }

    /// Sharp center against soft borders (shallow depth of field).
    fn is_macro(&self, gray: &GrayImage) -> bool {
        let (width, height) = gray.dimensions();
        let center = laplacian_variance(gray, central_region(width, height, 0.4));

        let strip_h = ((height as f64 * 0.2) as u32).max(1);
        let strip_w = ((width as f64 * 0.2) as u32).max(1);
        let strips = [
            BoundingBox::new(0, 0, width, strip_h),
            BoundingBox::new(0, height - strip_h, width, strip_h),
            BoundingBox::new(0, 0, strip_w, height),
            BoundingBox::new(width - strip_w, 0, strip_w, height),
        ];
        let edge = strips
            .iter()
            .map(|&strip| laplacian_variance(gray, strip))
            .sum::<f64>()
            / strips.len() as f64;

        trace!(center, edge, "Macro test");
        center > 0.0 && center > edge * self.config.macro_ratio
    }
}

/// Number of Hough lines that are near-horizontal or near-vertical.
///
/// Angles follow the polar convention `x cos(t) + y sin(t) = r`, so both
/// `t < 15` / `t > 165` and `75 <= t <= 105` are axis aligned.
pub fn axis_aligned_line_count(gray: &GrayImage, thresholds: EdgeThresholds, vote_fraction: f64) -> usize {
    let (width, height) = gray.dimensions();
    let edges = edge_map(gray, thresholds);
    let vote_threshold = ((width.min(height) as f64 * vote_fraction) as u32).max(10);

    detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold,
            suppression_radius: 8,
        },
    )
    .iter()
    .filter(|line| {
        let angle = line.angle_in_degrees;
        angle < 15 || angle > 165 || (75..=105).contains(&angle)
    })
    .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use strum::IntoEnumIterator;

    fn solid(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
        ImageBuffer::from_pixel(width, height, Rgb(color))
    }

    /// Deterministic gray noise in 96..160, never reaching the extreme quartiles
    fn noise_value(x: u32, y: u32) -> u8 {
        let mut v = x.wrapping_mul(374_761_393) ^ y.wrapping_mul(668_265_263);
        v = (v ^ (v >> 13)).wrapping_mul(1_274_126_177);
        96 + (v >> 24) as u8 % 64
    }

    #[test]
    fn test_strategy_table_covers_every_label() {
        let labels: Vec<ImageType> = ImageType::iter().collect();
        assert_eq!(labels.len(), 8);
        for label in labels {
            let s = label.strategy();
            assert!((0.0..=1.0).contains(&s.face_weight), "{label}");
            assert!((0.0..=1.0).contains(&s.saliency_weight), "{label}");
            assert!((0.0..=1.0).contains(&s.focal_y_bias), "{label}");
        }
        let unknown = ImageType::Unknown.strategy();
        assert_eq!(unknown.face_weight, 0.7);
        assert_eq!(unknown.saliency_weight, 0.3);
        assert!(!unknown.prefer_center);
        assert_eq!(unknown.focal_y_bias, 0.5);
    }

    #[test]
    fn test_labels_round_trip_through_strings() {
        assert_eq!(ImageType::Architecture.to_string(), "architecture");
        assert_eq!("food".parse::<ImageType>().unwrap(), ImageType::Food);
    }

    #[test]
    fn test_two_faces_is_group() {
        let classifier = ImageTypeClassifier::default();
        let img = solid(200, 200, [128, 128, 128]);
        let faces = [BoundingBox::new(10, 10, 30, 30), BoundingBox::new(100, 10, 30, 30)];
        assert_eq!(classifier.classify(&img, &faces), ImageType::Group);
    }

    #[test]
    fn test_single_large_high_face_is_portrait() {
        let classifier = ImageTypeClassifier::default();
        let img = solid(200, 200, [128, 128, 128]);
        // 40x40 = 4% of the frame, centered at y = 60
        let faces = [BoundingBox::new(80, 40, 40, 40)];
        assert_eq!(classifier.classify(&img, &faces), ImageType::Portrait);
    }

    #[test]
    fn test_single_face_failing_portrait_rules_falls_through() {
        let classifier = ImageTypeClassifier::default();
        let img = solid(200, 200, [128, 128, 128]);

        // Too small: 30x30 = 2.25%
        let small = [BoundingBox::new(80, 40, 30, 30)];
        assert_eq!(classifier.classify(&img, &small), ImageType::Unknown);

        // Low in the frame: center at y = 170
        let low = [BoundingBox::new(80, 150, 40, 40)];
        assert_eq!(classifier.classify(&img, &low), ImageType::Unknown);
    }

    #[test]
    fn test_document() {
        let classifier = ImageTypeClassifier::default();
        let img: RgbImage = ImageBuffer::from_fn(200, 260, |x, y| {
            if y % 20 < 6 && x > 20 && x < 180 {
                Rgb([10, 10, 10])
            } else {
                Rgb([250, 250, 250])
            }
        });
        assert_eq!(classifier.classify(&img, &[]), ImageType::Document);
    }

    #[test]
    fn test_white_canvas_is_document() {
        let classifier = ImageTypeClassifier::default();
        assert_eq!(
            classifier.classify(&solid(120, 80, [255, 255, 255]), &[]),
            ImageType::Document
        );
    }

    /// Mid-gray facade with darker 4px mullions every 20px in both directions
    fn facade() -> RgbImage {
        ImageBuffer::from_fn(640, 640, |x, y| {
            if x % 20 < 4 || y % 20 < 4 {
                Rgb([90, 90, 90])
            } else {
                Rgb([150, 150, 150])
            }
        })
    }

    #[test]
    fn test_architecture_grid() {
        let classifier = ImageTypeClassifier::default();
        let img = facade();
        let gray = image::imageops::grayscale(&img);
        assert!(axis_aligned_line_count(&gray, EdgeThresholds::default(), 0.25) >= 50);
        assert_eq!(classifier.classify(&img, &[]), ImageType::Architecture);
    }

    #[test]
    fn test_architecture_uses_configured_edge_thresholds() {
        // Thresholds meant for an unblurred Sobel miss a 60-level step
        let classifier = ImageTypeClassifier::new(ClassifierConfig {
            edges: EdgeThresholds { low: 50.0, high: 150.0 },
            ..Default::default()
        });
        assert_eq!(classifier.classify(&facade(), &[]), ImageType::Unknown);
    }

    #[test]
    fn test_sky_over_green_is_landscape() {
        let classifier = ImageTypeClassifier::default();
        let img: RgbImage = ImageBuffer::from_fn(200, 200, |_, y| {
            if y < 80 {
                Rgb([0, 0, 255])
            } else {
                Rgb([0, 255, 0])
            }
        });
        let label = classifier.classify(&img, &[]);
        assert_eq!(label, ImageType::Landscape);
        assert_eq!(label.strategy().face_weight, 0.0);
    }

    #[test]
    fn test_forest_is_landscape() {
        let classifier = ImageTypeClassifier::default();
        assert_eq!(
            classifier.classify(&solid(100, 100, [34, 139, 34]), &[]),
            ImageType::Landscape
        );
    }

    #[test]
    fn test_warm_center_is_food() {
        let classifier = ImageTypeClassifier::default();
        let img: RgbImage = ImageBuffer::from_fn(200, 200, |x, y| {
            if (40..160).contains(&x) && (40..160).contains(&y) {
                Rgb([230, 120, 30])
            } else {
                Rgb([128, 128, 128])
            }
        });
        assert_eq!(classifier.classify(&img, &[]), ImageType::Food);
    }

    #[test]
    fn test_sharp_center_soft_border_is_macro() {
        let classifier = ImageTypeClassifier::default();
        let img: RgbImage = ImageBuffer::from_fn(300, 300, |x, y| {
            if (90..210).contains(&x) && (90..210).contains(&y) {
                let v = noise_value(x, y);
                Rgb([v, v, v])
            } else {
                Rgb([128, 128, 128])
            }
        });
        assert_eq!(classifier.classify(&img, &[]), ImageType::Macro);
    }

    #[test]
    fn test_flat_gray_is_unknown() {
        let classifier = ImageTypeClassifier::default();
        assert_eq!(
            classifier.classify(&solid(64, 64, [128, 128, 128]), &[]),
            ImageType::Unknown
        );
    }

    #[test]
    fn test_tiny_image_is_unknown() {
        let classifier = ImageTypeClassifier::default();
        assert_eq!(classifier.classify(&solid(1, 1, [0, 255, 0]), &[]), ImageType::Unknown);
    }

    #[test]
    fn test_horizon_is_not_architecture() {
        let img: RgbImage = ImageBuffer::from_fn(200, 200, |_, y| {
            if y < 80 {
                Rgb([0, 0, 255])
            } else {
                Rgb([0, 255, 0])
            }
        });
        let gray = image::imageops::grayscale(&img);
        assert!(axis_aligned_line_count(&gray, EdgeThresholds::default(), 0.25) < 50);
    }
}
