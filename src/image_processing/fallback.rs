//! Low-level focal estimates used when neither faces nor saliency are available.

use image::{GrayImage, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::stats::{edge_map, region_entropy, EdgeThresholds};
use crate::geometry::{BoundingBox, NormalizedPoint};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Share of the edge centroid in the edge/entropy blend
    pub edge_weight: f64,
    /// Cells per side of the entropy grid
    pub entropy_grid: u32,
    /// Pull of the strategy's vertical bias on the blended y coordinate
    pub y_bias_weight: f64,
    pub edges: EdgeThresholds,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            edge_weight: 0.3,
            entropy_grid: 10,
            y_bias_weight: 0.2,
            edges: EdgeThresholds::default(),
        }
    }
}

/// Centroid of the lightly blurred Canny edge map.
///
/// An image without edge energy yields the exact center.
pub fn edge_centroid(gray: &GrayImage, thresholds: EdgeThresholds) -> NormalizedPoint {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return NormalizedPoint::CENTER;
    }

    let edges = gaussian_blur_f32(&edge_map(gray, thresholds), 1.5);

    let mut total = 0.0f64;
    let mut sum_x = 0.0f64;
    let mut sum_y = 0.0f64;
    for (x, y, pixel) in edges.enumerate_pixels() {
        let weight = pixel[0] as f64;
        if weight > 0.0 {
            total += weight;
            sum_x += weight * (x as f64 + 0.5);
            sum_y += weight * (y as f64 + 0.5);
        }
    }

    if total <= 0.0 {
        return NormalizedPoint::CENTER;
    }
    NormalizedPoint::from_pixels(sum_x / total, sum_y / total, width, height)
}

/// Center of the highest-entropy cell of a `grid` x `grid` layout scanned
/// with a half-cell stride. The first cell wins ties.
pub fn entropy_centroid(gray: &GrayImage, grid: u32) -> NormalizedPoint {
    let (width, height) = gray.dimensions();
    let grid = grid.max(1);
    let cell_w = width / grid;
    let cell_h = height / grid;
    if cell_w == 0 || cell_h == 0 {
        return NormalizedPoint::CENTER;
    }

    let step_x = (cell_w / 2).max(1);
    let step_y = (cell_h / 2).max(1);

    let mut best: Option<(f64, BoundingBox)> = None;
    let mut y = 0;
    while y + cell_h <= height {
        let mut x = 0;
        while x + cell_w <= width {
            let cell = BoundingBox::new(x, y, cell_w, cell_h);
            let entropy = region_entropy(gray, cell);
            if best.map_or(true, |(score, _)| entropy > score) {
                best = Some((entropy, cell));
            }
            x += step_x;
        }
        y += step_y;
    }

    match best {
        Some((entropy, cell)) if entropy > 0.0 => {
            let (cx, cy) = cell.center();
            trace!(entropy, cx, cy, "Highest entropy cell");
            NormalizedPoint::from_pixels(cx, cy, width, height)
        }
        _ => NormalizedPoint::CENTER,
    }
}

/// Always-available estimate: edge and entropy centroids blended, then
/// nudged vertically toward `focal_y_bias`.
pub fn fallback_point(image: &RgbImage, focal_y_bias: f64, config: &FallbackConfig) -> NormalizedPoint {
    let gray = image::imageops::grayscale(image);
    let edge = edge_centroid(&gray, config.edges);
    let entropy = entropy_centroid(&gray, config.entropy_grid);
    let blended = edge.blend(entropy, config.edge_weight);

    let biased_y = blended.y + config.y_bias_weight * (focal_y_bias - blended.y);
    trace!(
        edge_x = edge.x,
        edge_y = edge.y,
        entropy_x = entropy.x,
        entropy_y = entropy.y,
        "Fallback signals"
    );
    NormalizedPoint::new(blended.x, biased_y)
}
