//! Frontal face detection.
//!
//! The raw scan is delegated to a [`FaceCascade`] (the SeetaFace cascade from
//! `rustface` in production, a scripted stub in tests). [`FaceDetector`] owns the
//! resolution-dependent minimum face size and the two post-processing passes:
//! a size filter and greedy non-maximum suppression.

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::geometry::{BoundingBox, NormalizedPoint};

/// Face detection tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    /// Absolute floor for the minimum detectable face side, in pixels
    pub min_face_px: u32,
    /// Minimum face side as a fraction of `min(width, height)`
    pub min_face_fraction: f64,
    /// Detections covering less than this fraction of the frame are dropped
    pub min_area_fraction: f64,
    /// Boxes overlapping an earlier survivor at or above this IoU are suppressed
    pub nms_iou_threshold: f64,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            min_face_px: 30,
            min_face_fraction: 0.015,
            min_area_fraction: 0.01,
            nms_iou_threshold: 0.5,
        }
    }
}

/// Unfiltered detector output. Coordinates are signed because cascades happily
/// report boxes hanging off the frame edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub confidence: f64,
}

/// Pluggable raw face scanner.
///
/// Implementations receive the luminance plane and the minimum face side the
/// detector wants; they must not filter or deduplicate on their own.
pub trait FaceCascade: Send + Sync {
    fn scan(&self, gray: &GrayImage, min_face_size: u32) -> Vec<RawDetection>;
}

/// Face cascade backed by the `rustface` crate (SeetaFace frontal model).
///
/// The model is loaded by the caller once and shared; every scan builds a fresh
/// detector from a clone of it, since rustface detectors are stateful.
#[cfg(feature = "rustface")]
pub struct RustfaceCascade {
    model: rustface::Model,
    score_thresh: f64,
    pyramid_scale_factor: f32,
    window_step: u32,
}

#[cfg(feature = "rustface")]
impl RustfaceCascade {
    pub fn new(model: rustface::Model) -> Self {
        Self {
            model,
            score_thresh: 2.0,
            pyramid_scale_factor: 0.8,
            window_step: 4,
        }
    }

    /// Read a SeetaFace model (`seeta_fd_frontal_v1.0.bin`) from any reader.
    pub fn from_reader<R: std::io::Read>(reader: R) -> crate::Result<Self> {
        let model = rustface::read_model(reader)
            .map_err(|e| crate::FocalError::Model(e.to_string()))?;
        Ok(Self::new(model))
    }

    pub fn from_path(path: &std::path::Path) -> crate::Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| crate::FocalError::Model(format!("{}: {}", path.display(), e)))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn with_score_thresh(mut self, score_thresh: f64) -> Self {
        self.score_thresh = score_thresh;
        self
    }
}

#[cfg(feature = "rustface")]
impl FaceCascade for RustfaceCascade {
    fn scan(&self, gray: &GrayImage, min_face_size: u32) -> Vec<RawDetection> {
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(min_face_size);
        detector.set_score_thresh(self.score_thresh);
        detector.set_pyramid_scale_factor(self.pyramid_scale_factor);
        detector.set_slide_window_step(self.window_step, self.window_step);

        let (width, height) = gray.dimensions();
        detector
            .detect(&rustface::ImageData::new(gray.as_raw(), width, height))
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                RawDetection {
                    x: bbox.x() as i64,
                    y: bbox.y() as i64,
                    width: bbox.width() as i64,
                    height: bbox.height() as i64,
                    confidence: face.score(),
                }
            })
            .collect()
    }
}

/// A clipped detection that still carries its confidence for ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredBox {
    pub bbox: BoundingBox,
    pub confidence: f64,
}

/// Face detector: cascade scan plus size filter and NMS.
#[derive(Clone)]
pub struct FaceDetector {
    cascade: Arc<dyn FaceCascade>,
    config: FaceConfig,
}

impl FaceDetector {
    pub fn new(cascade: impl FaceCascade + 'static, config: FaceConfig) -> Self {
        Self {
            cascade: Arc::new(cascade),
            config,
        }
    }

    pub fn from_shared(cascade: Arc<dyn FaceCascade>, config: FaceConfig) -> Self {
        Self { cascade, config }
    }

    pub fn config(&self) -> &FaceConfig {
        &self.config
    }

    /// `max(min_face_px, min_face_fraction * min(width, height))`
    pub fn min_face_size(&self, width: u32, height: u32) -> u32 {
        let scaled = (width.min(height) as f64 * self.config.min_face_fraction).round() as u32;
        self.config.min_face_px.max(scaled)
    }

    /// Detect faces. An empty result is the normal "no faces" outcome.
    pub fn detect(&self, image: &RgbImage) -> Vec<BoundingBox> {
        let (width, height) = image.dimensions();
        let min_face = self.min_face_size(width, height);

        if width < min_face || height < min_face {
            trace!(width, height, min_face, "Image smaller than minimum face, skipping scan");
            return Vec::new();
        }

        let gray = image::imageops::grayscale(image);
        let raw = self.cascade.scan(&gray, min_face);
        let raw_count = raw.len();

        let candidates: Vec<ScoredBox> = raw
            .into_iter()
            .filter_map(|d| {
                BoundingBox::clamped(d.x, d.y, d.width, d.height, width, height).map(|bbox| {
                    ScoredBox {
                        bbox,
                        confidence: d.confidence,
                    }
                })
            })
            .collect();

        let sized = filter_small_faces(candidates, width, height, self.config.min_area_fraction);
        let ordered = order_for_suppression(sized);
        let faces = non_maximum_suppression(&ordered, self.config.nms_iou_threshold);

        debug!(
            raw = raw_count,
            kept = faces.len(),
            min_face,
            "Face detection finished"
        );
        faces
    }
}

/// Drop detections whose area is below `min_fraction` of the frame.
pub fn filter_small_faces(
    candidates: Vec<ScoredBox>,
    width: u32,
    height: u32,
    min_fraction: f64,
) -> Vec<ScoredBox> {
    let min_area = width as f64 * height as f64 * min_fraction;
    candidates
        .into_iter()
        .filter(|c| c.bbox.area() as f64 >= min_area)
        .collect()
}

/// Stable order used as the NMS tie-break: confidence, then area, both
/// descending. Equal boxes keep the cascade's scan order.
pub fn order_for_suppression(mut candidates: Vec<ScoredBox>) -> Vec<ScoredBox> {
    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.bbox.area().cmp(&a.bbox.area()))
    });
    candidates
}

/// Greedy NMS over an immutable candidate list.
///
/// Walks the candidates in order; a candidate that survives suppresses every
/// later candidate whose IoU with it reaches `iou_threshold`.
pub fn non_maximum_suppression(candidates: &[ScoredBox], iou_threshold: f64) -> Vec<BoundingBox> {
    let mut suppressed = vec![false; candidates.len()];
    let mut kept = Vec::new();

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        kept.push(candidates[i].bbox);

        for j in (i + 1)..candidates.len() {
            if !suppressed[j] && candidates[i].bbox.iou(&candidates[j].bbox) >= iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    kept
}

/// Area-weighted centroid of the face boxes, normalized. `None` without faces.
pub fn face_centroid(faces: &[BoundingBox], width: u32, height: u32) -> Option<NormalizedPoint> {
    let total_area: f64 = faces.iter().map(|f| f.area() as f64).sum();
    if faces.is_empty() || total_area <= 0.0 {
        return None;
    }

    let (sum_x, sum_y) = faces.iter().fold((0.0, 0.0), |(sx, sy), face| {
        let (cx, cy) = face.center();
        let area = face.area() as f64;
        (sx + cx * area, sy + cy * area)
    });

    Some(NormalizedPoint::from_pixels(
        sum_x / total_area,
        sum_y / total_area,
        width,
        height,
    ))
}
