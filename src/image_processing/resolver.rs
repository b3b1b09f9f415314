//! Focal point resolution: faces, saliency and low-level fallbacks blended
//! according to the strategy of the classified image type.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum_macros::Display;
use tracing::debug;

use super::classify::{CropStrategy, ImageType, ImageTypeClassifier};
use super::face_detection::{face_centroid, FaceCascade, FaceDetector};
use super::fallback::fallback_point;
use super::saliency::{SaliencyEstimator, SaliencyMap};
use super::EngineConfig;
use crate::error::{FocalError, Result};
use crate::geometry::{BoundingBox, NormalizedPoint};

/// Share of the saliency point when a center-preferring strategy nudges it
const CENTER_PULL_SALIENCY_WEIGHT: f64 = 0.7;

/// Which signal produced the final focal point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FocalSource {
    /// Pinned by the caller, no detection ran
    Override,
    FacesAndSaliency,
    Faces,
    Saliency,
    /// Edge and entropy centroids
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub point: NormalizedPoint,
    /// `None` only for overridden points
    pub image_type: Option<ImageType>,
    pub strategy: Option<CropStrategy>,
    pub source: FocalSource,
    pub faces: Vec<BoundingBox>,
    pub saliency_map: Option<SaliencyMap>,
    /// Saliency map with face outlines and a focal marker, when enabled
    pub debug_image: Option<RgbImage>,
}

impl Resolution {
    fn pinned(point: NormalizedPoint) -> Self {
        Self {
            point,
            image_type: None,
            strategy: None,
            source: FocalSource::Override,
            faces: Vec::new(),
            saliency_map: None,
            debug_image: None,
        }
    }
}

/// Orchestrates detection, classification and blending for one image at a time.
///
/// The resolver holds no per-image state and can be shared across threads.
/// Without a face cascade every image is treated as faceless.
#[derive(Clone)]
pub struct FocalPointResolver {
    config: EngineConfig,
    face_detector: Option<FaceDetector>,
    classifier: ImageTypeClassifier,
    saliency: SaliencyEstimator,
}

impl FocalPointResolver {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            classifier: ImageTypeClassifier::new(config.classifier.clone()),
            saliency: SaliencyEstimator::new(config.saliency.clone()),
            face_detector: None,
            config,
        }
    }

    pub fn with_face_cascade(self, cascade: impl FaceCascade + 'static) -> Self {
        self.with_shared_cascade(Arc::new(cascade))
    }

    pub fn with_shared_cascade(mut self, cascade: Arc<dyn FaceCascade>) -> Self {
        self.face_detector = Some(FaceDetector::from_shared(cascade, self.config.faces.clone()));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn has_face_detector(&self) -> bool {
        self.face_detector.is_some()
    }

    pub fn resolve(&self, image: &RgbImage) -> Result<Resolution> {
        self.resolve_with_override(image, None)
    }

    /// Resolve the focal point, or return `pinned` untouched when supplied.
    pub fn resolve_with_override(
        &self,
        image: &RgbImage,
        pinned: Option<NormalizedPoint>,
    ) -> Result<Resolution> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(FocalError::EmptyImage { width, height });
        }

        if let Some(point) = pinned {
            debug!(x = point.x, y = point.y, "Using pinned focal point");
            return Ok(Resolution::pinned(NormalizedPoint::new(point.x, point.y)));
        }

        let faces = self
            .face_detector
            .as_ref()
            .map(|detector| detector.detect(image))
            .unwrap_or_default();

        let image_type = self.classifier.classify(image, &faces);
        let strategy = image_type.strategy();

        let saliency = self.saliency.estimate(image);
        let (saliency_point, saliency_map) = match saliency {
            Some((point, map)) => (Some(point), Some(map)),
            None => (None, None),
        };

        let face_point = if strategy.face_weight > 0.0 {
            face_centroid(&faces, width, height)
        } else {
            None
        };

        let (point, source) = match (face_point, saliency_point) {
            (Some(face), Some(salient)) => (
                face.blend(salient, strategy.face_weight),
                FocalSource::FacesAndSaliency,
            ),
            (Some(face), None) => (face, FocalSource::Faces),
            (None, Some(salient)) if strategy.prefer_center => {
                let anchor = NormalizedPoint::new(0.5, strategy.focal_y_bias);
                (
                    salient.blend(anchor, CENTER_PULL_SALIENCY_WEIGHT),
                    FocalSource::Saliency,
                )
            }
            (None, Some(salient)) => (salient, FocalSource::Saliency),
            (None, None) => (
                fallback_point(image, strategy.focal_y_bias, &self.config.fallback),
                FocalSource::Fallback,
            ),
        };

        debug!(
            %image_type,
            %source,
            faces = faces.len(),
            x = point.x,
            y = point.y,
            "Resolved focal point"
        );

        let debug_image = if self.config.render_debug {
            saliency_map
                .as_ref()
                .map(|map| map.render_debug(point, &faces))
        } else {
            None
        };

        Ok(Resolution {
            point,
            image_type: Some(image_type),
            strategy: Some(strategy),
            source,
            faces,
            saliency_map,
            debug_image,
        })
    }
}
