//! Geometry shared by every stage of the engine.
//!
//! Pixel-space boxes never cross a component boundary on their own: detection
//! signals are exchanged as [`NormalizedPoint`]s so that nothing downstream
//! depends on the absolute size of the analysed raster.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Center of the box in continuous pixel coordinates.
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Build a box from signed detector output, clipped to `width` x `height`.
    ///
    /// Returns `None` when nothing of the box survives the clip.
    pub fn clamped(x: i64, y: i64, w: i64, h: i64, width: u32, height: u32) -> Option<Self> {
        let left = x.max(0);
        let top = y.max(0);
        let right = (x + w).min(width as i64);
        let bottom = (y + h).min(height as i64);

        if right <= left || bottom <= top {
            return None;
        }

        Some(Self::new(
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }

    pub fn intersection_area(&self, other: &Self) -> u64 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return 0;
        }
        (right - left) as u64 * (bottom - top) as u64
    }

    /// Intersection over Union. Two empty boxes have an IoU of 0.
    pub fn iou(&self, other: &Self) -> f64 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union == 0 {
            return 0.0;
        }
        inter as f64 / union as f64
    }
}

/// A point in `[0,1] x [0,1]`, independent of the image resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub const CENTER: NormalizedPoint = NormalizedPoint { x: 0.5, y: 0.5 };

    /// Creates a point, clamping both coordinates into `[0,1]`.
    ///
    /// NaN collapses to the center coordinate so a degenerate signal can never
    /// poison the crop geometry.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }

    /// Normalizes a continuous pixel position against the raster size.
    pub fn from_pixels(px: f64, py: f64, width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return Self::CENTER;
        }
        Self::new(px / width as f64, py / height as f64)
    }

    /// Linear blend: `weight * self + (1 - weight) * other`.
    ///
    /// Evaluated as `other + weight * (self - other)` so blending a point with
    /// itself is exact.
    pub fn blend(self, other: NormalizedPoint, weight: f64) -> Self {
        Self::new(
            other.x + weight * (self.x - other.x),
            other.y + weight * (self.y - other.y),
        )
    }

    pub fn distance(&self, other: &NormalizedPoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl Default for NormalizedPoint {
    fn default() -> Self {
        Self::CENTER
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.5
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Region of the source image that will be resampled into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = BoundingBox::new(10, 10, 20, 20);
        let b = BoundingBox::new(100, 100, 20, 20);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        // Overlap 10x20 = 200, union 400 + 400 - 200 = 600
        let a = BoundingBox::new(0, 0, 20, 20);
        let b = BoundingBox::new(10, 0, 20, 20);
        assert!((a.iou(&b) - 200.0 / 600.0).abs() < 1e-12);
    }

    #[test]
    fn test_iou_touching_edges_is_zero() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(10, 0, 10, 10);
        assert_eq!(a.intersection_area(&b), 0);
    }

    #[test]
    fn test_clamped_box() {
        let b = BoundingBox::clamped(-5, -5, 20, 20, 100, 100).unwrap();
        assert_eq!(b, BoundingBox::new(0, 0, 15, 15));

        let b = BoundingBox::clamped(90, 95, 20, 20, 100, 100).unwrap();
        assert_eq!(b, BoundingBox::new(90, 95, 10, 5));

        assert!(BoundingBox::clamped(120, 0, 10, 10, 100, 100).is_none());
        assert!(BoundingBox::clamped(0, 0, 0, 10, 100, 100).is_none());
    }

    #[test]
    fn test_point_clamps() {
        let p = NormalizedPoint::new(-0.5, 1.5);
        assert_eq!(p, NormalizedPoint::new(0.0, 1.0));
        let p = NormalizedPoint::new(f64::NAN, 0.25);
        assert_eq!(p, NormalizedPoint::new(0.5, 0.25));
    }

    #[test]
    fn test_point_blend() {
        let a = NormalizedPoint::new(1.0, 0.0);
        let b = NormalizedPoint::new(0.0, 1.0);
        let p = a.blend(b, 0.7);
        assert!((p.x - 0.7).abs() < 1e-12);
        assert!((p.y - 0.3).abs() < 1e-12);

        let c = NormalizedPoint::CENTER;
        assert_eq!(c.blend(c, 0.3), c);
    }
}
