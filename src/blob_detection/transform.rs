//! Conversion of a settled feature position into drag coordinates
//!
//! The drag starts at a fixed anchor and ends at a target mirrored around a
//! feature reference point. Everything is computed in a 1600x1151 reference
//! frame and scaled to the captured frame size.

use crate::frame::{Point, Rect};
use serde::Serialize;

pub const REFERENCE_WIDTH: u32 = 1600;
pub const REFERENCE_HEIGHT: u32 = 1151;

/// Anchor, target and feature position of one cast, all in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CastingResult {
    pub feature: Point,
    pub anchor: Point,
    pub target: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastTransform {
    pub anchor: (f64, f64),
    pub feature_reference: (f64, f64),
    pub factor_x: f64,
    pub factor_y: f64,
    /// Horizontal gain at the feature reference row and its change per reference height
    pub base_gain: f64,
    pub gain_slope: f64,
    /// Targets are clamped into this rectangle of the reference frame
    pub safe_area: Rect,
}

impl Default for CastTransform {
    fn default() -> Self {
        Self {
            anchor: (800.0, 846.0),
            feature_reference: (800.0, 820.0),
            factor_x: 120.0 / 429.0,
            factor_y: 169.0 / 428.0,
            base_gain: 0.75,
            gain_slope: 0.38,
            safe_area: Rect::new(100, 646, 1400, 363),
        }
    }
}

impl CastTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target for a feature at `feature` in a `frame_width` x `frame_height` frame
    pub fn cast(&self, feature: Point, frame_width: u32, frame_height: u32, vertical_adjustment: i32) -> CastingResult {
        let (sx, sy) = scale(frame_width, frame_height);
        let reference = (
            feature.x as f64 / sx,
            feature.y as f64 / sy + vertical_adjustment as f64,
        );
        let (tx, ty) = self.target_reference(reference);
        CastingResult {
            feature,
            anchor: to_frame(self.anchor, sx, sy),
            target: to_frame((tx, ty), sx, sy),
        }
    }

    /// Clamped target in reference coordinates
    pub fn target_reference(&self, feature: (f64, f64)) -> (f64, f64) {
        let (fx, fy) = feature;
        let (rx, ry) = self.feature_reference;
        let gain = self.base_gain + (ry - fy) / ry * self.gain_slope;
        let tx = self.anchor.0 + self.factor_x * (rx - fx) * gain;
        let ty = self.anchor.1 + self.factor_y * (ry - fy);

        let safe = self.safe_area;
        (
            tx.clamp(safe.x as f64, safe.right() as f64),
            ty.clamp(safe.y as f64, safe.bottom() as f64),
        )
    }

    /// Drag length in reference units, used to rank candidates by how far they are
    pub fn cast_power(&self, feature: Point, frame_width: u32, frame_height: u32, vertical_adjustment: i32) -> f64 {
        let (sx, sy) = scale(frame_width, frame_height);
        let (tx, ty) = self.target_reference((
            feature.x as f64 / sx,
            feature.y as f64 / sy + vertical_adjustment as f64,
        ));
        let dx = tx - self.anchor.0;
        let dy = ty - self.anchor.1;
        (dx * dx + dy * dy).sqrt()
    }
}

fn scale(frame_width: u32, frame_height: u32) -> (f64, f64) {
    let sx = frame_width.max(1) as f64 / REFERENCE_WIDTH as f64;
    let sy = frame_height.max(1) as f64 / REFERENCE_HEIGHT as f64;
    (sx, sy)
}

fn to_frame(p: (f64, f64), sx: f64, sy: f64) -> Point {
    Point::new((p.0 * sx).round() as i32, (p.1 * sy).round() as i32)
}
