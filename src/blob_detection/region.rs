//! Scan regions, absolute or relative to the current frame size

use crate::frame::Rect;
use serde::{Deserialize, Serialize};

/// Rectangle stored as percentages (0-100) of a frame's width and height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PercentRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn full() -> Self {
        Self::new(0.0, 0.0, 100.0, 100.0)
    }

    /// Express `rect` relative to a `frame_width` x `frame_height` frame
    pub fn from_rect(rect: Rect, frame_width: u32, frame_height: u32) -> Self {
        let pct = |v: u32, total: u32| {
            if total == 0 {
                0.0
            } else {
                v as f64 * 100.0 / total as f64
            }
        };
        Self::new(
            pct(rect.x, frame_width),
            pct(rect.y, frame_height),
            pct(rect.width, frame_width),
            pct(rect.height, frame_height),
        )
    }

    /// Resolve against a frame size; the result is not clipped
    pub fn to_rect(&self, frame_width: u32, frame_height: u32) -> Rect {
        let px = |p: f64, total: u32| (p.clamp(0.0, 100.0) * total as f64 / 100.0).round() as u32;
        Rect::new(
            px(self.x, frame_width),
            px(self.y, frame_height),
            px(self.width, frame_width),
            px(self.height, frame_height),
        )
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Where in a frame the blob detector looks
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanRegion {
    #[default]
    Full,
    Absolute(Rect),
    Percent(PercentRect),
}

impl ScanRegion {
    /// Pixel rectangle for the current frame size, clipped to the frame
    pub fn resolve(&self, frame_width: u32, frame_height: u32) -> Rect {
        let rect = match self {
            ScanRegion::Full => Rect::full(frame_width, frame_height),
            ScanRegion::Absolute(rect) => *rect,
            ScanRegion::Percent(pct) => pct.to_rect(frame_width, frame_height),
        };
        rect.clip_to(frame_width, frame_height)
    }

    /// Percent form of this region as seen at the given frame size
    pub fn to_percent(&self, frame_width: u32, frame_height: u32) -> PercentRect {
        match self {
            ScanRegion::Full => PercentRect::full(),
            ScanRegion::Absolute(rect) => PercentRect::from_rect(*rect, frame_width, frame_height),
            ScanRegion::Percent(pct) => *pct,
        }
    }
}
