//! Multi-scan consensus on a moving feature's position

use super::config::StabilityConfig;
use crate::frame::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityState {
    /// Position held for the required number of scans
    Settled(Point),
    /// Within tolerance of the previous scan, not yet enough of them
    Tracking { stable_scans: u32 },
    /// First sighting, or moved beyond tolerance
    Moving,
    /// Scan found nothing
    Lost,
}

/// Counts consecutive scans whose positions stay within a per-axis tolerance
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    required: u32,
    tolerance: i32,
    previous: Option<Point>,
    stable_scans: u32,
    scans: u32,
}

impl StabilityTracker {
    pub fn new(required: u32, tolerance: i32) -> Self {
        Self {
            required,
            tolerance,
            previous: None,
            stable_scans: 0,
            scans: 0,
        }
    }

    pub fn from_config(config: &StabilityConfig) -> Self {
        Self::new(config.required_stable_scans, config.position_tolerance)
    }

    pub fn observe(&mut self, position: Option<Point>) -> StabilityState {
        self.scans += 1;
        let Some(position) = position else {
            self.previous = None;
            self.stable_scans = 0;
            return StabilityState::Lost;
        };

        let held = self
            .previous
            .is_some_and(|prev| prev.axis_distance(&position) <= self.tolerance);
        self.previous = Some(position);

        if !held {
            self.stable_scans = 0;
            return StabilityState::Moving;
        }
        self.stable_scans += 1;
        if self.stable_scans >= self.required {
            StabilityState::Settled(position)
        } else {
            StabilityState::Tracking {
                stable_scans: self.stable_scans,
            }
        }
    }

    pub fn stable_scans(&self) -> u32 {
        self.stable_scans
    }

    pub fn scans(&self) -> u32 {
        self.scans
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.stable_scans = 0;
        self.scans = 0;
    }
}
