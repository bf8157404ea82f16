//! Configuration for blob detection and the stability loop

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serializable RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn channels(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Every channel within `tolerance` of `other`
    pub fn matches(&self, other: [u8; 3], tolerance: Tolerance) -> bool {
        self.r.abs_diff(other[0]) <= tolerance.r
            && self.g.abs_diff(other[1]) <= tolerance.g
            && self.b.abs_diff(other[2]) <= tolerance.b
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(c: [u8; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rgb({},{},{})", self.r, self.g, self.b)
    }
}

/// Per-channel maximum absolute difference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tolerance {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Tolerance {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn uniform(v: u8) -> Self {
        Self::new(v, v, v)
    }

    /// Doubled, but never tighter than `floor` on any channel
    pub fn widened(&self, floor: u8) -> Self {
        let w = |c: u8| c.saturating_mul(2).max(floor);
        Self::new(w(self.r), w(self.g), w(self.b))
    }
}

/// Color families that never belong to the tracked feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackgroundFamily {
    /// Red dominates both green and blue by more than `margin` (docks, sand, skin)
    WarmHue { margin: u8 },
    /// Near-gray pixels at or above `min_brightness`
    Gray { max_spread: u8, min_brightness: u8 },
    Color { color: Rgb, tolerance: Tolerance },
}

impl BackgroundFamily {
    pub fn contains(&self, rgb: [u8; 3]) -> bool {
        let [r, g, b] = rgb.map(|c| c as i32);
        match self {
            BackgroundFamily::WarmHue { margin } => {
                let m = *margin as i32;
                r > g + m && r > b + m
            }
            BackgroundFamily::Gray {
                max_spread,
                min_brightness,
            } => {
                let spread = r.max(g).max(b) - r.min(g).min(b);
                spread <= *max_spread as i32 && crate::frame::brightness(rgb) >= *min_brightness as u32
            }
            BackgroundFamily::Color { color, tolerance } => color.matches(rgb, *tolerance),
        }
    }
}

/// Optional geometric filter applied after the size window
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeFilter {
    /// Longest side over shortest side of the bounding box
    pub max_aspect_ratio: f64,
    /// Minimum bounding box side in pixels
    pub min_extent: u32,
    /// Estimated pixel count over bounding box area
    pub min_fill_ratio: f64,
}

impl Default for ShapeFilter {
    fn default() -> Self {
        Self {
            max_aspect_ratio: 4.0,
            min_extent: 6,
            min_fill_ratio: 0.25,
        }
    }
}

/// Extra rules on the dark predicate for pixels the feature never has
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowColorFilter {
    /// Dark pixels above this brightness are too light, whatever the mean
    pub max_brightness: u32,
    /// Darker pixels are UI ink
    pub min_brightness: u32,
    /// Near-gray (channel spread below `gray_spread`) and darker than `gray_brightness` is text
    pub gray_spread: u8,
    pub gray_brightness: u32,
    /// Green above `grass_min_green` with blue under `grass_blue_ratio * green` is vegetation
    pub grass_min_green: u8,
    pub grass_blue_ratio: f64,
}

impl Default for ShadowColorFilter {
    fn default() -> Self {
        Self {
            max_brightness: 130,
            min_brightness: 12,
            gray_spread: 10,
            gray_brightness: 40,
            grass_min_green: 80,
            grass_blue_ratio: 0.25,
        }
    }
}

impl ShadowColorFilter {
    pub fn rejects(&self, rgb: [u8; 3]) -> bool {
        let level = crate::frame::brightness(rgb);
        let [r, g, b] = rgb;
        let spread = r.max(g).max(b) - r.min(g).min(b);
        level > self.max_brightness
            || level < self.min_brightness
            || (spread < self.gray_spread && level < self.gray_brightness)
            || (g > self.grass_min_green && (b as f64) < g as f64 * self.grass_blue_ratio)
    }
}

/// Ring of samples around a candidate that must mostly look like water
#[derive(Debug, Clone, PartialEq)]
pub struct SurroundCheck {
    pub radius: f64,
    pub samples: u32,
    /// Share of in-frame samples that must be water
    pub min_water_ratio: f64,
}

impl Default for SurroundCheck {
    fn default() -> Self {
        Self {
            radius: 30.0,
            samples: 12,
            min_water_ratio: 0.35,
        }
    }
}

/// Blue-green, moderately bright, not grass
pub fn is_water_color(rgb: [u8; 3]) -> bool {
    let level = crate::frame::brightness(rgb);
    let [r, g, b] = rgb.map(|c| c as u32);
    (35..=210).contains(&level)
        && (g >= r + 5 || b >= r + 5)
        && b as f64 >= g as f64 * 0.4
        && g >= 50
        && r <= 120
}

/// Bright near-white pixels in a box above a candidate confirm it
#[derive(Debug, Clone, PartialEq)]
pub struct BubbleCheck {
    pub width: u32,
    /// How far above the candidate the box starts
    pub height: u32,
    /// Rows right above the candidate that are skipped
    pub gap: u32,
    /// Bubble threshold is the region mean plus this offset, but at least `min_brightness`
    pub brightness_offset: u32,
    pub min_brightness: u32,
    /// Largest channel spread still counted as white
    pub max_spread: u8,
    pub min_pixels: u32,
}

impl Default for BubbleCheck {
    fn default() -> Self {
        Self {
            width: 60,
            height: 80,
            gap: 10,
            brightness_offset: 40,
            min_brightness: 150,
            max_spread: 50,
            min_pixels: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlobDetectorConfig {
    /// Sampling step of the fine pass, in pixels
    pub step: u32,
    /// Blob size window, in estimated pixels
    pub min_blob_size: u32,
    pub max_blob_size: u32,
    /// Dark threshold is mean brightness minus this offset
    pub dark_offset: u32,
    pub min_dark_threshold: u32,
    /// Points closer than `step * cluster_distance_factor` join the same blob
    pub cluster_distance_factor: u32,
    /// Weight of blob size against distance from the region center when scoring
    pub size_weight: f64,
    /// Floor for the widened location color tolerance
    pub min_color_tolerance: u8,
    pub background_families: Vec<BackgroundFamily>,
    pub shape_filter: Option<ShapeFilter>,
    /// Match only the learned color once one has been confirmed
    pub use_learned_color: bool,
    pub learned_color_tolerance: u8,
    pub shadow_color: Option<ShadowColorFilter>,
    pub surround_check: Option<SurroundCheck>,
    /// Candidates with bubbles above win over those without
    pub bubble_check: Option<BubbleCheck>,
    /// Unconfirmed candidates this close to the region border are dropped
    pub edge_margin: Option<u32>,
    /// With no blob, report the first pixel matching the location color exactly
    pub color_fallback: bool,
    pub fallback_step: u32,
}

impl Default for BlobDetectorConfig {
    fn default() -> Self {
        Self {
            step: 3,
            min_blob_size: 50,
            max_blob_size: 2000,
            dark_offset: 25,
            min_dark_threshold: 10,
            cluster_distance_factor: 3,
            size_weight: 0.1,
            min_color_tolerance: 20,
            background_families: vec![BackgroundFamily::WarmHue { margin: 25 }],
            shape_filter: None,
            use_learned_color: false,
            learned_color_tolerance: 35,
            shadow_color: None,
            surround_check: None,
            bubble_check: None,
            edge_margin: None,
            color_fallback: false,
            fallback_step: 5,
        }
    }
}

impl BlobDetectorConfig {
    pub fn cluster_distance(&self) -> f64 {
        (self.step * self.cluster_distance_factor) as f64
    }
}

/// Create the default configuration for shadow detection
pub fn create_default_config() -> BlobDetectorConfig {
    BlobDetectorConfig::default()
}

/// Configuration that adapts to a confirmed feature color and rejects odd shapes
pub fn create_learning_config() -> BlobDetectorConfig {
    BlobDetectorConfig {
        use_learned_color: true,
        shape_filter: Some(ShapeFilter::default()),
        ..BlobDetectorConfig::default()
    }
}

/// Every candidate check enabled, for busy scenes with text and scenery near the water
pub fn create_strict_config() -> BlobDetectorConfig {
    BlobDetectorConfig {
        shadow_color: Some(ShadowColorFilter::default()),
        surround_check: Some(SurroundCheck::default()),
        bubble_check: Some(BubbleCheck::default()),
        edge_margin: Some(50),
        color_fallback: true,
        ..BlobDetectorConfig::default()
    }
}

/// Coarser, faster configuration for large windows
pub fn create_coarse_config() -> BlobDetectorConfig {
    BlobDetectorConfig {
        step: 6,
        min_blob_size: 150,
        max_blob_size: 4000,
        ..BlobDetectorConfig::default()
    }
}

#[derive(Debug, Clone)]
pub struct StabilityConfig {
    /// Consecutive in-tolerance comparisons needed to settle
    pub required_stable_scans: u32,
    /// Per-axis distance still considered the same position
    pub position_tolerance: i32,
    pub scan_interval: Duration,
    pub max_wait: Duration,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            required_stable_scans: 2,
            position_tolerance: 20,
            scan_interval: Duration::from_millis(200),
            max_wait: Duration::from_secs(5),
        }
    }
}
