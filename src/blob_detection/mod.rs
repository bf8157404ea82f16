//! Blob detection for a moving, low-contrast feature
//!
//! A scan samples a region, keeps points darker than the region's mean (or
//! matching the location color), clusters them, filters the clusters by size,
//! shape and color, and scores the survivors. Optional stages reject candidates
//! that are not surrounded by water or hug the region border, prefer candidates
//! with bubbles above them, and fall back to a plain color scan.
//!
//! A stability loop repeats scans until the best blob stops moving, and the
//! cast transform converts the settled position into drag coordinates.

pub mod cluster;
pub mod config;
pub mod detector;
pub mod location;
pub mod region;
pub mod stability;
pub mod transform;


pub use cluster::{Blob, cluster_points};
pub use config::{
    BackgroundFamily, BlobDetectorConfig, BubbleCheck, Rgb, ShadowColorFilter, ShapeFilter,
    StabilityConfig, SurroundCheck, Tolerance, create_coarse_config, create_default_config,
    create_learning_config, create_strict_config, is_water_color,
};
pub use detector::{BlobDetector, LearnedColor, ScanReport, SettledFeature};
pub use location::{
    ConfigError, DEFAULT_LOCATION, LocationConfig, LocationConfigStore, builtin_locations,
    normalize_location_name,
};
pub use region::{PercentRect, ScanRegion};
pub use stability::{StabilityState, StabilityTracker};
pub use transform::{CastTransform, CastingResult, REFERENCE_HEIGHT, REFERENCE_WIDTH};
