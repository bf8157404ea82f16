//! Configuration for element lookups and where their data lives

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "FEATURE_LOCATOR_DATA_DIR";
pub const TEMPLATES_DIR: &str = "templates";
pub const ELEMENTS_FILE: &str = "elements.json";
pub const LOCATIONS_FILE: &str = "locations.json";

#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Confidence threshold for template matching (0.0 to 1.0)
    pub confidence_threshold: f32,
    /// Pixels searched beyond the template on each side when verifying a cached center
    pub verify_margin: u32,
    /// Full-frame searches before falling back to the manual coordinate
    pub search_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.85,
            verify_margin: 50,
            search_attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Single attempt, no delay; for one-shot CLI lookups on a still image
pub fn create_single_shot_config() -> LocatorConfig {
    LocatorConfig {
        search_attempts: 1,
        retry_delay: Duration::ZERO,
        ..LocatorConfig::default()
    }
}

/// Data directory: explicit value, then the environment, then `~/.feature-locator`
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    match homedir::my_home().ok().flatten() {
        Some(home) => home.join(".feature-locator"),
        None => {
            log::warn!("Could not determine home directory, using ./feature-locator-data");
            PathBuf::from("feature-locator-data")
        }
    }
}
