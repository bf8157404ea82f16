//! Per-location detection settings and their JSON store
//!
//! Built-in presets describe each location in the 1600x1151 reference frame.
//! A JSON file may override any preset or add new locations; keys are
//! compared upper-cased and trimmed.

use super::config::{Rgb, Tolerance};
use super::region::{PercentRect, ScanRegion};
use super::transform::{REFERENCE_HEIGHT, REFERENCE_WIDTH};
use crate::frame::Rect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_LOCATION: &str = "FISH ANYWHERE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access location config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid location config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Location store has no backing file")]
    NoBackingFile,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Detection settings for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Feature color; points matching it count as candidates besides dark ones
    #[serde(default)]
    pub reference_color: Option<Rgb>,
    pub tolerance: Tolerance,
    pub scan_region: ScanRegion,
    /// Added to the feature's reference y before the cast transform
    #[serde(default)]
    pub vertical_adjustment: i32,
}

impl LocationConfig {
    /// Build from a rectangle expressed in reference-frame pixels
    pub fn from_reference(rect: Rect, color: Rgb, tolerance: Tolerance, vertical_adjustment: i32) -> Self {
        Self {
            reference_color: Some(color),
            tolerance,
            scan_region: ScanRegion::Percent(PercentRect::from_rect(
                rect,
                REFERENCE_WIDTH,
                REFERENCE_HEIGHT,
            )),
            vertical_adjustment,
        }
    }

    /// Brightness only, whole frame
    pub fn dark_only() -> Self {
        Self {
            reference_color: None,
            tolerance: Tolerance::uniform(0),
            scan_region: ScanRegion::Full,
            vertical_adjustment: 0,
        }
    }

    pub fn with_scan_region(mut self, scan_region: ScanRegion) -> Self {
        self.scan_region = scan_region;
        self
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self::from_reference(
            Rect::new(200, 150, 1292, 510),
            Rgb::new(56, 129, 122),
            Tolerance::new(7, 5, 5),
            35,
        )
    }
}

/// Built-in locations keyed by normalized name
pub fn builtin_locations() -> BTreeMap<String, LocationConfig> {
    let entry = |rect: (u32, u32, u32, u32), color: (u8, u8, u8), tol: (u8, u8, u8), y_adj: i32| {
        LocationConfig::from_reference(
            Rect::new(rect.0, rect.1, rect.2, rect.3),
            Rgb::new(color.0, color.1, color.2),
            Tolerance::new(tol.0, tol.1, tol.2),
            y_adj,
        )
    };
    let brrrgh = entry((153, 134, 1297, 569), (25, 144, 148), (10, 11, 11), 10);

    let mut map = BTreeMap::new();
    map.insert(
        "TOONTOWN CENTRAL PUNCHLINE PLACE".to_string(),
        entry((260, 196, 1089, 430), (20, 123, 114), (8, 8, 8), 15),
    );
    map.insert(
        "DONALD DREAM LAND LULLABY LANE".to_string(),
        entry((248, 239, 1244, 421), (55, 103, 116), (8, 14, 11), 0),
    );
    map.insert("BRRRGH POLAR PLACE".to_string(), brrrgh.clone());
    map.insert("BRRRGH WALRUS WAY".to_string(), brrrgh.clone());
    map.insert("BRRRGH SLEET STREET".to_string(), brrrgh);
    map.insert(
        "MINNIE'S MELODYLAND TENOR TERRACE".to_string(),
        entry((200, 150, 1292, 510), (56, 129, 122), (10, 10, 10), 20),
    );
    map.insert(
        "DONALD DOCK LIGHTHOUSE LANE".to_string(),
        entry((200, 150, 1292, 510), (22, 140, 118), (13, 13, 15), 15),
    );
    map.insert(
        "DAISY'S GARDEN ELM STREET".to_string(),
        entry((200, 80, 1230, 712), (17, 102, 75), (5, 4, 5), 35),
    );
    map.insert(DEFAULT_LOCATION.to_string(), LocationConfig::default());
    map.insert("CUSTOM FISHING ACTION".to_string(), LocationConfig::default());
    map
}

/// Short names accepted wherever a location name is
const ALIASES: &[(&str, &str)] = &[
    ("TTC PUNCHLINE PLACE", "TOONTOWN CENTRAL PUNCHLINE PLACE"),
    ("DDL LULLABY LANE", "DONALD DREAM LAND LULLABY LANE"),
    ("MML TENOR TERRACE", "MINNIE'S MELODYLAND TENOR TERRACE"),
    ("DD LIGHTHOUSE LANE", "DONALD DOCK LIGHTHOUSE LANE"),
    ("DG ELM STREET", "DAISY'S GARDEN ELM STREET"),
];

pub fn normalize_location_name(name: &str) -> String {
    let key = name.trim().to_uppercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, full)| full.to_string())
        .unwrap_or(key)
}

/// Location settings: built-in presets overlaid with user overrides
#[derive(Debug, Clone)]
pub struct LocationConfigStore {
    path: Option<PathBuf>,
    overrides: BTreeMap<String, LocationConfig>,
    builtin: BTreeMap<String, LocationConfig>,
}

impl LocationConfigStore {
    /// Presets only, nothing persisted
    pub fn new() -> Self {
        Self {
            path: None,
            overrides: BTreeMap::new(),
            builtin: builtin_locations(),
        }
    }

    /// Load overrides from `path`; a missing file means no overrides
    pub fn load(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let mut store = Self::new();
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let raw: BTreeMap<String, LocationConfig> =
                    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                        path: path.clone(),
                        source,
                    })?;
                store.overrides = raw
                    .into_iter()
                    .map(|(name, config)| (normalize_location_name(&name), config))
                    .collect();
                log::debug!("Loaded {} location overrides from {:?}", store.overrides.len(), path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No location config at {:?}, using presets", path);
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        }
        store.path = Some(path);
        Ok(store)
    }

    /// Settings for `name`, falling back to the default location
    pub fn get(&self, name: &str) -> LocationConfig {
        self.lookup(name).cloned().unwrap_or_else(|| {
            log::debug!("Unknown location '{}', using {}", name, DEFAULT_LOCATION);
            LocationConfig::default()
        })
    }

    pub fn lookup(&self, name: &str) -> Option<&LocationConfig> {
        let key = normalize_location_name(name);
        self.overrides.get(&key).or_else(|| self.builtin.get(&key))
    }

    pub fn set(&mut self, name: &str, config: LocationConfig) {
        self.overrides.insert(normalize_location_name(name), config);
    }

    /// Replace only the scan region of a location (user calibration)
    pub fn set_scan_region(&mut self, name: &str, region: ScanRegion) {
        let mut config = self.get(name);
        config.scan_region = region;
        self.set(name, config);
    }

    /// Drop a user override so the preset applies again
    pub fn reset(&mut self, name: &str) -> bool {
        self.overrides.remove(&normalize_location_name(name)).is_some()
    }

    pub fn has_override(&self, name: &str) -> bool {
        self.overrides.contains_key(&normalize_location_name(name))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builtin.keys().chain(self.overrides.keys()).cloned().collect();
        names.sort();
        names.dedup();
        names
    }

    /// Write the overrides back to the file they were loaded from
    pub fn save(&self) -> ConfigResult<()> {
        let path = self.path.as_ref().ok_or(ConfigError::NoBackingFile)?;
        self.save_to(path)
    }

    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.overrides).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)
    }
}

impl Default for LocationConfigStore {
    fn default() -> Self {
        Self::new()
    }
}
