//! Persisted per-element coordinates
//!
//! One JSON object keyed by element name, rewritten in full on every save.
//! Names compare case-insensitively; a record keeps the spelling it was
//! first stored under.

use super::error::{LocateError, LocateResult};
use crate::frame::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// What is known about one element
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementRecord {
    /// Fallback supplied by the user
    #[serde(default)]
    pub manual: Option<Point>,
    /// Center of the last successful match
    #[serde(default)]
    pub cached_center: Option<Point>,
    #[serde(default)]
    pub last_found: Option<SystemTime>,
}

impl ElementRecord {
    pub fn forget_cache(&mut self) {
        self.cached_center = None;
        self.last_found = None;
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoordinateStore {
    path: Option<PathBuf>,
    records: BTreeMap<String, ElementRecord>,
}

impl CoordinateStore {
    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`; a missing or unreadable file starts empty
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(records) => records,
                Err(e) => {
                    log::warn!("Ignoring unreadable element store {:?}: {}", path, e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                log::warn!("Failed to read element store {:?}: {}", path, e);
                BTreeMap::new()
            }
        };
        log::debug!("Loaded {} element records from {:?}", records.len(), path);
        Self {
            path: Some(path),
            records,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Rewrite the backing file; a no-op for in-memory stores
    pub fn save(&self) -> LocateResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_err = |source| LocateError::PersistenceIo {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(path, json).map_err(io_err)
    }

    pub fn get(&self, name: &str) -> Option<&ElementRecord> {
        self.stored_key(name).and_then(|key| self.records.get(key))
    }

    pub fn records(&self) -> &BTreeMap<String, ElementRecord> {
        &self.records
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn manual(&self, name: &str) -> Option<Point> {
        self.get(name).and_then(|r| r.manual)
    }

    pub fn cached_center(&self, name: &str) -> Option<Point> {
        self.get(name).and_then(|r| r.cached_center)
    }

    pub fn set_manual(&mut self, name: &str, point: Option<Point>) {
        self.record_mut(name).manual = point;
    }

    /// Record a fresh match, stamped with the current time
    pub fn set_cached(&mut self, name: &str, center: Point) {
        let record = self.record_mut(name);
        record.cached_center = Some(center);
        record.last_found = Some(SystemTime::now());
    }

    /// Forget the cached position of one element; true if there was a record
    pub fn clear_cache(&mut self, name: &str) -> bool {
        let key = self.stored_key(name).map(str::to_string);
        match key.and_then(|key| self.records.get_mut(&key)) {
            Some(record) => {
                record.forget_cache();
                true
            }
            None => false,
        }
    }

    pub fn clear_all(&mut self) {
        self.records.values_mut().for_each(ElementRecord::forget_cache);
    }

    /// Drop everything known about one element
    pub fn remove(&mut self, name: &str) -> Option<ElementRecord> {
        let key = self.stored_key(name)?.to_string();
        self.records.remove(&key)
    }

    /// Key under which `name` is stored, matched without regard to case
    fn stored_key<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.records.contains_key(name) {
            return Some(name);
        }
        let wanted = name.to_lowercase();
        self.records
            .keys()
            .find(|key| key.to_lowercase() == wanted)
            .map(String::as_str)
    }

    fn record_mut(&mut self, name: &str) -> &mut ElementRecord {
        let key = self.stored_key(name).unwrap_or(name).to_string();
        self.records.entry(key).or_default()
    }
}
