//! Cached lookup of fixed UI elements
//!
//! A lookup prefers, in order: a cached center that still verifies, a fresh
//! full-frame search, and the user's manual coordinate. Elements without a
//! template are first offered to the acquisition handler.

use super::acquisition::AcquisitionClient;
use super::config::{ELEMENTS_FILE, LocatorConfig, TEMPLATES_DIR};
use super::error::{LocateError, LocateResult};
use super::store::{CoordinateStore, ElementRecord};
use super::templates::TemplateLibrary;
use crate::capture::FrameSource;
use crate::frame::{Point, Rect};
use crate::template_matching::{CancelFlag, SearchControl, Template, TemplateMatcher};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationSource {
    /// Cached center confirmed by a localized match
    Verified,
    /// Found by a full-frame search and cached
    Searched,
    /// User-supplied fallback
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located {
    pub point: Point,
    pub source: LocationSource,
    /// Match confidence, absent for manual coordinates
    pub confidence: Option<f32>,
}

pub struct ElementLocator<S: FrameSource> {
    source: S,
    matcher: TemplateMatcher,
    library: TemplateLibrary,
    store: CoordinateStore,
    acquisition: Option<AcquisitionClient>,
    config: LocatorConfig,
    cancel: CancelFlag,
}

impl<S: FrameSource> ElementLocator<S> {
    pub fn new(source: S, library: TemplateLibrary, store: CoordinateStore) -> Self {
        Self {
            source,
            matcher: TemplateMatcher::new(),
            library,
            store,
            acquisition: None,
            config: LocatorConfig::default(),
            cancel: CancelFlag::new(),
        }
    }

    /// Templates and coordinates under `data_dir`
    pub fn open(source: S, data_dir: &Path) -> Self {
        Self::new(
            source,
            TemplateLibrary::new(data_dir.join(TEMPLATES_DIR)),
            CoordinateStore::load(data_dir.join(ELEMENTS_FILE)),
        )
    }

    pub fn with_config(mut self, config: LocatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_acquisition(mut self, client: AcquisitionClient) -> Self {
        self.acquisition = Some(client);
        self
    }

    pub fn with_matcher(mut self, matcher: TemplateMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    pub fn library(&self) -> &TemplateLibrary {
        &self.library
    }

    pub fn store(&self) -> &CoordinateStore {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Flag a caller can set to abort lookups in progress
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Position of `name`, or `None` when every strategy failed
    pub async fn get_location(&mut self, name: &str, description: &str, force_search: bool) -> Option<Point> {
        match self.locate(name, description, force_search).await {
            Ok(located) => Some(located.point),
            Err(e) => {
                log::warn!("Could not locate '{}': {}", name, e);
                None
            }
        }
    }

    /// Position of `name` together with how it was obtained
    ///
    /// With `force_search` the cached center is ignored and a full search runs.
    /// Any failure other than cancellation falls back to the manual coordinate,
    /// and the failure is returned only when there is none.
    pub async fn locate(&mut self, name: &str, description: &str, force_search: bool) -> LocateResult<Located> {
        match self.detect(name, description, force_search).await {
            Ok(located) => Ok(located),
            Err(LocateError::CancelledByCaller) => Err(LocateError::CancelledByCaller),
            Err(e) => {
                log::debug!("Detection of '{}' failed: {}", name, e);
                self.manual_or(name, e)
            }
        }
    }

    /// Cached center or fresh search, without the manual fallback
    async fn detect(&mut self, name: &str, description: &str, force_search: bool) -> LocateResult<Located> {
        self.check_cancel()?;
        let template = match self.library.load(name) {
            Ok(template) => template,
            Err(LocateError::TemplateNotFound { .. }) => {
                if !self.acquire(name, description).await {
                    self.check_cancel()?;
                    return Err(LocateError::AcquisitionDenied {
                        name: name.to_string(),
                    });
                }
                self.library.load(name)?
            }
            Err(e) => return Err(e),
        };

        if !force_search && let Some(cached) = self.store.cached_center(name) {
            match self.verify(&template, cached).await {
                Ok(Some(confidence)) => {
                    log::debug!("'{}' still at {} ({:.0}%)", name, cached, confidence * 100.0);
                    return Ok(Located {
                        point: cached,
                        source: LocationSource::Verified,
                        confidence: Some(confidence),
                    });
                }
                Ok(None) => log::info!("Cached position of '{}' at {} is stale, searching", name, cached),
                Err(LocateError::CancelledByCaller) => return Err(LocateError::CancelledByCaller),
                Err(e) => log::warn!("Could not verify '{}' at {}: {}", name, cached, e),
            }
        }

        let attempts = self.config.search_attempts.max(1);
        for attempt in 1..=attempts {
            self.check_cancel()?;
            let frame = self.source.capture().await?.frame;
            let mut control = SearchControl::new().with_cancel(self.cancel.clone());
            let result = self.matcher.find_template_with(
                &frame,
                &template,
                self.config.confidence_threshold,
                &mut control,
            );
            self.check_cancel()?;

            if result.found {
                log::info!(
                    "Found '{}' at {} ({:.0}%), attempt {}/{}",
                    name,
                    result.center,
                    result.confidence * 100.0,
                    attempt,
                    attempts
                );
                self.store.set_cached(name, result.center);
                self.persist();
                return Ok(Located {
                    point: result.center,
                    source: LocationSource::Searched,
                    confidence: Some(result.confidence),
                });
            }
            log::debug!(
                "'{}' not found, best {:.0}%, attempt {}/{}",
                name,
                result.confidence * 100.0,
                attempt,
                attempts
            );
            if attempt < attempts && !self.config.retry_delay.is_zero() {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        Err(LocateError::NoCachedOrManualCoordinate {
            name: name.to_string(),
        })
    }

    /// Store a template for `name`; existing cached positions are dropped
    pub fn save_template(&mut self, name: &str, template: &Template) -> LocateResult<PathBuf> {
        let path = self.library.save(name, template)?;
        if self.store.clear_cache(name) {
            self.persist();
        }
        Ok(path)
    }

    /// Cut `rect` out of the current frame and store it as the template for `name`
    pub async fn register_from_frame(&mut self, name: &str, rect: Rect) -> LocateResult<PathBuf> {
        let frame = self.source.capture().await?.frame;
        let template = Template::from_frame_region(Some(name.to_string()), &frame, rect).ok_or_else(|| {
            LocateError::TemplateNotFound {
                name: name.to_string(),
            }
        })?;
        self.save_template(name, &template)
    }

    pub fn set_manual_coordinate(&mut self, name: &str, point: Option<Point>) {
        self.store.set_manual(name, point);
        self.persist();
    }

    pub fn manual_coordinate(&self, name: &str) -> Option<Point> {
        self.store.manual(name)
    }

    pub fn record(&self, name: &str) -> Option<&ElementRecord> {
        self.store.get(name)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.library.exists(name)
    }

    /// Names with a stored record
    pub fn element_names(&self) -> Vec<String> {
        self.store.names().map(str::to_string).collect()
    }

    /// Forget the cached center of one element; template and manual coordinate stay
    pub fn clear_cache(&mut self, name: &str) {
        if self.store.clear_cache(name) {
            log::info!("Cleared cached position of '{}'", name);
            self.persist();
        }
    }

    pub fn clear_all(&mut self) {
        self.store.clear_all();
        log::info!("Cleared all cached positions");
        self.persist();
    }

    /// Confidence of a localized match around `cached`, if it still matches
    async fn verify(&self, template: &Template, cached: Point) -> LocateResult<Option<f32>> {
        self.check_cancel()?;
        let frame = self.source.capture().await?.frame;
        let result = self.matcher.find_template_near(
            &frame,
            template,
            self.config.confidence_threshold,
            cached,
            self.config.verify_margin,
        );
        Ok(result.found.then_some(result.confidence))
    }

    async fn acquire(&self, name: &str, description: &str) -> bool {
        match &self.acquisition {
            Some(client) => {
                log::info!("Requesting template for '{}'", name);
                client.request(name, description).await
            }
            None => {
                log::debug!("No acquisition handler, '{}' has no template", name);
                false
            }
        }
    }

    fn manual_or(&self, name: &str, err: LocateError) -> LocateResult<Located> {
        match self.store.manual(name) {
            Some(point) => {
                log::info!("Using manual coordinate {} for '{}'", point, name);
                Ok(Located {
                    point,
                    source: LocationSource::Manual,
                    confidence: None,
                })
            }
            None => Err(err),
        }
    }

    fn check_cancel(&self) -> LocateResult<()> {
        if self.cancel.is_cancelled() {
            return Err(LocateError::CancelledByCaller);
        }
        Ok(())
    }

    /// Persistence problems never fail a lookup
    fn persist(&self) {
        if let Err(e) = self.store.save() {
            log::warn!("Failed to save element store: {}", e);
        }
    }
}
