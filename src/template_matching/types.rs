/// Template matching data types
use crate::frame::{Frame, Point, Rect};
use image::RgbImage;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reference pixel pattern searched for inside a frame
#[derive(Clone, Debug)]
pub struct Template {
    /// Template label/name (e.g., "play button")
    pub label: Option<String>,
    image: RgbImage,
}

impl Template {
    pub fn new(label: Option<String>, image: RgbImage) -> Self {
        Self { label, image }
    }

    /// Load a template from an image file, labelled by its file stem
    pub fn open(path: impl AsRef<Path>) -> Result<Self, image::ImageError> {
        let path = path.as_ref();
        let label = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        Ok(Self::new(label, image::open(path)?.to_rgb8()))
    }

    /// Cut a template out of a frame, e.g. when registering a new element
    pub fn from_frame_region(label: Option<String>, frame: &Frame, rect: Rect) -> Option<Self> {
        frame
            .crop(rect)
            .map(|cropped| Self::new(label, cropped.into_image()))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    #[inline]
    pub(crate) fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        self.image.get_pixel(x, y).0
    }

    /// Get the template name for display
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => format!("{}-[{}x{}]", label, self.width(), self.height()),
            None => format!("template-[{}x{}]", self.width(), self.height()),
        }
    }
}

/// Outcome of a template search
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct MatchResult {
    pub found: bool,
    /// Top-left corner of the best offset
    pub location: Point,
    pub center: Point,
    /// Similarity score (0.0-1.0), reported even when not found
    pub confidence: f32,
    pub bounds: Rect,
}

impl MatchResult {
    pub fn not_found() -> Self {
        Self::default()
    }

    pub(crate) fn at(x: u32, y: u32, width: u32, height: u32, confidence: f32, threshold: f32) -> Self {
        let bounds = Rect::new(x, y, width, height);
        Self {
            found: confidence >= threshold,
            location: Point::new(x as i32, y as i32),
            center: bounds.center(),
            confidence,
            bounds,
        }
    }

    /// Shift a result found inside a cropped window back into frame coordinates
    pub(crate) fn offset_by(mut self, dx: u32, dy: u32) -> Self {
        if self.bounds.width == 0 {
            return self;
        }
        self.bounds.x += dx;
        self.bounds.y += dy;
        self.location = Point::new(self.bounds.x as i32, self.bounds.y as i32);
        self.center = self.bounds.center();
        self
    }

    /// Format match as string with confidence percentage
    pub fn describe(&self, template: &Template) -> String {
        let name = template.label.as_deref().unwrap_or("unnamed");
        let pct = (self.confidence * 100.0) as u32;
        if self.found {
            format!("{} at {} - {}%", name, self.location, pct)
        } else {
            format!("{} not found (best {}%)", name, pct)
        }
    }
}

/// Cooperative cancellation shared between a caller and a running search
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Cancellation and progress hooks for a single search
#[derive(Default)]
pub struct SearchControl<'a> {
    pub cancel: Option<CancelFlag>,
    progress: Option<Box<dyn FnMut(u8) + Send + 'a>>,
    last_reported: Option<u8>,
}

impl<'a> SearchControl<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Receives percentages 0-100, at most once per value
    pub fn with_progress(mut self, callback: impl FnMut(u8) + Send + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }

    pub(crate) fn report(&mut self, percent: u8) {
        let percent = percent.min(100);
        if self.last_reported.is_some_and(|last| last >= percent) {
            return;
        }
        self.last_reported = Some(percent);
        if let Some(callback) = self.progress.as_mut() {
            callback(percent);
        }
    }
}
