//! Brightness-based detection of a low-contrast moving feature

use super::cluster::{Blob, cluster_points};
use super::config::{
    BlobDetectorConfig, BubbleCheck, Rgb, ShadowColorFilter, StabilityConfig, SurroundCheck, Tolerance,
    is_water_color,
};
use super::location::LocationConfig;
use super::stability::{StabilityState, StabilityTracker};
use super::transform::{CastTransform, CastingResult};
use crate::capture::FrameSource;
use crate::frame::{Frame, Point, Rect, brightness};
use crate::template_matching::CancelFlag;

const MAX_LEARNED_CONFIDENCE: u8 = 10;

/// Color confirmed on earlier detections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnedColor {
    pub color: Rgb,
    /// Number of confirmations folded into `color`, capped at 10
    pub confidence: u8,
}

/// Everything one scan of a region produced
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub region: Rect,
    pub mean_brightness: u32,
    pub dark_threshold: u32,
    pub candidate_points: usize,
    /// Blobs that survived size, shape and color checks
    pub blobs: Vec<Blob>,
    pub rejected_by_size: usize,
    pub rejected_by_shape: usize,
    pub rejected_by_color: usize,
    pub rejected_by_surroundings: usize,
    pub rejected_by_edge: usize,
    pub best: Option<Blob>,
    /// The best blob passed the bubble check
    pub best_confirmed: bool,
    /// Location color hit used when no blob survived
    pub fallback: Option<Point>,
}

impl ScanReport {
    /// Centroid of the best blob, else the color fallback
    pub fn position(&self) -> Option<Point> {
        self.best.as_ref().map(|b| b.centroid).or(self.fallback)
    }
}

/// Position agreed on by consecutive scans
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettledFeature {
    pub position: Point,
    pub frame_width: u32,
    pub frame_height: u32,
    pub scans: u32,
}

enum Predicate<'a> {
    Dark {
        threshold: u32,
        shadow: Option<&'a ShadowColorFilter>,
        color: Option<(Rgb, Tolerance)>,
    },
    Learned { color: Rgb, tolerance: Tolerance },
}

impl Predicate<'_> {
    fn accepts(&self, rgb: [u8; 3]) -> bool {
        match self {
            Predicate::Dark {
                threshold,
                shadow,
                color,
            } => {
                (brightness(rgb) < *threshold && !shadow.is_some_and(|f| f.rejects(rgb)))
                    || color.is_some_and(|(c, tol)| c.matches(rgb, tol))
            }
            Predicate::Learned { color, tolerance } => color.matches(rgb, *tolerance),
        }
    }
}

/// Per-session detector; owns its configuration and any learned color
#[derive(Debug, Clone)]
pub struct BlobDetector {
    config: BlobDetectorConfig,
    location: LocationConfig,
    transform: CastTransform,
    learned: Option<LearnedColor>,
}

impl BlobDetector {
    pub fn new(config: BlobDetectorConfig, location: LocationConfig) -> Self {
        Self {
            config,
            location,
            transform: CastTransform::default(),
            learned: None,
        }
    }

    pub fn with_transform(mut self, transform: CastTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn config(&self) -> &BlobDetectorConfig {
        &self.config
    }

    pub fn location(&self) -> &LocationConfig {
        &self.location
    }

    pub fn set_location(&mut self, location: LocationConfig) {
        self.location = location;
    }

    pub fn learned_color(&self) -> Option<LearnedColor> {
        self.learned
    }

    /// Scan region of the current location for this frame
    pub fn region_for(&self, frame: &Frame) -> Rect {
        self.location.scan_region.resolve(frame.width(), frame.height())
    }

    /// Best blob in the location's scan region
    pub fn detect(&self, frame: &Frame) -> Option<Blob> {
        self.scan(frame, self.region_for(frame)).best
    }

    /// Feature position in the location's scan region, including the color fallback
    pub fn detect_position(&self, frame: &Frame) -> Option<Point> {
        self.scan(frame, self.region_for(frame)).position()
    }

    /// Segment, cluster, filter and score one region of a frame
    pub fn scan(&self, frame: &Frame, region: Rect) -> ScanReport {
        let region = region.clip_to(frame.width(), frame.height());
        let mut report = ScanReport {
            region,
            ..ScanReport::default()
        };
        let step = self.config.step.max(1);
        if region.is_empty() {
            return report;
        }

        report.mean_brightness = mean_brightness(frame, region, step * 2);
        report.dark_threshold = report
            .mean_brightness
            .saturating_sub(self.config.dark_offset)
            .max(self.config.min_dark_threshold);

        let predicate = self.predicate(report.dark_threshold);
        let mut points = Vec::new();
        for y in (region.y..region.bottom()).step_by(step as usize) {
            for x in (region.x..region.right()).step_by(step as usize) {
                if predicate.accepts(frame.rgb(x, y)) {
                    points.push(Point::new(x as i32, y as i32));
                }
            }
        }
        report.candidate_points = points.len();

        let center = region.center();
        let mut best: Option<(bool, f64, Blob)> = None;
        for members in cluster_points(&points, self.config.cluster_distance()) {
            let blob = Blob::from_members(members, step);
            if blob.size < self.config.min_blob_size || blob.size > self.config.max_blob_size {
                report.rejected_by_size += 1;
                continue;
            }
            if !self.shape_ok(&blob) {
                report.rejected_by_shape += 1;
                continue;
            }
            if self.is_background(frame, blob.centroid) {
                report.rejected_by_color += 1;
                continue;
            }
            if let Some(check) = &self.config.surround_check
                && !surrounded_by_water(frame, blob.centroid, check)
            {
                report.rejected_by_surroundings += 1;
                continue;
            }
            let confirmed = self
                .config
                .bubble_check
                .as_ref()
                .is_some_and(|check| has_bubbles_above(frame, blob.centroid, report.mean_brightness, step, check));
            if !confirmed
                && let Some(margin) = self.config.edge_margin
                && near_edge(region, blob.centroid, margin)
            {
                report.rejected_by_edge += 1;
                continue;
            }

            let score = blob.centroid.distance(&center) - self.config.size_weight * blob.size as f64;
            let better = match &best {
                None => true,
                Some((best_confirmed, best_score, _)) => {
                    (confirmed && !best_confirmed) || (confirmed == *best_confirmed && score < *best_score)
                }
            };
            if better {
                best = Some((confirmed, score, blob.clone()));
            }
            report.blobs.push(blob);
        }
        if let Some((confirmed, _, blob)) = best {
            report.best_confirmed = confirmed;
            report.best = Some(blob);
        } else if self.config.color_fallback {
            report.fallback = self.scan_location_color(frame, region);
        }

        log::debug!(
            "Blob scan {}: mean={} threshold={} points={} blobs={} (size-={}, shape-={}, color-={}, water-={}, edge-={}) best={:?} confirmed={} fallback={:?}",
            region,
            report.mean_brightness,
            report.dark_threshold,
            report.candidate_points,
            report.blobs.len(),
            report.rejected_by_size,
            report.rejected_by_shape,
            report.rejected_by_color,
            report.rejected_by_surroundings,
            report.rejected_by_edge,
            report.best.as_ref().map(|b| b.centroid),
            report.best_confirmed,
            report.fallback
        );
        report
    }

    /// Scan repeatedly until the feature holds still, the budget runs out or `cancel` fires
    pub async fn settle<S: FrameSource>(
        &self,
        source: &S,
        stability: &StabilityConfig,
        cancel: Option<&CancelFlag>,
    ) -> Option<SettledFeature> {
        let deadline = tokio::time::Instant::now() + stability.max_wait;
        let mut tracker = StabilityTracker::from_config(stability);

        loop {
            if cancel.is_some_and(CancelFlag::is_cancelled) {
                log::debug!("Settle loop cancelled after {} scans", tracker.scans());
                return None;
            }
            let frame = match source.capture().await {
                Ok(capture) => capture.frame,
                Err(e) => {
                    log::warn!("Settle loop stopped, no frame: {}", e);
                    return None;
                }
            };
            let position = self.detect_position(&frame);
            match tracker.observe(position) {
                StabilityState::Settled(position) => {
                    log::info!("Feature settled at {} after {} scans", position, tracker.scans());
                    return Some(SettledFeature {
                        position,
                        frame_width: frame.width(),
                        frame_height: frame.height(),
                        scans: tracker.scans(),
                    });
                }
                state => log::debug!("Scan {}: {:?}", tracker.scans(), state),
            }

            if tokio::time::Instant::now() + stability.scan_interval > deadline {
                log::info!("Feature did not settle within {:?}", stability.max_wait);
                return None;
            }
            tokio::time::sleep(stability.scan_interval).await;
        }
    }

    /// Drag coordinates for a feature in a frame of the given size
    pub fn casting_result(&self, position: Point, frame_width: u32, frame_height: u32) -> CastingResult {
        self.transform
            .cast(position, frame_width, frame_height, self.location.vertical_adjustment)
    }

    pub fn cast_power(&self, position: Point, frame_width: u32, frame_height: u32) -> f64 {
        self.transform
            .cast_power(position, frame_width, frame_height, self.location.vertical_adjustment)
    }

    /// Settle, then compute where to drag
    pub async fn find_cast<S: FrameSource>(
        &self,
        source: &S,
        stability: &StabilityConfig,
        cancel: Option<&CancelFlag>,
    ) -> Option<CastingResult> {
        let settled = self.settle(source, stability, cancel).await?;
        Some(self.casting_result(settled.position, settled.frame_width, settled.frame_height))
    }

    /// Fold the color around a confirmed feature position into the learned color
    pub fn confirm_feature(&mut self, frame: &Frame, position: Point) -> Option<LearnedColor> {
        let sample = average_color(frame, position, self.config.step as i32)?;
        let updated = match self.learned {
            None => LearnedColor {
                color: sample,
                confidence: 1,
            },
            Some(prev) => {
                let n = prev.confidence as u32;
                let blend = |old: u8, new: u8| ((old as u32 * n + new as u32) / (n + 1)) as u8;
                LearnedColor {
                    color: Rgb::new(
                        blend(prev.color.r, sample.r),
                        blend(prev.color.g, sample.g),
                        blend(prev.color.b, sample.b),
                    ),
                    confidence: (prev.confidence + 1).min(MAX_LEARNED_CONFIDENCE),
                }
            }
        };
        log::debug!("Learned feature color {} (confidence {})", updated.color, updated.confidence);
        self.learned = Some(updated);
        self.learned
    }

    pub fn reset_learned_color(&mut self) {
        self.learned = None;
    }

    fn predicate(&self, threshold: u32) -> Predicate {
        if self.config.use_learned_color
            && let Some(learned) = self.learned
            && learned.confidence >= 1
        {
            return Predicate::Learned {
                color: learned.color,
                tolerance: Tolerance::uniform(self.config.learned_color_tolerance),
            };
        }
        Predicate::Dark {
            threshold,
            shadow: self.config.shadow_color.as_ref(),
            color: self
                .location
                .reference_color
                .map(|c| (c, self.location.tolerance.widened(self.config.min_color_tolerance))),
        }
    }

    fn shape_ok(&self, blob: &Blob) -> bool {
        let Some(filter) = &self.config.shape_filter else {
            return true;
        };
        blob.aspect_ratio() <= filter.max_aspect_ratio
            && blob.bounds.width.min(blob.bounds.height) >= filter.min_extent
            && blob.fill_ratio() >= filter.min_fill_ratio
    }

    /// First sampled pixel matching the location color within its own tolerance
    fn scan_location_color(&self, frame: &Frame, region: Rect) -> Option<Point> {
        let color = self.location.reference_color?;
        let step = self.config.fallback_step.max(1) as usize;
        for y in (region.y..region.bottom()).step_by(step) {
            for x in (region.x..region.right()).step_by(step) {
                if color.matches(frame.rgb(x, y), self.location.tolerance) {
                    log::debug!("Color fallback hit at ({}, {})", x, y);
                    return Some(Point::new(x as i32, y as i32));
                }
            }
        }
        None
    }

    fn is_background(&self, frame: &Frame, at: Point) -> bool {
        let Some(rgb) = frame.rgb_checked(at.x.max(0) as u32, at.y.max(0) as u32) else {
            return false;
        };
        self.config
            .background_families
            .iter()
            .any(|family| family.contains(rgb))
    }
}

impl Default for BlobDetector {
    fn default() -> Self {
        Self::new(BlobDetectorConfig::default(), LocationConfig::default())
    }
}

fn mean_brightness(frame: &Frame, region: Rect, step: u32) -> u32 {
    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for y in (region.y..region.bottom()).step_by(step.max(1) as usize) {
        for x in (region.x..region.right()).step_by(step.max(1) as usize) {
            sum += frame.brightness(x, y) as u64;
            count += 1;
        }
    }
    if count == 0 { 0 } else { (sum / count) as u32 }
}

/// Whether enough of a ring of samples around `center` looks like water
fn surrounded_by_water(frame: &Frame, center: Point, check: &SurroundCheck) -> bool {
    let samples = check.samples.max(1);
    let mut water = 0u32;
    let mut checked = 0u32;
    for i in 0..samples {
        let angle = std::f64::consts::TAU * i as f64 / samples as f64;
        let x = center.x + (check.radius * angle.cos()) as i32;
        let y = center.y + (check.radius * angle.sin()) as i32;
        if x < 0 || y < 0 {
            continue;
        }
        if let Some(rgb) = frame.rgb_checked(x as u32, y as u32) {
            checked += 1;
            if is_water_color(rgb) {
                water += 1;
            }
        }
    }
    checked > 0 && water as f64 / checked as f64 >= check.min_water_ratio
}

/// Whether near-white pixels brighter than the water sit in the box above `center`
fn has_bubbles_above(frame: &Frame, center: Point, mean_brightness: u32, step: u32, check: &BubbleCheck) -> bool {
    if frame.is_empty() {
        return false;
    }
    let threshold = (mean_brightness + check.brightness_offset).max(check.min_brightness);
    let half = (check.width / 2) as i32;
    let start_x = (center.x - half).max(0);
    let end_x = (center.x + half).min(frame.width() as i32 - 1);
    let start_y = (center.y - check.height as i32).max(0);
    let end_y = (center.y - check.gap as i32).max(0);
    if start_y >= end_y || start_x >= end_x {
        return false;
    }

    let mut count = 0u32;
    for y in (start_y..end_y).step_by(step.max(1) as usize) {
        for x in (start_x..end_x).step_by(step.max(1) as usize) {
            let Some(rgb) = frame.rgb_checked(x as u32, y as u32) else {
                continue;
            };
            let [r, g, b] = rgb;
            let spread = r.max(g).max(b) - r.min(g).min(b);
            if brightness(rgb) >= threshold && spread < check.max_spread {
                count += 1;
            }
        }
    }
    log::debug!("Bubble check at {}: {} pixels over {}", center, count, threshold);
    count >= check.min_pixels
}

fn near_edge(region: Rect, at: Point, margin: u32) -> bool {
    let m = margin as i32;
    at.x < region.x as i32 + m
        || at.x > region.right() as i32 - m
        || at.y < region.y as i32 + m
        || at.y > region.bottom() as i32 - m
}

/// Mean color of the square of half-size `radius` around `at`, clipped to the frame
fn average_color(frame: &Frame, at: Point, radius: i32) -> Option<Rgb> {
    let mut sum = [0u32; 3];
    let mut count = 0u32;
    for y in at.y - radius..=at.y + radius {
        for x in at.x - radius..=at.x + radius {
            if x < 0 || y < 0 {
                continue;
            }
            if let Some(rgb) = frame.rgb_checked(x as u32, y as u32) {
                for c in 0..3 {
                    sum[c] += rgb[c] as u32;
                }
                count += 1;
            }
        }
    }
    (count > 0).then(|| Rgb::new((sum[0] / count) as u8, (sum[1] / count) as u8, (sum[2] / count) as u8))
}
