/// Template matching implementation
///
/// Sum-of-absolute-differences matcher with a five point quick reject,
/// sub-sampling of large templates, early abort and early accept.
use super::types::{CancelFlag, MatchResult, SearchControl, Template};
use crate::capture::FrameSource;
use crate::frame::{Frame, Point, Rect};
use std::time::Duration;

/// Largest per-channel difference allowed at any quick-check point
pub const QUICK_REJECT_TOLERANCE: u8 = 50;
/// Templates wider or taller than this are sampled every second pixel
pub const SUBSAMPLE_ABOVE: u32 = 50;
/// A score at or above this ends `find_template` immediately
pub const EARLY_ACCEPT_SCORE: f32 = 0.99;
/// Sampled pixels between two early-abort checks
pub const ABORT_CHECK_INTERVAL: usize = 100;
/// Extrapolated difference allowed before an offset is abandoned, as a multiple of the budget
pub const ABORT_SLACK: f64 = 1.5;

const MAX_PIXEL_DIFF: f64 = 3.0 * 255.0;

/// Approximate template matcher for fixed UI controls
#[derive(Debug, Clone)]
pub struct TemplateMatcher {
    pub quick_reject_tolerance: u8,
    pub subsample_above: u32,
    pub early_accept_score: f32,
}

/// Template pixels visited by the scored comparison
struct SampledTemplate {
    pixels: Vec<(u32, u32, [u8; 3])>,
    quick_points: [(u32, u32, [u8; 3]); 5],
}

impl SampledTemplate {
    fn new(template: &Template, step: u32) -> Self {
        let (w, h) = (template.width(), template.height());
        let mut pixels = Vec::with_capacity(((w / step + 1) * (h / step + 1)) as usize);
        for y in (0..h).step_by(step as usize) {
            for x in (0..w).step_by(step as usize) {
                pixels.push((x, y, template.rgb(x, y)));
            }
        }
        let quick = |x: u32, y: u32| (x, y, template.rgb(x, y));
        Self {
            pixels,
            quick_points: [
                quick(0, 0),
                quick(w - 1, 0),
                quick(0, h - 1),
                quick(w - 1, h - 1),
                quick(w / 2, h / 2),
            ],
        }
    }
}

impl TemplateMatcher {
    /// Create a matcher with the standard heuristics
    pub fn new() -> Self {
        Self {
            quick_reject_tolerance: QUICK_REJECT_TOLERANCE,
            subsample_above: SUBSAMPLE_ABOVE,
            early_accept_score: EARLY_ACCEPT_SCORE,
        }
    }

    /// Find the best placement of `template` in `frame`
    ///
    /// `found` is set only when the best score reaches `threshold` (clamped to 0.0-1.0).
    pub fn find_template(&self, frame: &Frame, template: &Template, threshold: f32) -> MatchResult {
        self.find_template_with(frame, template, threshold, &mut SearchControl::new())
    }

    /// Like [`find_template`](Self::find_template) with cancellation and progress reporting
    ///
    /// A cancelled search returns the best offset seen so far with `found == false`.
    pub fn find_template_with(
        &self,
        frame: &Frame,
        template: &Template,
        threshold: f32,
        control: &mut SearchControl<'_>,
    ) -> MatchResult {
        if !fits(frame, template) {
            log::debug!(
                "Template {} does not fit frame {}x{}",
                template.display_name(),
                frame.width(),
                frame.height()
            );
            return MatchResult::not_found();
        }
        let threshold = threshold.clamp(0.0, 1.0);
        let sampled = SampledTemplate::new(template, self.sample_step(template));
        let (tw, th) = (template.width(), template.height());
        let rows = frame.height() - th + 1;
        let cols = frame.width() - tw + 1;

        let mut best_score = 0.0_f32;
        let mut best_pos: Option<(u32, u32)> = None;

        'rows: for y in 0..rows {
            if control.is_cancelled() {
                log::debug!("Template search for {} cancelled at row {}", template.display_name(), y);
                let mut partial = self.result_for(best_pos, best_score, template, threshold);
                partial.found = false;
                return partial;
            }
            for x in 0..cols {
                if !self.quick_check(frame, &sampled, x, y) {
                    continue;
                }
                let score = self.score_at(frame, &sampled, x, y, threshold);
                if score > best_score {
                    best_score = score;
                    best_pos = Some((x, y));
                    if best_score >= self.early_accept_score {
                        break 'rows;
                    }
                }
            }
            control.report(((y + 1) as u64 * 100 / rows as u64) as u8);
        }
        control.report(100);

        let result = self.result_for(best_pos, best_score, template, threshold);
        log::debug!("{}", result.describe(template));
        result
    }

    /// Find every placement scoring at least `threshold`
    ///
    /// Returned matches are pairwise at least `min_distance` apart on some axis;
    /// inside that distance only the stronger match survives. Sorted by confidence, highest first.
    pub fn find_all_templates(
        &self,
        frame: &Frame,
        template: &Template,
        threshold: f32,
        min_distance: u32,
    ) -> Vec<MatchResult> {
        self.find_all_templates_with(frame, template, threshold, min_distance, &mut SearchControl::new())
    }

    pub fn find_all_templates_with(
        &self,
        frame: &Frame,
        template: &Template,
        threshold: f32,
        min_distance: u32,
        control: &mut SearchControl<'_>,
    ) -> Vec<MatchResult> {
        if !fits(frame, template) {
            return Vec::new();
        }
        let threshold = threshold.clamp(0.0, 1.0);
        let sampled = SampledTemplate::new(template, self.sample_step(template));
        let (tw, th) = (template.width(), template.height());
        let rows = frame.height() - th + 1;
        let cols = frame.width() - tw + 1;
        let min_distance = min_distance as i32;

        let mut matches: Vec<MatchResult> = Vec::new();

        for y in 0..rows {
            if control.is_cancelled() {
                log::debug!("Multi-match search cancelled with {} matches", matches.len());
                break;
            }
            for x in 0..cols {
                if !self.quick_check(frame, &sampled, x, y) {
                    continue;
                }
                let score = self.score_at(frame, &sampled, x, y, threshold);
                if score < threshold || score <= 0.0 {
                    continue;
                }
                let candidate = MatchResult::at(x, y, tw, th, score, threshold);
                let mut beats_all = true;
                let mut has_neighbors = false;
                for existing in &matches {
                    if existing.location.axis_distance(&candidate.location) < min_distance {
                        has_neighbors = true;
                        if existing.confidence >= score {
                            beats_all = false;
                            break;
                        }
                    }
                }
                if !has_neighbors {
                    matches.push(candidate);
                } else if beats_all {
                    matches.retain(|m| m.location.axis_distance(&candidate.location) >= min_distance);
                    matches.push(candidate);
                }
            }
            control.report(((y + 1) as u64 * 100 / rows as u64) as u8);
        }
        if !control.is_cancelled() {
            control.report(100);
        }

        matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        log::debug!("{} matches for {}", matches.len(), template.display_name());
        matches
    }

    /// Search only a window around `expected_center`, `margin` pixels beyond the template on each side
    ///
    /// Not found when the clipped window is not strictly larger than the template.
    pub fn find_template_near(
        &self,
        frame: &Frame,
        template: &Template,
        threshold: f32,
        expected_center: Point,
        margin: u32,
    ) -> MatchResult {
        let Some(window) = search_window(frame, template, expected_center, margin) else {
            log::debug!(
                "No room to verify {} around {}",
                template.display_name(),
                expected_center
            );
            return MatchResult::not_found();
        };
        let Some(cropped) = frame.crop(window) else {
            return MatchResult::not_found();
        };
        self.find_template(&cropped, template, threshold)
            .offset_by(window.x, window.y)
    }

    pub fn template_exists(&self, frame: &Frame, template: &Template, threshold: f32) -> bool {
        self.find_template(frame, template, threshold).found
    }

    pub fn template_center(&self, frame: &Frame, template: &Template, threshold: f32) -> Option<Point> {
        let result = self.find_template(frame, template, threshold);
        result.found.then_some(result.center)
    }

    /// Poll fresh frames until `template` appears, `timeout` passes or `cancel` fires
    ///
    /// Capture failures are logged and polling continues. Every call searches
    /// at least one frame.
    pub async fn wait_for_template<S: FrameSource>(
        &self,
        source: &S,
        template: &Template,
        threshold: f32,
        timeout: Duration,
        interval: Duration,
        cancel: Option<&CancelFlag>,
    ) -> MatchResult {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut polls = 0u32;

        loop {
            if cancel.is_some_and(CancelFlag::is_cancelled) {
                log::debug!("Waiting for {} cancelled after {} polls", template.display_name(), polls);
                return MatchResult::not_found();
            }
            polls += 1;
            match source.capture().await {
                Ok(capture) => {
                    let mut control = SearchControl::new();
                    if let Some(flag) = cancel {
                        control = control.with_cancel(flag.clone());
                    }
                    let result = self.find_template_with(&capture.frame, template, threshold, &mut control);
                    if result.found {
                        log::debug!("{} appeared after {} polls", template.display_name(), polls);
                        return result;
                    }
                }
                Err(e) => log::debug!("No frame while waiting for {}: {}", template.display_name(), e),
            }

            if tokio::time::Instant::now() + interval > deadline {
                log::debug!("{} did not appear within {:?}", template.display_name(), timeout);
                return MatchResult::not_found();
            }
            tokio::time::sleep(interval).await;
        }
    }

    fn sample_step(&self, template: &Template) -> u32 {
        if template.width() > self.subsample_above || template.height() > self.subsample_above {
            2
        } else {
            1
        }
    }

    /// Five fixed points must all be within tolerance on every channel
    fn quick_check(&self, frame: &Frame, sampled: &SampledTemplate, x: u32, y: u32) -> bool {
        let tol = self.quick_reject_tolerance;
        sampled.quick_points.iter().all(|&(tx, ty, t)| {
            let f = frame.rgb(x + tx, y + ty);
            (0..3).all(|c| t[c].abs_diff(f[c]) <= tol)
        })
    }

    /// Similarity in 0.0-1.0; 0.0 when the offset was abandoned early
    fn score_at(&self, frame: &Frame, sampled: &SampledTemplate, x: u32, y: u32, threshold: f32) -> f32 {
        let total = sampled.pixels.len();
        let max_allowed = (1.0 - threshold as f64) * total as f64 * MAX_PIXEL_DIFF;
        let mut diff: u64 = 0;

        for (checked, &(tx, ty, t)) in sampled.pixels.iter().enumerate() {
            let f = frame.rgb(x + tx, y + ty);
            diff += (t[0].abs_diff(f[0]) as u64)
                + (t[1].abs_diff(f[1]) as u64)
                + (t[2].abs_diff(f[2]) as u64);

            let checked = checked + 1;
            if threshold > 0.0 && checked % ABORT_CHECK_INTERVAL == 0 {
                let projected = diff as f64 / checked as f64 * total as f64;
                if projected > ABORT_SLACK * max_allowed {
                    return 0.0;
                }
            }
        }

        (1.0 - diff as f64 / (total as f64 * MAX_PIXEL_DIFF)).clamp(0.0, 1.0) as f32
    }

    fn result_for(
        &self,
        best_pos: Option<(u32, u32)>,
        best_score: f32,
        template: &Template,
        threshold: f32,
    ) -> MatchResult {
        match best_pos {
            Some((x, y)) => MatchResult::at(x, y, template.width(), template.height(), best_score, threshold),
            None => MatchResult::not_found(),
        }
    }
}

impl Default for TemplateMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn fits(frame: &Frame, template: &Template) -> bool {
    !frame.is_empty()
        && !template.is_empty()
        && template.width() <= frame.width()
        && template.height() <= frame.height()
}

/// Verification window around an expected center, clipped to the frame
pub fn search_window(frame: &Frame, template: &Template, center: Point, margin: u32) -> Option<Rect> {
    let (tw, th) = (template.width() as i64, template.height() as i64);
    let (fw, fh) = (frame.width() as i64, frame.height() as i64);
    let margin = margin as i64;

    let x = (center.x as i64 - tw / 2 - margin).clamp(0, fw);
    let y = (center.y as i64 - th / 2 - margin).clamp(0, fh);
    let width = (tw + 2 * margin).min(fw - x);
    let height = (th + 2 * margin).min(fh - y);

    if width <= tw || height <= th {
        return None;
    }
    Some(Rect::new(x as u32, y as u32, width as u32, height as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrameSequence;
    use image::{Rgb, RgbImage};
    use std::sync::{Arc, Mutex};

    fn solid_template(w: u32, h: u32, color: [u8; 3]) -> Template {
        Template::new(Some("solid".to_string()), RgbImage::from_pixel(w, h, Rgb(color)))
    }

    /// Frame with a gradient patch pasted at (px, py); the gradient keeps offsets distinguishable
    fn scene_with_patch(fw: u32, fh: u32, px: u32, py: u32, pw: u32, ph: u32) -> (Frame, Template) {
        let mut img = RgbImage::from_pixel(fw, fh, Rgb([30, 30, 30]));
        let mut patch = RgbImage::new(pw, ph);
        for y in 0..ph {
            for x in 0..pw {
                let color = Rgb([
                    (100 + (x * 150 / pw.max(1))) as u8,
                    (60 + (y * 120 / ph.max(1))) as u8,
                    ((x + y) % 40 + 80) as u8,
                ]);
                patch.put_pixel(x, y, color);
                img.put_pixel(px + x, py + y, color);
            }
        }
        (Frame::new(img), Template::new(Some("patch".into()), patch))
    }

    #[test]
    fn test_solid_template_found_at_offset() {
        let mut img = RgbImage::from_pixel(50, 50, Rgb([0, 0, 0]));
        for y in 10..14 {
            for x in 10..14 {
                img.put_pixel(x, y, Rgb([255, 0, 0]));
            }
        }
        let frame = Frame::new(img);
        let template = solid_template(4, 4, [255, 0, 0]);

        let result = TemplateMatcher::new().find_template(&frame, &template, 0.95);
        assert!(result.found);
        assert_eq!(result.location, Point::new(10, 10));
        assert_eq!(result.center, Point::new(12, 12));
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.bounds, Rect::new(10, 10, 4, 4));
    }

    #[test]
    fn test_uniform_frame_never_matches() {
        let frame = Frame::filled(50, 50, [0, 0, 0]);
        let template = solid_template(4, 4, [255, 0, 0]);

        let result = TemplateMatcher::new().find_template(&frame, &template, 0.95);
        assert!(!result.found);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_embedded_patch_exact_any_threshold() {
        let (frame, template) = scene_with_patch(120, 90, 37, 21, 20, 16);
        let matcher = TemplateMatcher::new();
        for threshold in [0.0, 0.5, 0.9, 1.0] {
            let result = matcher.find_template(&frame, &template, threshold);
            assert!(result.found, "threshold {threshold}");
            assert_eq!(result.location, Point::new(37, 21));
            assert_eq!(result.confidence, 1.0);
        }
    }

    #[test]
    fn test_large_template_is_subsampled_and_found() {
        let (frame, template) = scene_with_patch(200, 160, 64, 40, 60, 70);
        let result = TemplateMatcher::new().find_template(&frame, &template, 0.9);
        assert!(result.found);
        assert_eq!(result.location, Point::new(64, 40));
    }

    #[test]
    fn test_found_implies_threshold() {
        let (frame, template) = scene_with_patch(60, 60, 5, 5, 10, 10);
        // Perturb the scene so the best score is below 1.0
        let mut img = frame.into_image();
        for y in 5..15 {
            for x in 5..15 {
                let p = img.get_pixel_mut(x, y);
                p.0[0] = p.0[0].saturating_sub(20);
            }
        }
        let frame = Frame::new(img);
        let matcher = TemplateMatcher::new();
        for threshold in [0.5, 0.9, 0.98, 0.999] {
            let result = matcher.find_template(&frame, &template, threshold);
            if result.found {
                assert!(result.confidence >= threshold);
            }
        }
        assert!(!matcher.find_template(&frame, &template, 0.999).found);
    }

    #[test]
    fn test_template_larger_than_frame() {
        let frame = Frame::filled(10, 10, [0, 0, 0]);
        let template = solid_template(11, 5, [0, 0, 0]);
        let result = TemplateMatcher::new().find_template(&frame, &template, 0.5);
        assert!(!result.found);
        assert!(TemplateMatcher::new().find_all_templates(&frame, &template, 0.5, 5).is_empty());
    }

    #[test]
    fn test_empty_inputs_are_not_found() {
        let frame = Frame::filled(10, 10, [0, 0, 0]);
        let template = Template::new(None, RgbImage::new(0, 0));
        assert!(!TemplateMatcher::new().find_template(&frame, &template, 0.5).found);
    }

    #[test]
    fn test_find_all_respects_min_distance() {
        let mut img = RgbImage::from_pixel(100, 40, Rgb([0, 0, 0]));
        for &ox in &[5u32, 30, 33, 70] {
            for y in 10..16 {
                for x in ox..ox + 6 {
                    img.put_pixel(x, y, Rgb([200, 200, 0]));
                }
            }
        }
        let frame = Frame::new(img);
        let template = solid_template(6, 6, [200, 200, 0]);

        let matches = TemplateMatcher::new().find_all_templates(&frame, &template, 0.9, 10);
        assert!(matches.len() >= 3);
        for (i, a) in matches.iter().enumerate() {
            assert!(a.found);
            for b in &matches[i + 1..] {
                assert!(a.location.axis_distance(&b.location) >= 10);
            }
        }
        assert!(matches.iter().any(|m| m.location == Point::new(5, 10)));
        assert!(matches.iter().any(|m| m.location == Point::new(70, 10)));
    }

    #[test]
    fn test_cancelled_search_returns_not_found() {
        let (frame, template) = scene_with_patch(80, 80, 40, 40, 8, 8);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut control = SearchControl::new().with_cancel(cancel);
        let result = TemplateMatcher::new().find_template_with(&frame, &template, 0.5, &mut control);
        assert!(!result.found);
    }

    #[test]
    fn test_progress_is_monotonic_and_completes() {
        let (frame, template) = scene_with_patch(64, 64, 50, 50, 8, 8);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut control = SearchControl::new().with_progress(move |p| sink.lock().unwrap().push(p));
        TemplateMatcher::new().find_template_with(&frame, &template, 0.9, &mut control);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_find_near_maps_back_to_frame() {
        let (frame, template) = scene_with_patch(300, 200, 150, 90, 12, 12);
        let matcher = TemplateMatcher::new();
        let result = matcher.find_template_near(&frame, &template, 0.9, Point::new(160, 100), 20);
        assert!(result.found);
        assert_eq!(result.location, Point::new(150, 90));

        let far = matcher.find_template_near(&frame, &template, 0.9, Point::new(30, 30), 20);
        assert!(!far.found);
    }

    #[test]
    fn test_search_window_needs_room() {
        let frame = Frame::filled(20, 20, [0, 0, 0]);
        let template = solid_template(20, 10, [0, 0, 0]);
        assert!(search_window(&frame, &template, Point::new(10, 10), 5).is_none());

        let template = solid_template(4, 4, [0, 0, 0]);
        let window = search_window(&frame, &template, Point::new(2, 2), 3).unwrap();
        assert_eq!((window.x, window.y), (0, 0));
        assert_eq!((window.width, window.height), (10, 10));
    }

    #[test]
    fn test_large_template_sampling_step() {
        let matcher = TemplateMatcher::new();
        let small = solid_template(50, 50, [1, 2, 3]);
        let wide = solid_template(60, 70, [1, 2, 3]);
        assert_eq!(matcher.sample_step(&small), 1);
        assert_eq!(matcher.sample_step(&wide), 2);
        assert_eq!(SampledTemplate::new(&small, 1).pixels.len(), 2500);
        assert_eq!(SampledTemplate::new(&wide, 2).pixels.len(), 30 * 35);
    }

    #[test]
    fn test_hopeless_offset_is_abandoned() {
        // 400 sampled pixels, each 150 away on every channel: score ~0.41
        let template = solid_template(20, 20, [200, 200, 200]);
        let frame = Frame::filled(30, 30, [150, 150, 150]);
        let matcher = TemplateMatcher::new();
        let sampled = SampledTemplate::new(&template, matcher.sample_step(&template));
        assert!(sampled.pixels.len() > ABORT_CHECK_INTERVAL);

        assert_eq!(matcher.score_at(&frame, &sampled, 0, 0, 0.9), 0.0);
        let unbounded = matcher.score_at(&frame, &sampled, 0, 0, 0.0);
        assert!((unbounded - (1.0 - 150.0 / 255.0)).abs() < 0.01, "got {unbounded}");
    }

    #[test]
    fn test_cancelled_find_all_keeps_earlier_matches() {
        let mut img = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        for &(ox, oy) in &[(10u32, 2u32), (60, 85)] {
            for y in oy..oy + 6 {
                for x in ox..ox + 6 {
                    img.put_pixel(x, y, Rgb([200, 200, 0]));
                }
            }
        }
        let frame = Frame::new(img);
        let template = solid_template(6, 6, [200, 200, 0]);

        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut control = SearchControl::new().with_cancel(cancel).with_progress(move |p| {
            sink.lock().unwrap().push(p);
            if p >= 50 {
                trigger.cancel();
            }
        });
        let matches = TemplateMatcher::new().find_all_templates_with(&frame, &template, 0.9, 10, &mut control);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].location, Point::new(10, 2));
        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(!seen.contains(&100));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_wait_for_template_polls_until_found() {
        let (frame, template) = scene_with_patch(80, 60, 30, 20, 10, 10);
        let blank = Frame::filled(80, 60, [30, 30, 30]);
        let source = FrameSequence::new(vec![blank.clone(), blank, frame]);

        let result = TemplateMatcher::new()
            .wait_for_template(
                &source,
                &template,
                0.9,
                Duration::from_secs(2),
                Duration::from_millis(1),
                None,
            )
            .await;
        assert!(result.found);
        assert_eq!(result.location, Point::new(30, 20));
        assert_eq!(source.remaining(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_template_times_out() {
        let (_, template) = scene_with_patch(80, 60, 30, 20, 10, 10);
        let source = FrameSequence::new(vec![Frame::filled(80, 60, [30, 30, 30])]).repeat_last(true);

        let started = std::time::Instant::now();
        let result = TemplateMatcher::new()
            .wait_for_template(
                &source,
                &template,
                0.9,
                Duration::from_millis(40),
                Duration::from_millis(5),
                None,
            )
            .await;
        assert!(!result.found);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_wait_for_template_honours_cancel() {
        let (frame, template) = scene_with_patch(80, 60, 30, 20, 10, 10);
        let source = FrameSequence::new(vec![frame]);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = TemplateMatcher::new()
            .wait_for_template(
                &source,
                &template,
                0.9,
                Duration::from_secs(1),
                Duration::from_millis(1),
                Some(&cancel),
            )
            .await;
        assert!(!result.found);
        assert_eq!(source.remaining(), 1);
    }
}
