//! Debug overlay: detection results drawn onto a copy of the frame

use crate::blob_detection::{Blob, CastingResult};
use crate::frame::{Frame, Point, Rect};
use crate::template_matching::MatchResult;
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_cross_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use std::path::Path;

pub const MATCH_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const MISS_COLOR: Rgb<u8> = Rgb([255, 160, 0]);
pub const REGION_COLOR: Rgb<u8> = Rgb([0, 160, 255]);
pub const BLOB_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
pub const BEST_BLOB_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
pub const CAST_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

pub struct Overlay {
    canvas: RgbImage,
}

impl Overlay {
    pub fn new(frame: &Frame) -> Self {
        Self {
            canvas: frame.image().clone(),
        }
    }

    pub fn rect(&mut self, rect: Rect, color: Rgb<u8>) -> &mut Self {
        if !rect.is_empty() {
            let r = imageproc::rect::Rect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height);
            draw_hollow_rect_mut(&mut self.canvas, r, color);
        }
        self
    }

    pub fn marker(&mut self, at: Point, color: Rgb<u8>) -> &mut Self {
        draw_cross_mut(&mut self.canvas, color, at.x, at.y);
        self
    }

    /// Bounding box for every match, found or not, plus a center marker for found ones
    pub fn matches(&mut self, results: &[MatchResult]) -> &mut Self {
        for result in results {
            let color = if result.found { MATCH_COLOR } else { MISS_COLOR };
            self.rect(result.bounds, color);
            if result.found {
                self.marker(result.center, color);
            }
        }
        self
    }

    pub fn blobs(&mut self, region: Rect, blobs: &[Blob], best: Option<&Blob>) -> &mut Self {
        self.rect(region, REGION_COLOR);
        for blob in blobs {
            self.rect(blob.bounds, BLOB_COLOR);
        }
        if let Some(best) = best {
            let radius = (best.bounds.width.max(best.bounds.height) / 2 + 4) as i32;
            draw_hollow_circle_mut(&mut self.canvas, (best.centroid.x, best.centroid.y), radius, BEST_BLOB_COLOR);
            self.marker(best.centroid, BEST_BLOB_COLOR);
        }
        self
    }

    /// Drag from the anchor to the target
    pub fn cast(&mut self, cast: &CastingResult) -> &mut Self {
        draw_line_segment_mut(
            &mut self.canvas,
            (cast.anchor.x as f32, cast.anchor.y as f32),
            (cast.target.x as f32, cast.target.y as f32),
            CAST_COLOR,
        );
        self.marker(cast.anchor, CAST_COLOR);
        draw_hollow_circle_mut(&mut self.canvas, (cast.target.x, cast.target.y), 6, CAST_COLOR);
        self.marker(cast.feature, BEST_BLOB_COLOR)
    }

    pub fn image(&self) -> &RgbImage {
        &self.canvas
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), image::ImageError> {
        self.canvas.save(path.as_ref())?;
        log::info!("Wrote overlay to {:?}", path.as_ref());
        Ok(())
    }
}
