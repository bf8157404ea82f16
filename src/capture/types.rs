// Core capture types and traits
use super::error::CaptureResult;
use crate::frame::Frame;

#[derive(Debug, Clone)]
pub struct Capture {
    pub frame: Frame,
    pub duration_ms: u128,
}

// Anything that can hand out the current frame of the target window
#[allow(async_fn_in_trait)]
pub trait FrameSource: Send + Sync {
    // Raw backend-specific capture (implemented per source)
    async fn capture_frame(&self) -> CaptureResult<Frame>;

    // Default high-level capture with timing
    async fn capture(&self) -> CaptureResult<Capture> {
        let start = std::time::Instant::now();
        let frame = self.capture_frame().await?;
        let duration_ms = start.elapsed().as_millis();
        log::debug!(
            "Captured {}x{} frame from {} in {}ms",
            frame.width(),
            frame.height(),
            self.source_name(),
            duration_ms
        );
        Ok(Capture { frame, duration_ms })
    }

    fn source_name(&self) -> &str;
}
