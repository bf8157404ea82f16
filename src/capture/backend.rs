use super::error::CaptureResult;
use super::sources::{FrameSequence, ImageFileSource, StaticFrameSource};
use super::types::FrameSource;
use crate::frame::Frame;
use std::path::PathBuf;

/// Frame source selected at runtime (CLI input)
pub enum CaptureBackend {
    File(ImageFileSource),
    Sequence(FrameSequence),
    Static(StaticFrameSource),
}

impl CaptureBackend {
    /// One file is re-read on each capture; several files are played back in order
    pub fn from_paths(paths: &[PathBuf]) -> CaptureResult<Self> {
        match paths {
            [single] => Ok(CaptureBackend::File(ImageFileSource::new(single.clone()))),
            many => Ok(CaptureBackend::Sequence(
                FrameSequence::from_files(many)?.repeat_last(true),
            )),
        }
    }
}

impl FrameSource for CaptureBackend {
    async fn capture_frame(&self) -> CaptureResult<Frame> {
        match self {
            CaptureBackend::File(f) => f.capture_frame().await,
            CaptureBackend::Sequence(s) => s.capture_frame().await,
            CaptureBackend::Static(s) => s.capture_frame().await,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            CaptureBackend::File(f) => f.source_name(),
            CaptureBackend::Sequence(s) => s.source_name(),
            CaptureBackend::Static(s) => s.source_name(),
        }
    }
}
