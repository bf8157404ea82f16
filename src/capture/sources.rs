use super::error::{CaptureError, CaptureResult};
use super::types::FrameSource;
use crate::frame::Frame;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Always returns the same frame
#[derive(Debug, Clone)]
pub struct StaticFrameSource {
    frame: Frame,
}

impl StaticFrameSource {
    pub fn new(frame: Frame) -> Self {
        Self { frame }
    }
}

impl FrameSource for StaticFrameSource {
    async fn capture_frame(&self) -> CaptureResult<Frame> {
        Ok(self.frame.clone())
    }

    fn source_name(&self) -> &str {
        "static"
    }
}

/// Re-reads an image file on every capture, so an external tool can keep replacing it
#[derive(Debug, Clone)]
pub struct ImageFileSource {
    path: PathBuf,
    name: String,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for ImageFileSource {
    async fn capture_frame(&self) -> CaptureResult<Frame> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| CaptureError::ReadFailed {
                path: self.path.clone(),
                source,
            })?;
        Ok(Frame::from_bytes(&bytes)?)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

/// Hands out frames in order, then either repeats the last one or reports exhaustion
#[derive(Debug)]
pub struct FrameSequence {
    frames: Mutex<VecDeque<Frame>>,
    last: Mutex<Option<Frame>>,
    repeat_last: bool,
}

impl FrameSequence {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: Mutex::new(frames.into_iter().collect()),
            last: Mutex::new(None),
            repeat_last: false,
        }
    }

    pub fn repeat_last(mut self, repeat: bool) -> Self {
        self.repeat_last = repeat;
        self
    }

    /// Decode every file up front
    pub fn from_files(paths: &[PathBuf]) -> CaptureResult<Self> {
        let frames = paths
            .iter()
            .map(|p| Frame::open(p).map_err(CaptureError::from))
            .collect::<CaptureResult<Vec<_>>>()?;
        Ok(Self::new(frames))
    }

    pub fn remaining(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or(0)
    }
}

impl FrameSource for FrameSequence {
    async fn capture_frame(&self) -> CaptureResult<Frame> {
        let poisoned = || CaptureError::Unavailable {
            description: "frame queue lock poisoned".to_string(),
        };
        let next = self.frames.lock().map_err(|_| poisoned())?.pop_front();
        let mut last = self.last.lock().map_err(|_| poisoned())?;
        match next {
            Some(frame) => {
                *last = Some(frame.clone());
                Ok(frame)
            }
            None if self.repeat_last => last.clone().ok_or(CaptureError::Exhausted),
            None => Err(CaptureError::Exhausted),
        }
    }

    fn source_name(&self) -> &str {
        "sequence"
    }
}
