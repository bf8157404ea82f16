use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for frame capture.
pub type CaptureResult<T> = Result<T, CaptureError>;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to read frame from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode frame: {source}")]
    DecodeFailed {
        #[from]
        source: image::ImageError,
    },

    #[error("Frame source has no more frames")]
    Exhausted,

    #[error("Frame source unavailable: {description}")]
    Unavailable { description: String },
}
