use crate::capture::CaptureError;
use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for element lookups.
pub type LocateResult<T> = Result<T, LocateError>;

/// The error type for element location and its persistence.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("No frame available: {source}")]
    FrameUnavailable {
        #[from]
        source: CaptureError,
    },

    #[error("No template registered for element '{name}'")]
    TemplateNotFound { name: String },

    #[error("Element '{name}' not found on screen and has no manual coordinate")]
    NoCachedOrManualCoordinate { name: String },

    #[error("Template acquisition for '{name}' was denied or unavailable")]
    AcquisitionDenied { name: String },

    #[error("Lookup cancelled by caller")]
    CancelledByCaller,

    #[error("Failed to persist {path:?}: {source}")]
    PersistenceIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode template {path:?}: {source}")]
    TemplateDecode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to serialize element store: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl LocateError {
    /// Errors that still leave the caller a usable answer on a later attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LocateError::FrameUnavailable { .. } | LocateError::NoCachedOrManualCoordinate { .. }
        )
    }
}
