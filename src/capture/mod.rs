// Capture module - where frames come from
// The detectors never grab the screen themselves; they pull frames from a
// FrameSource. Window capture lives outside this crate, file and in-memory
// sources are provided for the CLI and tests.

pub mod backend;
pub mod error;
pub mod sources;
pub mod types;

#[cfg(test)]
mod tests;

pub use backend::CaptureBackend;
pub use error::{CaptureError, CaptureResult};
pub use sources::{FrameSequence, ImageFileSource, StaticFrameSource};
pub use types::{Capture, FrameSource};
