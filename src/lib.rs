pub mod annotate;
pub mod blob_detection;
pub mod capture;
pub mod element_cache;
pub mod frame;
pub mod template_matching;

pub use blob_detection::{BlobDetector, CastingResult, LocationConfigStore};
pub use capture::FrameSource;
pub use element_cache::{ElementLocator, LocateError};
pub use frame::{Frame, Point, Rect};
pub use template_matching::{CancelFlag, MatchResult, Template, TemplateMatcher};
