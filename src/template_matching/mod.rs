/// Template matching module for fixed UI controls
///
/// This module provides approximate template matching with:
/// - Five point quick reject before any scored comparison
/// - Sub-sampling of large templates and early abort of hopeless offsets
/// - Early accept once a near-perfect placement is seen
/// - Localized search around an expected position
/// - Cooperative cancellation and progress reporting
/// - Polling a frame source until a template appears
pub mod matcher;
pub mod types;

pub use matcher::{TemplateMatcher, search_window};
pub use types::{CancelFlag, MatchResult, SearchControl, Template};
