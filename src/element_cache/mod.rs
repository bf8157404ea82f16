//! Element location cache
//!
//! Remembers where fixed UI elements were last seen, re-verifies those
//! positions cheaply, and falls back to full searches, user-supplied
//! coordinates or a request for a new reference template.

pub mod acquisition;
pub mod cache;
pub mod config;
pub mod error;
pub mod store;
pub mod templates;

#[cfg(test)]
mod tests;

pub use acquisition::{AcquisitionClient, AcquisitionRequest, create_acquisition_channel};
pub use cache::{ElementLocator, Located, LocationSource};
pub use config::{
    DATA_DIR_ENV, ELEMENTS_FILE, LOCATIONS_FILE, LocatorConfig, TEMPLATES_DIR,
    create_single_shot_config, resolve_data_dir,
};
pub use error::{LocateError, LocateResult};
pub use store::{CoordinateStore, ElementRecord};
pub use templates::{TemplateLibrary, safe_file_name};
