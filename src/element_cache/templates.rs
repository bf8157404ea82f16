//! Reference templates on disk, one PNG per element

use super::error::{LocateError, LocateResult};
use crate::template_matching::Template;
use std::path::{Path, PathBuf};

/// Characters that are not allowed in file names on at least one platform
const INVALID_FILE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Element name made safe for use as a file stem
pub fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_whitespace() || c.is_control() || INVALID_FILE_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    dir: PathBuf,
}

impl TemplateLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Template file of `name`, reusing an existing file whose name differs only in case
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.existing_path(name)
            .unwrap_or_else(|| self.dir.join(format!("{}.png", safe_file_name(name))))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.existing_path(name).is_some()
    }

    /// Decode the element's template, labelled with the element name
    pub fn load(&self, name: &str) -> LocateResult<Template> {
        let Some(path) = self.existing_path(name) else {
            return Err(LocateError::TemplateNotFound {
                name: name.to_string(),
            });
        };
        let image = image::open(&path)
            .map_err(|source| LocateError::TemplateDecode {
                path: path.clone(),
                source,
            })?
            .to_rgb8();
        Ok(Template::new(Some(name.to_string()), image))
    }

    pub fn save(&self, name: &str, template: &Template) -> LocateResult<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|source| LocateError::PersistenceIo {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(name);
        template.image().save(&path).map_err(|e| match e {
            image::ImageError::IoError(source) => LocateError::PersistenceIo {
                path: path.clone(),
                source,
            },
            other => LocateError::TemplateDecode {
                path: path.clone(),
                source: other,
            },
        })?;
        log::info!("Saved template for '{}' to {:?}", name, path);
        Ok(path)
    }

    pub fn remove(&self, name: &str) -> LocateResult<bool> {
        let Some(path) = self.existing_path(name) else {
            return Ok(false);
        };
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(LocateError::PersistenceIo { path, source }),
        }
    }

    fn existing_path(&self, name: &str) -> Option<PathBuf> {
        let stem = safe_file_name(name);
        let exact = self.dir.join(format!("{}.png", stem));
        if exact.is_file() {
            return Some(exact);
        }
        let wanted = stem.to_lowercase();
        std::fs::read_dir(&self.dir)
            .ok()?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .find(|p| {
                p.is_file()
                    && p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
                    && p.file_stem().is_some_and(|s| s.to_string_lossy().to_lowercase() == wanted)
            })
    }

    /// File stems of every stored template
    pub fn names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png")))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names
    }
}
