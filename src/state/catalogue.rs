use std::collections::HashSet;
use std::path::Path;

use super::data::CameraDescriptor;
use crate::error::CatalogueError;

/// Camera table compiled into the binary
const BUILTIN_CAMERAS: &str = include_str!("../../cameras.json");

/// The Catalogue is the static lookup table of known cameras.
/// It is built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Catalogue {
    cameras: Vec<CameraDescriptor>,
}

/// Outcome of resolving user-supplied slugs against the catalogue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    /// Known cameras, de-duplicated, in request order
    pub cameras: Vec<CameraDescriptor>,
    /// Requested slugs with no catalogue entry
    pub unknown: Vec<String>,
}

impl Catalogue {
    /// Load the camera table shipped with the binary
    pub fn builtin() -> Result<Self, CatalogueError> {
        Self::from_json(BUILTIN_CAMERAS)
    }

    /// Load a camera table from a JSON file on disk
    pub fn from_file(path: &Path) -> Result<Self, CatalogueError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogueError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse a JSON array of `{ "slug", "name", "url" }` objects
    pub fn from_json(json: &str) -> Result<Self, CatalogueError> {
        let cameras: Vec<CameraDescriptor> = serde_json::from_str(json)?;

        let mut seen = HashSet::new();
        for (index, camera) in cameras.iter().enumerate() {
            if camera.slug.trim().is_empty() {
                return Err(CatalogueError::EmptyField { index, field: "slug" });
            }
            if !is_valid_slug(&camera.slug) {
                return Err(CatalogueError::InvalidSlug(camera.slug.clone()));
            }
            if camera.url.trim().is_empty() {
                return Err(CatalogueError::EmptyField { index, field: "url" });
            }
            if !seen.insert(camera.slug.as_str()) {
                return Err(CatalogueError::DuplicateSlug(camera.slug.clone()));
            }
        }

        Ok(Self { cameras })
    }

    /// Serialize the table in the same format `from_json` reads
    pub fn to_json(&self) -> Result<String, CatalogueError> {
        Ok(serde_json::to_string_pretty(&self.cameras)?)
    }

    /// Find a camera by slug
    pub fn lookup(&self, slug: &str) -> Result<&CameraDescriptor, CatalogueError> {
        self.cameras
            .iter()
            .find(|camera| camera.slug == slug)
            .ok_or_else(|| CatalogueError::NotFound(slug.to_string()))
    }

    /// All cameras in catalogue order
    pub fn list_all(&self) -> &[CameraDescriptor] {
        &self.cameras
    }

    /// Resolve requested slugs, dropping duplicates and collecting unknown ones
    pub fn resolve<S: AsRef<str>>(&self, slugs: &[S]) -> Resolved {
        let mut resolved = Resolved::default();
        let mut seen = HashSet::new();

        for slug in slugs {
            let slug = slug.as_ref();
            if !seen.insert(slug) {
                continue;
            }
            match self.lookup(slug) {
                Ok(camera) => resolved.cameras.push(camera.clone()),
                Err(_) => resolved.unknown.push(slug.to_string()),
            }
        }

        resolved
    }
}

/// Slugs become filename prefixes and directory names, so they must be
/// a single plain path component
fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
