//! Image vector of the components deployed by the extension
//!
//! The vector is embedded from `images.yaml` at build time. Operators can
//! override entries at runtime by pointing `IMAGEVECTOR_OVERWRITE` to another
//! image vector file. The vector is loaded once at startup and handed to the
//! components that need it.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::RUNTIME_GVISOR_INSTALLATION_IMAGE_NAME;
use crate::error::{CoreError, Result};

/// Embedded image vector
pub const IMAGES_YAML: &str = include_str!("../images.yaml");

/// Environment variable naming an image vector file with overrides
pub const OVERWRITE_ENV: &str = "IMAGEVECTOR_OVERWRITE";

/// Tag used for images without an explicit tag
pub fn default_tag() -> String {
    format!("v{}", env!("CARGO_PKG_VERSION"))
}

/// A single image entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSource {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_repository: Option<String>,

    #[serde(default)]
    pub repository: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl ImageSource {
    /// Image reference, `repository:tag` or `repository@sha256:...` for digests
    pub fn reference(&self) -> String {
        match &self.tag {
            None => self.repository.clone(),
            Some(tag) => join_reference(&self.repository, tag),
        }
    }

    /// Image reference falling back to `default_tag` when no tag is set
    pub fn reference_or(&self, default_tag: &str) -> String {
        let tag = self.tag.as_deref().unwrap_or(default_tag);
        join_reference(&self.repository, tag)
    }
}

fn join_reference(repository: &str, tag: &str) -> String {
    if tag.starts_with("sha256:") {
        format!("{}@{}", repository, tag)
    } else {
        format!("{}:{}", repository, tag)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ImageVectorFile {
    #[serde(default)]
    images: Vec<ImageSource>,
}

/// Keyed lookup over image sources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageVector {
    images: Vec<ImageSource>,
}

impl ImageVector {
    /// Parse an image vector from YAML
    pub fn read(yaml: &str) -> Result<Self> {
        let file: ImageVectorFile = serde_yaml::from_str(yaml)?;
        for image in &file.images {
            if image.name.is_empty() {
                return Err(CoreError::InvalidImageVector {
                    message: "image without name".to_string(),
                });
            }
        }
        Ok(Self { images: file.images })
    }

    /// Parse an image vector from a file
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::read(&content)
    }

    /// The embedded image vector
    pub fn embedded() -> Result<Self> {
        Self::read(IMAGES_YAML)
    }

    /// Load the embedded vector, apply env overrides and check the required images
    pub fn load() -> Result<Self> {
        let vector = Self::embedded()?.with_env_override()?;
        vector.find_image(RUNTIME_GVISOR_INSTALLATION_IMAGE_NAME)?;
        Ok(vector)
    }

    /// Apply the overrides named by `IMAGEVECTOR_OVERWRITE`, if set
    pub fn with_env_override(self) -> Result<Self> {
        match std::env::var(OVERWRITE_ENV) {
            Ok(path) if !path.is_empty() => Ok(self.with_override(Self::read_file(path)?)),
            _ => Ok(self),
        }
    }

    /// Merge `overrides` into this vector.
    ///
    /// Entries with a known name replace the fields they set; unknown names are appended.
    pub fn with_override(mut self, overrides: ImageVector) -> Self {
        for over in overrides.images {
            match self.images.iter_mut().find(|i| i.name == over.name) {
                Some(existing) => {
                    if !over.repository.is_empty() {
                        existing.repository = over.repository;
                    }
                    if over.tag.is_some() {
                        existing.tag = over.tag;
                    }
                    if over.source_repository.is_some() {
                        existing.source_repository = over.source_repository;
                    }
                }
                None => self.images.push(over),
            }
        }
        self
    }

    /// Find an image by name
    pub fn find_image(&self, name: &str) -> Result<&ImageSource> {
        self.images
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| CoreError::ImageNotFound {
                name: name.to_string(),
            })
    }

    /// Image reference for `name`, tagged with the extension version if untagged
    pub fn image(&self, name: &str) -> Result<String> {
        Ok(self.find_image(name)?.reference_or(&default_tag()))
    }

    /// All images
    pub fn images(&self) -> &[ImageSource] {
        &self.images
    }
}
