//! Durable storage for uploaded image bytes.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::Result;
use crate::models::UploadedFile;

/// Where an upload belongs; each mapping gets its own directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapping {
    ProjectImage,
    PictureImage,
}

impl Mapping {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectImage => "project_image",
            Self::PictureImage => "picture_image",
        }
    }
}

/// Writes upload bytes somewhere durable and reports the stored name.
pub trait FileStorage {
    /// Store `file` and return the name to record on the entity.
    fn store(&self, mapping: Mapping, file: &UploadedFile) -> Result<String>;

    /// Remove a stored file. Missing files are not an error.
    fn remove(&self, mapping: Mapping, file_name: &str) -> Result<()>;
}

/// Stores files under `<root>/<mapping>/<uuid>.<ext>`.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, mapping: Mapping, file_name: &str) -> PathBuf {
        self.root.join(mapping.as_str()).join(file_name)
    }
}

impl FileStorage for LocalFileStorage {
    fn store(&self, mapping: Mapping, file: &UploadedFile) -> Result<String> {
        let dir = self.root.join(mapping.as_str());
        fs::create_dir_all(&dir)?;

        let file_name = format!("{}.{}", Uuid::new_v4(), file.extension());
        fs::write(dir.join(&file_name), &file.bytes)?;

        tracing::debug!(
            "Stored {} ({} bytes) as {}/{}",
            file.original_name,
            file.bytes.len(),
            mapping.as_str(),
            file_name
        );
        Ok(file_name)
    }

    fn remove(&self, mapping: Mapping, file_name: &str) -> Result<()> {
        match fs::remove_file(self.path_for(mapping, file_name)) {
            Ok(()) => {
                tracing::debug!("Removed {}/{}", mapping.as_str(), file_name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
