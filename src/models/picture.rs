use chrono::{DateTime, Utc};
use serde::Serialize;

use super::gallery::ProjectKey;
use super::upload::UploadedFile;

/// An image owned by exactly one project.
///
/// The `project` back-reference is navigation only. It is written by
/// [`super::Gallery`] when the picture is added to or removed from a project,
/// never by the picture itself.
#[derive(Debug, Clone, Serialize)]
pub struct Picture {
    id: Option<i64>,
    file_name: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(skip)]
    image_file: Option<UploadedFile>,
    #[serde(skip)]
    pub(crate) project: Option<ProjectKey>,
}

impl Picture {
    pub fn new() -> Self {
        Self {
            id: None,
            file_name: None,
            created_at: Utc::now(),
            image_file: None,
            project: None,
        }
    }

    pub fn from_upload(file: UploadedFile) -> Self {
        let mut picture = Self::new();
        picture.set_image_file(Some(file));
        picture
    }

    /// One detached picture per upload, in input order.
    pub fn from_uploads(files: &[UploadedFile]) -> Vec<Self> {
        files.iter().cloned().map(Self::from_upload).collect()
    }

    pub(crate) fn from_row(id: i64, file_name: Option<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Some(id),
            file_name,
            created_at,
            image_file: None,
            project: None,
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn set_file_name(&mut self, file_name: Option<String>) {
        self.file_name = file_name;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn image_file(&self) -> Option<&UploadedFile> {
        self.image_file.as_ref()
    }

    pub fn set_image_file(&mut self, file: Option<UploadedFile>) {
        self.image_file = file;
    }

    pub(crate) fn take_image_file(&mut self) -> Option<UploadedFile> {
        self.image_file.take()
    }

    pub fn project(&self) -> Option<ProjectKey> {
        self.project
    }
}

impl Default for Picture {
    fn default() -> Self {
        Self::new()
    }
}
