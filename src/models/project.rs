use chrono::{DateTime, Utc};
use serde::Serialize;

use super::gallery::PictureKey;
use super::picture::Picture;
use super::upload::{ThumbnailFile, UploadedFile};
use crate::slug::slugify;

/// The aggregate root: a titled project with a thumbnail and owned pictures.
///
/// Pictures are referenced by handle into the owning [`super::Gallery`]; the
/// gallery is the only place that edits `pictures` so the back-references on
/// the picture side always agree with this list.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    id: Option<i64>,
    title: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    /// Stored thumbnail name, the only persisted part of the thumbnail.
    file_name: Option<String>,
    #[serde(skip)]
    thumbnail: Option<ThumbnailFile>,
    /// Last upload list handed in, kept for re-display after a failed save.
    #[serde(skip)]
    image_files: Vec<UploadedFile>,
    #[serde(skip)]
    pub(crate) pictures: Vec<PictureKey>,
}

impl Project {
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_created_at(title, Utc::now())
    }

    fn with_created_at(title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: None,
            created_at,
            updated_at: None,
            file_name: None,
            thumbnail: None,
            image_files: Vec::new(),
            pictures: Vec::new(),
        }
    }

    /// Rebuild a persisted project. Transient handles start empty.
    pub(crate) fn from_row(row: ProjectRow) -> Self {
        let mut project = Self::with_created_at(row.title, row.created_at);
        project.id = Some(row.id);
        project.description = row.description;
        project.updated_at = row.updated_at;
        project.file_name = row.file_name;
        project
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: i64) {
        debug_assert!(self.id.map_or(true, |existing| existing == id));
        self.id = Some(id);
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn set_created_at(&mut self, created_at: DateTime<Utc>) {
        self.created_at = created_at;
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn set_file_name(&mut self, file_name: Option<String>) {
        self.file_name = file_name;
    }

    pub fn thumbnail(&self) -> Option<&ThumbnailFile> {
        self.thumbnail.as_ref()
    }

    /// Attach the thumbnail handle for this save cycle.
    ///
    /// A fresh upload bumps `updated_at`; a reloaded stored file does not.
    pub fn attach_thumbnail(&mut self, thumbnail: Option<ThumbnailFile>) {
        self.attach_thumbnail_at(thumbnail, Utc::now());
    }

    pub fn attach_thumbnail_at(&mut self, thumbnail: Option<ThumbnailFile>, now: DateTime<Utc>) {
        if thumbnail.as_ref().is_some_and(ThumbnailFile::is_new_upload) {
            self.updated_at = Some(now);
        }
        self.thumbnail = thumbnail;
    }

    pub fn image_files(&self) -> &[UploadedFile] {
        &self.image_files
    }

    /// Retain an upload list verbatim. Creating pictures from it is
    /// [`super::Gallery::add_image_files`]'s job.
    pub fn set_image_files(&mut self, image_files: Vec<UploadedFile>) {
        self.image_files = image_files;
    }

    pub fn picture_keys(&self) -> &[PictureKey] {
        &self.pictures
    }

    /// URL-safe identifier derived from the current title on every call.
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }
}

/// Column values of a `projects` row.
#[derive(Debug, Clone)]
pub(crate) struct ProjectRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub file_name: Option<String>,
}

/// A project with its pictures and slug, used for detailed output.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectWithPictures {
    #[serde(flatten)]
    pub project: Project,
    pub slug: String,
    pub pictures: Vec<Picture>,
}

/// A project listing entry.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProjectSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub picture_count: usize,
    pub created_at: DateTime<Utc>,
}
