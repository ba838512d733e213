//! Pre-save checks on a project aggregate.
//!
//! Validation collects every problem instead of stopping at the first one, so
//! a caller can show all of them at once. Title uniqueness needs the database
//! and is reported at save time as [`crate::Error::DuplicateTitle`].

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{Gallery, ProjectKey, ThumbnailFile, UploadedFile};

pub const MAX_TITLE_CHARS: usize = 100;
pub const ACCEPTED_IMAGE_TYPE: &str = "image/jpeg";

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Field path, e.g. `title` or `image_files[2]`.
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Violations(pub Vec<Violation>);

impl Violations {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    pub fn for_field(&self, field: &str) -> Option<&Violation> {
        self.0.iter().find(|v| v.field == field)
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl From<Error> for Violations {
    /// Fold a save-time duplicate title into the same shape as other violations.
    fn from(err: Error) -> Self {
        match err {
            Error::DuplicateTitle(title) => Violations(vec![Violation::new(
                "title",
                format!("The title '{}' is already used by another project", title),
            )]),
            Error::Invalid(violations) => violations,
            other => Violations(vec![Violation::new("project", other.to_string())]),
        }
    }
}

pub fn validate_title(title: &str) -> Option<Violation> {
    if title.trim().is_empty() {
        return Some(Violation::new("title", "Title cannot be blank"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Some(Violation::new(
            "title",
            format!("Title must be {} characters or less", MAX_TITLE_CHARS),
        ));
    }
    None
}

fn validate_image(field: String, file: &UploadedFile) -> Option<Violation> {
    if file.is_jpeg() {
        return None;
    }
    Some(Violation::new(
        field,
        format!(
            "'{}' is {}, only {} images are accepted",
            file.original_name, file.mime_type, ACCEPTED_IMAGE_TYPE
        ),
    ))
}

/// Check every field of the project and its pending uploads.
pub fn validate_project(gallery: &Gallery, key: ProjectKey) -> Result<()> {
    let project = gallery.project(key)?;
    let mut violations = Vec::new();

    violations.extend(validate_title(project.title()));

    if let Some(ThumbnailFile::Uploaded(file)) = project.thumbnail() {
        violations.extend(validate_image("thumbnail".to_string(), file));
    }

    for (i, file) in project.image_files().iter().enumerate() {
        violations.extend(validate_image(format!("image_files[{}]", i), file));
    }

    for (i, (_, picture)) in gallery.pictures_of(key)?.into_iter().enumerate() {
        // Pictures built from `image_files` were already reported above.
        let Some(file) = picture.image_file() else {
            continue;
        };
        if !project.image_files().contains(file) {
            violations.extend(validate_image(format!("pictures[{}]", i), file));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::Invalid(Violations(violations)))
    }
}
