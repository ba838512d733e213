use crate::models::{PictureKey, ProjectKey};
use crate::validation::Violations;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Project handle {0:?} is not in this gallery")]
    UnknownProject(ProjectKey),

    #[error("Picture handle {0:?} is not in this gallery")]
    UnknownPicture(PictureKey),

    #[error("Project {0} does not exist")]
    ProjectNotFound(i64),

    #[error("A project titled '{0}' already exists")]
    DuplicateTitle(String),

    #[error("Validation failed: {0}")]
    Invalid(Violations),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
