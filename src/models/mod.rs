//! Domain models for the project portfolio.
//!
//! # Aggregate
//!
//! - [`Project`]: the aggregate root. Owns a title, timestamps, a thumbnail and
//!   an ordered list of pictures.
//! - [`Picture`]: an image owned by exactly one project, with a back-reference
//!   used for navigation only.
//! - [`Gallery`]: the arena both live in. Parent and child refer to each other
//!   by [`ProjectKey`] / [`PictureKey`] handles, and the gallery keeps the two
//!   sides of that link consistent.
//!
//! # Files
//!
//! - [`UploadedFile`]: bytes from the current request, not yet stored.
//! - [`ThumbnailFile`]: either a fresh upload or a [`StoredFile`] reloaded by
//!   name. Only a fresh upload bumps a project's `updated_at`.

mod gallery;
mod picture;
mod project;
mod upload;

pub use gallery::*;
pub use picture::*;
pub use project::*;
pub use upload::*;
