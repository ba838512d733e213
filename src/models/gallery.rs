use super::picture::Picture;
use super::project::{Project, ProjectWithPictures};
use super::upload::UploadedFile;
use crate::error::{Error, Result};

/// Handle to a project slot in a [`Gallery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectKey(usize);

/// Handle to a picture slot in a [`Gallery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PictureKey(usize);

/// Arena holding the projects and pictures of one unit of work.
///
/// Projects list their pictures by [`PictureKey`] and pictures point back by
/// [`ProjectKey`]. All edits to that link go through [`Gallery::add_picture`]
/// and [`Gallery::remove_picture`], which keep both sides in agreement.
/// Slots of deleted entities are left empty so outstanding handles resolve to
/// an `Unknown*` error instead of to a different entity.
#[derive(Debug, Default)]
pub struct Gallery {
    projects: Vec<Option<Project>>,
    pictures: Vec<Option<Picture>>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_project(&mut self, project: Project) -> ProjectKey {
        self.projects.push(Some(project));
        ProjectKey(self.projects.len() - 1)
    }

    /// Insert a detached picture. Use [`Gallery::add_picture`] to attach it.
    pub fn insert_picture(&mut self, mut picture: Picture) -> PictureKey {
        picture.project = None;
        self.pictures.push(Some(picture));
        PictureKey(self.pictures.len() - 1)
    }

    pub fn project(&self, key: ProjectKey) -> Result<&Project> {
        self.projects
            .get(key.0)
            .and_then(Option::as_ref)
            .ok_or(Error::UnknownProject(key))
    }

    pub fn project_mut(&mut self, key: ProjectKey) -> Result<&mut Project> {
        self.projects
            .get_mut(key.0)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownProject(key))
    }

    pub fn picture(&self, key: PictureKey) -> Result<&Picture> {
        self.pictures
            .get(key.0)
            .and_then(Option::as_ref)
            .ok_or(Error::UnknownPicture(key))
    }

    pub fn picture_mut(&mut self, key: PictureKey) -> Result<&mut Picture> {
        self.pictures
            .get_mut(key.0)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownPicture(key))
    }

    pub fn projects(&self) -> impl Iterator<Item = (ProjectKey, &Project)> {
        self.projects
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (ProjectKey(i), p)))
    }

    /// Find a loaded project by its persisted id.
    pub fn project_by_id(&self, id: i64) -> Option<ProjectKey> {
        self.projects()
            .find(|(_, p)| p.id() == Some(id))
            .map(|(key, _)| key)
    }

    /// The pictures of `project`, in insertion order.
    pub fn pictures_of(&self, project: ProjectKey) -> Result<Vec<(PictureKey, &Picture)>> {
        self.project(project)?
            .pictures
            .iter()
            .map(|&key| self.picture(key).map(|p| (key, p)))
            .collect()
    }

    /// Snapshot of a project and its pictures for display.
    pub fn view(&self, project: ProjectKey) -> Result<ProjectWithPictures> {
        let pictures = self
            .pictures_of(project)?
            .into_iter()
            .map(|(_, p)| p.clone())
            .collect();
        let project = self.project(project)?.clone();
        Ok(ProjectWithPictures {
            slug: project.slug(),
            project,
            pictures,
        })
    }

    pub fn pictures(&self) -> impl Iterator<Item = (PictureKey, &Picture)> {
        self.pictures
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (PictureKey(i), p)))
    }

    /// Pictures in the arena that no project lists.
    pub fn detached_pictures(&self) -> impl Iterator<Item = (PictureKey, &Picture)> {
        self.pictures().filter(|(_, p)| p.project.is_none())
    }

    /// Attach `picture` to `project`. No-op if it is already listed.
    ///
    /// A picture listed by another project is moved: it is removed from the
    /// previous owner first, so it is never listed twice.
    pub fn add_picture(&mut self, project: ProjectKey, picture: PictureKey) -> Result<()> {
        self.project(project)?;
        let previous = self.picture(picture)?.project;

        if self.project(project)?.pictures.contains(&picture) {
            return Ok(());
        }

        if let Some(owner) = previous.filter(|&owner| owner != project) {
            self.remove_picture(owner, picture)?;
        }

        self.project_mut(project)?.pictures.push(picture);
        self.picture_mut(picture)?.project = Some(project);
        Ok(())
    }

    /// Detach `picture` from `project`. No-op if it is not listed.
    ///
    /// A listed picture always points back at the project listing it, since
    /// [`Gallery::add_picture`] moves rather than shares, so its back-reference
    /// is cleared unconditionally.
    pub fn remove_picture(&mut self, project: ProjectKey, picture: PictureKey) -> Result<()> {
        self.picture(picture)?;
        let pictures = &mut self.project_mut(project)?.pictures;
        let Some(position) = pictures.iter().position(|&key| key == picture) else {
            return Ok(());
        };
        pictures.remove(position);

        self.picture_mut(picture)?.project = None;
        Ok(())
    }

    /// Create one picture per upload, attach them all to `project`, and retain
    /// the upload list on the project for re-display.
    pub fn add_image_files(
        &mut self,
        project: ProjectKey,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<PictureKey>> {
        self.project(project)?;

        let mut keys = Vec::with_capacity(files.len());
        for picture in Picture::from_uploads(&files) {
            let key = self.insert_picture(picture);
            self.add_picture(project, key)?;
            keys.push(key);
        }

        self.project_mut(project)?.set_image_files(files);
        Ok(keys)
    }

    /// Drop `project` and every picture whose back-reference resolves to it.
    pub fn delete_project(&mut self, project: ProjectKey) -> Result<Project> {
        let removed = self
            .projects
            .get_mut(project.0)
            .and_then(Option::take)
            .ok_or(Error::UnknownProject(project))?;

        for slot in &mut self.pictures {
            if slot.as_ref().is_some_and(|p| p.project == Some(project)) {
                *slot = None;
            }
        }

        Ok(removed)
    }

    /// Drop a detached picture or one listed by some project.
    pub fn delete_picture(&mut self, picture: PictureKey) -> Result<Picture> {
        if let Some(owner) = self.picture(picture)?.project {
            self.remove_picture(owner, picture)?;
        }
        self.pictures
            .get_mut(picture.0)
            .and_then(Option::take)
            .ok_or(Error::UnknownPicture(picture))
    }
}
