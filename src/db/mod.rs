mod schema;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, Transaction};

use crate::error::{Error, Result};
use crate::models::*;
use crate::slug::slugify;
use crate::storage::{FileStorage, Mapping};

/// SQLite-backed persistence for project aggregates.
///
/// Assigns ids on first save, enforces unique titles, and writes or deletes a
/// project together with its pictures in one transaction.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Queries
    // ============================================================

    /// All projects ordered by title, with their picture counts.
    pub fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT p.id, p.title, p.created_at, COUNT(pic.id)
             FROM projects p LEFT JOIN pictures pic ON pic.project_id = p.id
             GROUP BY p.id ORDER BY p.title",
        )?;

        let projects = stmt
            .query_map([], |row| {
                let title: String = row.get(1)?;
                Ok(ProjectSummary {
                    id: row.get(0)?,
                    slug: slugify(&title),
                    title,
                    created_at: parse_datetime(2, row.get(2)?)?,
                    picture_count: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(projects)
    }

    /// Whether another project already uses `title`.
    pub fn title_taken(&self, title: &str, except_id: Option<i64>) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM projects WHERE title = ? AND id IS NOT ?",
            (title, except_id),
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Load a project and its pictures into `gallery`.
    ///
    /// A project that is already in the gallery is not loaded twice; its
    /// existing handle is returned. The stored thumbnail comes back as
    /// [`ThumbnailFile::Stored`], so it does not count as a new upload.
    pub fn load_project(&self, gallery: &mut Gallery, id: i64) -> Result<Option<ProjectKey>> {
        if let Some(key) = gallery.project_by_id(id) {
            return Ok(Some(key));
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, title, description, file_name, created_at, updated_at
             FROM projects WHERE id = ?",
        )?;

        let mut rows = stmt.query([id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let project_row = read_project_row(row)?;
        drop(rows);

        let mut stmt = conn.prepare(
            "SELECT id, file_name, created_at
             FROM pictures WHERE project_id = ? ORDER BY position, id",
        )?;
        let pictures = stmt
            .query_map([id], |row| {
                Ok(Picture::from_row(
                    row.get(0)?,
                    row.get(1)?,
                    parse_datetime(2, row.get(2)?)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut project = Project::from_row(project_row);
        if let Some(file_name) = project.file_name().map(str::to_string) {
            project.attach_thumbnail(Some(ThumbnailFile::Stored(StoredFile { file_name })));
        }

        let key = gallery.insert_project(project);
        for picture in pictures {
            let picture = gallery.insert_picture(picture);
            gallery.add_picture(key, picture)?;
        }

        Ok(Some(key))
    }

    /// Load the project whose title slugs to `slug`.
    ///
    /// Slugs are derived, not stored, so this scans titles.
    pub fn find_by_slug(&self, gallery: &mut Gallery, slug: &str) -> Result<Option<ProjectKey>> {
        let id = {
            let conn = self.conn.lock().expect("database lock poisoned");
            let mut stmt = conn.prepare("SELECT id, title FROM projects ORDER BY id")?;
            let mut rows = stmt.query([])?;
            let mut found = None;
            while let Some(row) = rows.next()? {
                let title: String = row.get(1)?;
                if slugify(&title) == slug {
                    found = Some(row.get::<_, i64>(0)?);
                    break;
                }
            }
            found
        };

        match id {
            Some(id) => self.load_project(gallery, id),
            None => Ok(None),
        }
    }

    // ============================================================
    // Save
    // ============================================================

    /// Persist the project behind `key` and all of its pictures.
    ///
    /// Pending uploads are written to `storage` first. Then, in one
    /// transaction, the project row is inserted or updated, every listed
    /// picture is inserted or updated in order, and picture rows this project
    /// no longer lists are deleted. Only after the commit are ids and stored
    /// file names written back into the gallery and the transient upload
    /// handles dropped. On failure the gallery is untouched and any files
    /// stored for this save are removed again.
    pub fn save_project(
        &self,
        gallery: &mut Gallery,
        key: ProjectKey,
        storage: &dyn FileStorage,
    ) -> Result<i64> {
        let mut uploads = UploadBatch::new(storage);
        let saved = match self.write_aggregate(gallery, key, &mut uploads) {
            Ok(saved) => saved,
            Err(e) => {
                uploads.discard();
                return Err(e);
            }
        };

        let project = gallery.project_mut(key)?;
        project.assign_id(saved.project_id);
        project.set_image_files(Vec::new());
        if let Some(file_name) = saved.thumbnail_name {
            project.set_file_name(Some(file_name.clone()));
            project.attach_thumbnail(Some(ThumbnailFile::Stored(StoredFile { file_name })));
        }

        for picture in saved.pictures {
            let entity = gallery.picture_mut(picture.key)?;
            entity.assign_id(picture.id);
            if let Some(file_name) = picture.new_file_name {
                entity.take_image_file();
                entity.set_file_name(Some(file_name));
            }
        }

        // Orphaned pictures are gone from the database; drop them here too.
        let orphaned: Vec<PictureKey> = gallery
            .detached_pictures()
            .filter(|(_, p)| p.id().is_some_and(|id| saved.orphaned.contains(&id)))
            .map(|(key, _)| key)
            .collect();
        for picture in orphaned {
            gallery.delete_picture(picture)?;
        }

        remove_files(storage, &saved.obsolete_files);

        tracing::debug!(
            "Saved project {} with {} pictures",
            saved.project_id,
            gallery.project(key)?.picture_keys().len()
        );
        Ok(saved.project_id)
    }

    fn write_aggregate(
        &self,
        gallery: &Gallery,
        key: ProjectKey,
        uploads: &mut UploadBatch<'_>,
    ) -> Result<SavedAggregate> {
        let project = gallery.project(key)?;
        let mut obsolete_files = Vec::new();

        let thumbnail_name = match project.thumbnail() {
            Some(ThumbnailFile::Uploaded(file)) => {
                let name = uploads.store(Mapping::ProjectImage, file)?;
                if let Some(old) = project.file_name() {
                    obsolete_files.push((Mapping::ProjectImage, old.to_string()));
                }
                Some(name)
            }
            _ => None,
        };
        let file_name = thumbnail_name
            .as_deref()
            .or(project.file_name())
            .map(str::to_string);

        let mut pending = Vec::new();
        for (picture_key, picture) in gallery.pictures_of(key)? {
            let new_file_name = match picture.image_file() {
                Some(file) => {
                    let name = uploads.store(Mapping::PictureImage, file)?;
                    if let Some(old) = picture.file_name() {
                        obsolete_files.push((Mapping::PictureImage, old.to_string()));
                    }
                    Some(name)
                }
                None => None,
            };
            pending.push((picture_key, picture, new_file_name));
        }

        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        let project_id = upsert_project(&tx, project, file_name.as_deref())?;

        let mut pictures = Vec::with_capacity(pending.len());
        for (position, (picture_key, picture, new_file_name)) in pending.into_iter().enumerate() {
            let file_name = new_file_name.as_deref().or(picture.file_name());
            let id = upsert_picture(&tx, project_id, position as i64, picture, file_name)?;
            pictures.push(SavedPicture {
                key: picture_key,
                id,
                new_file_name,
            });
        }

        let kept: HashSet<i64> = pictures.iter().map(|p| p.id).collect();
        // Rows of pictures that moved to another project in this gallery keep
        // their file; that project's save re-creates the row.
        let moved: HashSet<i64> = gallery
            .pictures()
            .filter(|(_, p)| p.project().is_some_and(|owner| owner != key))
            .filter_map(|(_, p)| p.id())
            .collect();
        let mut orphaned = HashSet::new();
        for (id, file_name) in delete_orphans(&tx, project_id, &kept)? {
            if moved.contains(&id) {
                continue;
            }
            orphaned.insert(id);
            if let Some(file_name) = file_name {
                obsolete_files.push((Mapping::PictureImage, file_name));
            }
        }

        tx.commit()?;

        Ok(SavedAggregate {
            project_id,
            thumbnail_name,
            pictures,
            orphaned,
            obsolete_files,
        })
    }

    // ============================================================
    // Delete
    // ============================================================

    /// Delete a project and all of its pictures as one unit of work, then
    /// remove their stored files.
    pub fn delete_project(&self, id: i64, storage: &dyn FileStorage) -> Result<bool> {
        let files = {
            let mut conn = self.conn.lock().expect("database lock poisoned");
            let tx = conn.transaction()?;

            let thumbnail: Option<Option<String>> = {
                let mut stmt = tx.prepare("SELECT file_name FROM projects WHERE id = ?")?;
                let mut rows = stmt.query([id])?;
                let found = match rows.next()? {
                    Some(row) => Some(row.get(0)?),
                    None => None,
                };
                found
            };
            let Some(thumbnail) = thumbnail else {
                return Ok(false);
            };

            let orphans = delete_orphans(&tx, id, &HashSet::new())?;
            tx.execute("DELETE FROM projects WHERE id = ?", [id])?;
            tx.commit()?;

            tracing::info!("Deleted project {} and {} pictures", id, orphans.len());

            let mut files: Vec<(Mapping, String)> = orphans
                .into_iter()
                .filter_map(|(_, f)| f.map(|f| (Mapping::PictureImage, f)))
                .collect();
            files.extend(thumbnail.map(|f| (Mapping::ProjectImage, f)));
            files
        };

        remove_files(storage, &files);
        Ok(true)
    }

    /// Delete one picture row and its stored file.
    pub fn delete_picture(&self, id: i64, storage: &dyn FileStorage) -> Result<bool> {
        let file_name: Option<Option<String>> = {
            let conn = self.conn.lock().expect("database lock poisoned");
            let mut stmt = conn.prepare("SELECT file_name FROM pictures WHERE id = ?")?;
            let mut rows = stmt.query([id])?;
            let found = match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            };
            drop(rows);
            if found.is_some() {
                conn.execute("DELETE FROM pictures WHERE id = ?", [id])?;
            }
            found
        };

        let Some(file_name) = file_name else {
            return Ok(false);
        };
        if let Some(file_name) = file_name {
            remove_files(storage, &[(Mapping::PictureImage, file_name)]);
        }
        Ok(true)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

/// Files written during one save, removed again if the save fails.
struct UploadBatch<'a> {
    storage: &'a dyn FileStorage,
    stored: Vec<(Mapping, String)>,
}

impl<'a> UploadBatch<'a> {
    fn new(storage: &'a dyn FileStorage) -> Self {
        Self {
            storage,
            stored: Vec::new(),
        }
    }

    fn store(&mut self, mapping: Mapping, file: &UploadedFile) -> Result<String> {
        let name = self.storage.store(mapping, file)?;
        self.stored.push((mapping, name.clone()));
        Ok(name)
    }

    fn discard(self) {
        remove_files(self.storage, &self.stored);
    }
}

struct SavedAggregate {
    project_id: i64,
    thumbnail_name: Option<String>,
    pictures: Vec<SavedPicture>,
    /// Ids of picture rows deleted because no project lists them any more.
    orphaned: HashSet<i64>,
    /// Files replaced or orphaned by this save.
    obsolete_files: Vec<(Mapping, String)>,
}

struct SavedPicture {
    key: PictureKey,
    id: i64,
    new_file_name: Option<String>,
}

fn upsert_project(tx: &Transaction<'_>, project: &Project, file_name: Option<&str>) -> Result<i64> {
    let created_at = project.created_at().to_rfc3339();
    let updated_at = project.updated_at().map(|t| t.to_rfc3339());

    let result = match project.id() {
        Some(id) => tx
            .execute(
                "UPDATE projects SET title = ?, description = ?, file_name = ?, created_at = ?, updated_at = ?
                 WHERE id = ?",
                (
                    project.title(),
                    project.description(),
                    file_name,
                    &created_at,
                    &updated_at,
                    id,
                ),
            )
            .map(|rows| (rows > 0).then_some(id)),
        None => tx
            .execute(
                "INSERT INTO projects (title, description, file_name, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?)",
                (
                    project.title(),
                    project.description(),
                    file_name,
                    &created_at,
                    &updated_at,
                ),
            )
            .map(|_| Some(tx.last_insert_rowid())),
    };

    match result {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(Error::ProjectNotFound(project.id().unwrap_or_default())),
        Err(e) => Err(title_conflict(e, project.title())),
    }
}

fn upsert_picture(
    tx: &Transaction<'_>,
    project_id: i64,
    position: i64,
    picture: &Picture,
    file_name: Option<&str>,
) -> Result<i64> {
    if let Some(id) = picture.id() {
        let rows = tx.execute(
            "UPDATE pictures SET project_id = ?, file_name = ?, position = ? WHERE id = ?",
            (project_id, file_name, position, id),
        )?;
        if rows > 0 {
            return Ok(id);
        }
    }

    tx.execute(
        "INSERT INTO pictures (project_id, file_name, position, created_at) VALUES (?, ?, ?, ?)",
        (
            project_id,
            file_name,
            position,
            picture.created_at().to_rfc3339(),
        ),
    )?;
    Ok(tx.last_insert_rowid())
}

/// Delete picture rows of `project_id` not in `kept`; returns their ids and
/// file names.
fn delete_orphans(
    tx: &Transaction<'_>,
    project_id: i64,
    kept: &HashSet<i64>,
) -> Result<Vec<(i64, Option<String>)>> {
    let existing = tx
        .prepare("SELECT id, file_name FROM pictures WHERE project_id = ?")?
        .query_map([project_id], |row| Ok((row.get::<_, i64>(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<(i64, Option<String>)>, _>>()?;

    let mut removed = Vec::new();
    for (id, file_name) in existing {
        if !kept.contains(&id) {
            tx.execute("DELETE FROM pictures WHERE id = ?", [id])?;
            removed.push((id, file_name));
        }
    }
    Ok(removed)
}

fn remove_files(storage: &dyn FileStorage, files: &[(Mapping, String)]) {
    for (mapping, file_name) in files {
        if let Err(e) = storage.remove(*mapping, file_name) {
            tracing::warn!(
                "Failed to remove {}/{}: {}",
                mapping.as_str(),
                file_name,
                e
            );
        }
    }
}

fn title_conflict(err: rusqlite::Error, title: &str) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Error::DuplicateTitle(title.to_string())
        }
        _ => err.into(),
    }
}

fn read_project_row(row: &Row<'_>) -> rusqlite::Result<ProjectRow> {
    Ok(ProjectRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        file_name: row.get(3)?,
        created_at: parse_datetime(4, row.get(4)?)?,
        updated_at: row
            .get::<_, Option<String>>(5)?
            .map(|s| parse_datetime(5, s))
            .transpose()?,
    })
}

fn parse_datetime(idx: usize, s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
