use chrono::{Duration, Utc};
use showcase::db::Database;
use showcase::models::*;
use showcase::storage::{FileStorage, LocalFileStorage, Mapping};
use showcase::Error;
use speculate2::speculate;

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

fn jpeg(name: &str) -> UploadedFile {
    UploadedFile::new(name, JPEG.to_vec())
}

fn create_test_project(
    db: &Database,
    gallery: &mut Gallery,
    storage: &LocalFileStorage,
    title: &str,
) -> (ProjectKey, i64) {
    let key = gallery.insert_project(Project::new(title));
    let id = db
        .save_project(gallery, key, storage)
        .expect("Failed to save project");
    (key, id)
}

fn stored_files(storage: &LocalFileStorage, mapping: Mapping) -> usize {
    std::fs::read_dir(storage.root().join(mapping.as_str()))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
        let uploads = tempfile::tempdir().expect("Failed to create upload dir");
        let storage = LocalFileStorage::new(uploads.path());
        let mut gallery = Gallery::new();
    }

    describe "save_project" {
        it "assigns an id on first save" {
            let key = gallery.insert_project(Project::new("My Photo Trip"));
            assert!(gallery.project(key).unwrap().id().is_none());

            let id = db.save_project(&mut gallery, key, &storage).expect("Failed to save");

            assert_eq!(gallery.project(key).unwrap().id(), Some(id));
        }

        it "updates in place on later saves" {
            let (key, id) = create_test_project(&db, &mut gallery, &storage, "Draft");
            gallery.project_mut(key).unwrap().set_title("Final");
            gallery
                .project_mut(key)
                .unwrap()
                .set_description(Some("Done".to_string()));

            let again = db.save_project(&mut gallery, key, &storage).expect("Failed to save");

            assert_eq!(again, id);
            let projects = db.list_projects().expect("Query failed");
            assert_eq!(projects.len(), 1);
            assert_eq!(projects[0].title, "Final");
            assert_eq!(projects[0].slug, "final");
        }

        it "rejects a duplicate title" {
            create_test_project(&db, &mut gallery, &storage, "Taken");
            let key = gallery.insert_project(Project::new("Taken"));

            let result = db.save_project(&mut gallery, key, &storage);

            assert!(matches!(result, Err(Error::DuplicateTitle(ref t)) if t == "Taken"));
            assert!(gallery.project(key).unwrap().id().is_none());
        }

        it "removes files stored for a save that failed" {
            create_test_project(&db, &mut gallery, &storage, "Taken");
            let key = gallery.insert_project(Project::new("Taken"));
            gallery.add_image_files(key, vec![jpeg("a.jpg")]).unwrap();

            assert!(db.save_project(&mut gallery, key, &storage).is_err());

            assert_eq!(stored_files(&storage, Mapping::PictureImage), 0);
            let (_, picture) = gallery.pictures_of(key).unwrap()[0];
            assert!(picture.image_file().is_some());
            assert!(picture.id().is_none());
        }

        it "stores pending uploads and records their file names" {
            let key = gallery.insert_project(Project::new("Trip"));
            gallery
                .project_mut(key)
                .unwrap()
                .attach_thumbnail(Some(ThumbnailFile::Uploaded(jpeg("cover.jpg"))));
            gallery
                .add_image_files(key, vec![jpeg("a.jpg"), jpeg("b.jpg")])
                .unwrap();

            db.save_project(&mut gallery, key, &storage).expect("Failed to save");

            let project = gallery.project(key).unwrap();
            let thumb = project.file_name().expect("thumbnail name recorded");
            assert!(storage.path_for(Mapping::ProjectImage, thumb).exists());
            assert!(matches!(project.thumbnail(), Some(ThumbnailFile::Stored(_))));
            assert!(project.image_files().is_empty());

            for (_, picture) in gallery.pictures_of(key).unwrap() {
                let name = picture.file_name().expect("picture name recorded");
                assert!(storage.path_for(Mapping::PictureImage, name).exists());
                assert!(picture.image_file().is_none());
                assert!(picture.id().is_some());
            }
        }

        it "replaces the old thumbnail file" {
            let key = gallery.insert_project(Project::new("Trip"));
            gallery
                .project_mut(key)
                .unwrap()
                .attach_thumbnail(Some(ThumbnailFile::Uploaded(jpeg("one.jpg"))));
            db.save_project(&mut gallery, key, &storage).expect("Failed to save");
            let first = gallery.project(key).unwrap().file_name().unwrap().to_string();

            gallery
                .project_mut(key)
                .unwrap()
                .attach_thumbnail(Some(ThumbnailFile::Uploaded(jpeg("two.jpg"))));
            db.save_project(&mut gallery, key, &storage).expect("Failed to save");

            let second = gallery.project(key).unwrap().file_name().unwrap();
            assert_ne!(first, second);
            assert!(!storage.path_for(Mapping::ProjectImage, &first).exists());
            assert_eq!(stored_files(&storage, Mapping::ProjectImage), 1);
        }

        it "deletes rows of pictures removed from the project" {
            let key = gallery.insert_project(Project::new("Trip"));
            let pictures = gallery
                .add_image_files(key, vec![jpeg("a.jpg"), jpeg("b.jpg")])
                .unwrap();
            let id = db.save_project(&mut gallery, key, &storage).expect("Failed to save");

            gallery.remove_picture(key, pictures[0]).unwrap();
            db.save_project(&mut gallery, key, &storage).expect("Failed to save");

            let mut reloaded = Gallery::new();
            let again = db.load_project(&mut reloaded, id).unwrap().unwrap();
            assert_eq!(reloaded.pictures_of(again).unwrap().len(), 1);
            assert_eq!(stored_files(&storage, Mapping::PictureImage), 1);
        }

        it "drops a removed picture from the gallery once its row is deleted" {
            let key = gallery.insert_project(Project::new("Trip"));
            let picture = gallery.add_image_files(key, vec![jpeg("a.jpg")]).unwrap()[0];
            let id = db.save_project(&mut gallery, key, &storage).expect("Failed to save");
            let name = gallery.picture(picture).unwrap().file_name().unwrap().to_string();

            gallery.remove_picture(key, picture).unwrap();
            db.save_project(&mut gallery, key, &storage).expect("Failed to save");

            assert!(!storage.path_for(Mapping::PictureImage, &name).exists());
            assert!(matches!(gallery.picture(picture), Err(Error::UnknownPicture(_))));
            assert!(matches!(
                gallery.add_picture(key, picture),
                Err(Error::UnknownPicture(_))
            ));
            db.save_project(&mut gallery, key, &storage).expect("Failed to save");

            let mut reloaded = Gallery::new();
            let again = db.load_project(&mut reloaded, id).unwrap().unwrap();
            assert!(reloaded.pictures_of(again).unwrap().is_empty());
        }

        it "moves a picture between saved projects" {
            let (from, _) = create_test_project(&db, &mut gallery, &storage, "From");
            let (to, to_id) = create_test_project(&db, &mut gallery, &storage, "To");
            let picture = gallery.add_image_files(from, vec![jpeg("a.jpg")]).unwrap()[0];
            db.save_project(&mut gallery, from, &storage).expect("Failed to save");

            gallery.add_picture(to, picture).unwrap();
            db.save_project(&mut gallery, from, &storage).expect("Failed to save");
            db.save_project(&mut gallery, to, &storage).expect("Failed to save");

            let summaries = db.list_projects().unwrap();
            let to_summary = summaries.iter().find(|p| p.id == to_id).unwrap();
            assert_eq!(to_summary.picture_count, 1);
            let name = gallery.picture(picture).unwrap().file_name().unwrap();
            assert!(storage.path_for(Mapping::PictureImage, name).exists());
        }
    }

    describe "load_project" {
        it "returns None for a missing id" {
            assert!(db.load_project(&mut gallery, 42).expect("Query failed").is_none());
        }

        it "round-trips fields, timestamps and picture order" {
            let created = Utc::now() - Duration::days(2);
            let key = gallery.insert_project(Project::new("My Photo Trip"));
            {
                let p = gallery.project_mut(key).unwrap();
                p.set_created_at(created);
                p.set_description(Some("Alps".to_string()));
                p.attach_thumbnail(Some(ThumbnailFile::Uploaded(jpeg("cover.jpg"))));
            }
            let pictures = gallery
                .add_image_files(key, vec![jpeg("a.jpg"), jpeg("b.jpg"), jpeg("c.jpg")])
                .unwrap();
            let id = db.save_project(&mut gallery, key, &storage).expect("Failed to save");
            let expected_names: Vec<String> = pictures
                .iter()
                .map(|&k| gallery.picture(k).unwrap().file_name().unwrap().to_string())
                .collect();
            let updated_at = gallery.project(key).unwrap().updated_at();

            let mut reloaded = Gallery::new();
            let again = db.load_project(&mut reloaded, id).unwrap().unwrap();
            let project = reloaded.project(again).unwrap();

            assert_eq!(project.title(), "My Photo Trip");
            assert_eq!(project.description(), Some("Alps"));
            assert_eq!(project.created_at(), created);
            assert_eq!(project.updated_at(), updated_at);
            assert_eq!(project.slug(), "my-photo-trip");
            assert!(matches!(project.thumbnail(), Some(ThumbnailFile::Stored(_))));

            let names: Vec<String> = reloaded
                .pictures_of(again)
                .unwrap()
                .iter()
                .map(|(_, p)| p.file_name().unwrap().to_string())
                .collect();
            assert_eq!(names, expected_names);
            for (_, picture) in reloaded.pictures_of(again).unwrap() {
                assert_eq!(picture.project(), Some(again));
            }
        }

        it "does not bump updated_at when the stored thumbnail is reloaded" {
            let (_, id) = create_test_project(&db, &mut gallery, &storage, "Plain");

            let mut reloaded = Gallery::new();
            let key = db.load_project(&mut reloaded, id).unwrap().unwrap();

            assert!(reloaded.project(key).unwrap().updated_at().is_none());
        }

        it "returns the existing handle for a project already loaded" {
            let (key, id) = create_test_project(&db, &mut gallery, &storage, "Once");
            let again = db.load_project(&mut gallery, id).unwrap().unwrap();
            assert_eq!(again, key);
        }
    }

    describe "find_by_slug" {
        it "finds a project by its derived slug" {
            create_test_project(&db, &mut gallery, &storage, "Winter in Québec");

            let mut other = Gallery::new();
            let key = db
                .find_by_slug(&mut other, "winter-in-quebec")
                .unwrap()
                .expect("project should be found");
            assert_eq!(other.project(key).unwrap().title(), "Winter in Québec");
        }

        it "tells apart titles written in different scripts" {
            create_test_project(&db, &mut gallery, &storage, "Москва");
            create_test_project(&db, &mut gallery, &storage, "東京");

            let mut other = Gallery::new();
            let key = db
                .find_by_slug(&mut other, "moskva")
                .unwrap()
                .expect("project should be found");
            assert_eq!(other.project(key).unwrap().title(), "Москва");
            assert!(db.find_by_slug(&mut other, "").unwrap().is_none());
        }

        it "returns None for an unknown slug" {
            assert!(db.find_by_slug(&mut gallery, "nope").unwrap().is_none());
        }
    }

    describe "list_projects" {
        it "returns projects ordered by title with picture counts" {
            create_test_project(&db, &mut gallery, &storage, "Zebra");
            let (alpha, _) = create_test_project(&db, &mut gallery, &storage, "Alpha");
            gallery.add_image_files(alpha, vec![jpeg("a.jpg"), jpeg("b.jpg")]).unwrap();
            db.save_project(&mut gallery, alpha, &storage).unwrap();

            let projects = db.list_projects().expect("Query failed");

            assert_eq!(projects.len(), 2);
            assert_eq!(projects[0].title, "Alpha");
            assert_eq!(projects[0].picture_count, 2);
            assert_eq!(projects[1].title, "Zebra");
            assert_eq!(projects[1].picture_count, 0);
        }
    }

    describe "title_taken" {
        it "ignores the project itself" {
            let (_, id) = create_test_project(&db, &mut gallery, &storage, "Mine");

            assert!(db.title_taken("Mine", None).unwrap());
            assert!(!db.title_taken("Mine", Some(id)).unwrap());
            assert!(!db.title_taken("Other", None).unwrap());
        }
    }

    describe "delete_project" {
        it "returns false for a missing project" {
            assert!(!db.delete_project(42, &storage).expect("Query failed"));
        }

        it "deletes the project, its pictures and their files" {
            let key = gallery.insert_project(Project::new("Trip"));
            gallery
                .project_mut(key)
                .unwrap()
                .attach_thumbnail(Some(ThumbnailFile::Uploaded(jpeg("cover.jpg"))));
            gallery.add_image_files(key, vec![jpeg("a.jpg"), jpeg("b.jpg")]).unwrap();
            let id = db.save_project(&mut gallery, key, &storage).expect("Failed to save");
            let (_, keep_id) = create_test_project(&db, &mut gallery, &storage, "Keep");

            assert!(db.delete_project(id, &storage).expect("Failed to delete"));

            let mut reloaded = Gallery::new();
            assert!(db.load_project(&mut reloaded, id).unwrap().is_none());
            assert_eq!(stored_files(&storage, Mapping::PictureImage), 0);
            assert_eq!(stored_files(&storage, Mapping::ProjectImage), 0);
            assert_eq!(db.list_projects().unwrap().len(), 1);
            assert_eq!(db.list_projects().unwrap()[0].id, keep_id);
        }
    }

    describe "delete_picture" {
        it "removes one picture row and its file" {
            let key = gallery.insert_project(Project::new("Trip"));
            let pictures = gallery.add_image_files(key, vec![jpeg("a.jpg"), jpeg("b.jpg")]).unwrap();
            let id = db.save_project(&mut gallery, key, &storage).unwrap();
            let picture_id = gallery.picture(pictures[0]).unwrap().id().unwrap();

            assert!(db.delete_picture(picture_id, &storage).unwrap());
            assert!(!db.delete_picture(picture_id, &storage).unwrap());

            let mut reloaded = Gallery::new();
            let again = db.load_project(&mut reloaded, id).unwrap().unwrap();
            assert_eq!(reloaded.pictures_of(again).unwrap().len(), 1);
            assert_eq!(stored_files(&storage, Mapping::PictureImage), 1);
        }
    }

    describe "storage" {
        it "can be swapped for another FileStorage" {
            struct Rejecting;
            impl FileStorage for Rejecting {
                fn store(&self, _: Mapping, _: &UploadedFile) -> showcase::Result<String> {
                    Err(std::io::Error::other("disk full").into())
                }
                fn remove(&self, _: Mapping, _: &str) -> showcase::Result<()> {
                    Ok(())
                }
            }

            let key = gallery.insert_project(Project::new("Trip"));
            gallery.add_image_files(key, vec![jpeg("a.jpg")]).unwrap();

            let result = db.save_project(&mut gallery, key, &Rejecting);

            assert!(matches!(result, Err(Error::Storage(_))));
            assert!(db.list_projects().unwrap().is_empty());
        }
    }
}
