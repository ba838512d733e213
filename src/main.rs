use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use showcase::config::Config;
use showcase::db::Database;
use showcase::models::{Gallery, Project, ProjectKey, ThumbnailFile, UploadedFile};
use showcase::storage::LocalFileStorage;
use showcase::validation::{self, Violations};
use showcase::Error;

#[derive(Parser)]
#[command(name = "showcase")]
#[command(about = "Manage portfolio projects and their pictures")]
struct Cli {
    /// SQLite database file (overrides SHOWCASE_DATABASE)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Directory for stored uploads (overrides SHOWCASE_UPLOAD_DIR)
    #[arg(long, global = true)]
    uploads: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// List projects ordered by title
    List,
    /// Create a project
    Create {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Show a project and its pictures as JSON
    Show {
        /// Project id or slug
        project: String,
    },
    /// Change a project's title or description
    Update {
        id: i64,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Upload a new thumbnail
    Thumbnail { id: i64, path: PathBuf },
    /// Upload pictures into a project
    AddPictures {
        id: i64,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Detach a picture from its project, deleting it
    RemovePicture { id: i64, picture_id: i64 },
    /// Delete a project and all its pictures
    Delete { id: i64 },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "showcase=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = Config::from_env()?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    if let Some(uploads) = cli.uploads {
        config.upload_dir = uploads;
    }

    let db = Database::open(config.database_path.clone())?;
    db.migrate()?;
    let storage = LocalFileStorage::new(&config.upload_dir);
    let mut gallery = Gallery::new();

    match cli.command {
        Commands::Migrate => {
            println!("Database ready at {}", config.database_path.display());
        }
        Commands::List => {
            for p in db.list_projects()? {
                println!(
                    "{:>5}  {:<40}  {:>3} pictures  {}",
                    p.id, p.title, p.picture_count, p.slug
                );
            }
        }
        Commands::Create { title, description } => {
            let mut project = Project::new(title);
            project.set_description(description);
            let key = gallery.insert_project(project);
            let id = save(&db, &mut gallery, key, &storage)?;
            println!("Created project {} ({})", id, gallery.project(key)?.slug());
        }
        Commands::Show { project } => {
            let key = match project.parse::<i64>() {
                Ok(id) => db.load_project(&mut gallery, id)?,
                Err(_) => db.find_by_slug(&mut gallery, &project)?,
            }
            .with_context(|| format!("No project matches '{}'", project))?;
            println!("{}", serde_json::to_string_pretty(&gallery.view(key)?)?);
        }
        Commands::Update {
            id,
            title,
            description,
        } => {
            let key = load(&db, &mut gallery, id)?;
            let project = gallery.project_mut(key)?;
            if let Some(title) = title {
                project.set_title(title);
            }
            if description.is_some() {
                project.set_description(description);
            }
            save(&db, &mut gallery, key, &storage)?;
            println!("Updated project {}", id);
        }
        Commands::Thumbnail { id, path } => {
            let key = load(&db, &mut gallery, id)?;
            let file = UploadedFile::from_path(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            gallery
                .project_mut(key)?
                .attach_thumbnail(Some(ThumbnailFile::Uploaded(file)));
            save(&db, &mut gallery, key, &storage)?;
            println!("Updated thumbnail of project {}", id);
        }
        Commands::AddPictures { id, paths } => {
            let key = load(&db, &mut gallery, id)?;
            let files = paths
                .iter()
                .map(|path| {
                    UploadedFile::from_path(path)
                        .with_context(|| format!("Failed to read {}", path.display()))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let added = gallery.add_image_files(key, files)?;
            save(&db, &mut gallery, key, &storage)?;
            println!("Added {} pictures to project {}", added.len(), id);
        }
        Commands::RemovePicture { id, picture_id } => {
            let key = load(&db, &mut gallery, id)?;
            let picture = gallery
                .pictures_of(key)?
                .into_iter()
                .find(|(_, p)| p.id() == Some(picture_id))
                .map(|(k, _)| k)
                .with_context(|| format!("Project {} has no picture {}", id, picture_id))?;
            gallery.remove_picture(key, picture)?;
            save(&db, &mut gallery, key, &storage)?;
            println!("Removed picture {} from project {}", picture_id, id);
        }
        Commands::Delete { id } => {
            if db.delete_project(id, &storage)? {
                println!("Deleted project {}", id);
            } else {
                anyhow::bail!("Project {} not found", id);
            }
        }
    }

    Ok(())
}

fn load(db: &Database, gallery: &mut Gallery, id: i64) -> anyhow::Result<ProjectKey> {
    db.load_project(gallery, id)?
        .with_context(|| format!("Project {} not found", id))
}

/// Validate, then persist. Violations are reported instead of saving.
fn save(
    db: &Database,
    gallery: &mut Gallery,
    key: ProjectKey,
    storage: &LocalFileStorage,
) -> anyhow::Result<i64> {
    let result = validation::validate_project(gallery, key)
        .and_then(|()| db.save_project(gallery, key, storage));

    match result {
        Ok(id) => Ok(id),
        Err(e @ (Error::Invalid(_) | Error::DuplicateTitle(_))) => {
            anyhow::bail!("Project not saved: {}", Violations::from(e))
        }
        Err(e) => Err(e.into()),
    }
}
