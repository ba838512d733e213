use std::path::PathBuf;

use anyhow::Result;

/// Where the database and uploaded files live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// SQLite database file (from SHOWCASE_DATABASE)
    pub database_path: PathBuf,
    /// Root directory for stored uploads (from SHOWCASE_UPLOAD_DIR)
    pub upload_dir: PathBuf,
}

impl Config {
    /// Load from environment variables, falling back to the platform data
    /// directory.
    pub fn from_env() -> Result<Self> {
        let database_path = std::env::var_os("SHOWCASE_DATABASE").map(PathBuf::from);
        let upload_dir = std::env::var_os("SHOWCASE_UPLOAD_DIR").map(PathBuf::from);

        let (database_path, upload_dir) = match (database_path, upload_dir) {
            (Some(db), Some(uploads)) => (db, uploads),
            (db, uploads) => {
                let data_dir = Self::data_dir()?;
                (
                    db.unwrap_or_else(|| data_dir.join("showcase.db")),
                    uploads.unwrap_or_else(|| data_dir.join("uploads")),
                )
            }
        };

        Ok(Self {
            database_path,
            upload_dir,
        })
    }

    /// Keep everything under one directory (for tests and scripted use).
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            database_path: dir.join("showcase.db"),
            upload_dir: dir.join("uploads"),
        }
    }

    fn data_dir() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "showcase")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_dir_keeps_everything_together() {
        let config = Config::in_dir("/tmp/showcase-test");
        assert_eq!(
            config.database_path,
            PathBuf::from("/tmp/showcase-test/showcase.db")
        );
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/showcase-test/uploads"));
    }
}
