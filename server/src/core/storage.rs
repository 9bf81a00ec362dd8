//! Local data directory
//!
//! Only the SQLite backend writes here. The directory comes from
//! `REVIEWHUB_DATA_DIR`, else the platform data dir
//! (`$XDG_DATA_HOME/reviewhub/`, `~/Library/Application Support/ReviewHub/`,
//! `%APPDATA%\ReviewHub\`), else `./.reviewhub`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;

use super::constants::{APP_DOT_FOLDER, APP_NAME, ENV_DATA_DIR, SQLITE_DB_FILENAME};
use crate::utils::file::expand_path;

const SQLITE_SUBDIR: &str = "sqlite";

#[derive(Debug, Clone)]
pub struct AppStorage {
    data_dir: PathBuf,
}

impl AppStorage {
    /// Open the configured data directory
    pub async fn init() -> Result<Self> {
        Self::open(default_data_dir()).await
    }

    /// Create `data_dir` and its sqlite subdirectory if missing
    pub async fn open(data_dir: PathBuf) -> Result<Self> {
        let sqlite_dir = data_dir.join(SQLITE_SUBDIR);
        tokio::fs::create_dir_all(&sqlite_dir)
            .await
            .with_context(|| format!("Failed to create data directory: {}", sqlite_dir.display()))?;

        let data_dir = data_dir.canonicalize().unwrap_or(data_dir);
        tracing::debug!(data_dir = %data_dir.display(), "Storage initialized");
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `<data dir>/sqlite/reviewhub.db`
    pub fn sqlite_db_path(&self) -> PathBuf {
        self.data_dir.join(SQLITE_SUBDIR).join(SQLITE_DB_FILENAME)
    }
}

fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        return expand_path(&dir);
    }
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(APP_DOT_FOLDER)
        })
}
