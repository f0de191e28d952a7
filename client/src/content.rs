use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::ClientResult;

pub const LOG_FILENAME: &str = "log";
pub const CONTENT_DIR_NAME: &str = "content";

/// Paths the app reads and writes: the log file, downloaded content and the
/// local config. Everything lives under the platform data / cache dirs, with
/// a working-directory fallback when no HOME is available.
#[derive(Debug, Clone)]
pub struct ContentStore {
    log_file: PathBuf,
    content_dir: PathBuf,
    config_file: PathBuf,
}

impl Default for ContentStore {
    fn default() -> Self {
        let (log_file, content_dir, config_dir) =
            match directories_next::ProjectDirs::from("org", "colloquy", "colloquy") {
                Some(app_dirs) => (
                    app_dirs.data_dir().join(LOG_FILENAME),
                    app_dirs.cache_dir().join(CONTENT_DIR_NAME),
                    app_dirs.config_dir().to_path_buf(),
                ),
                // Fallback to current working directory if no HOME is present
                None => (LOG_FILENAME.into(), CONTENT_DIR_NAME.into(), PathBuf::from(".")),
            };

        Self {
            log_file,
            content_dir,
            config_file: config_dir.join("config.json"),
        }
    }
}

impl ContentStore {
    pub fn create_req_dirs(&self) -> ClientResult<()> {
        use std::fs::create_dir_all;

        create_dir_all(self.content_dir())?;
        create_dir_all(self.log_file().parent().unwrap_or_else(|| Path::new(".")))?;
        create_dir_all(self.config_file().parent().unwrap_or_else(|| Path::new(".")))?;

        Ok(())
    }

    pub fn read_config<T: DeserializeOwned>(&self) -> Option<T> {
        let raw = std::fs::read(self.config_file()).ok()?;
        serde_json::from_slice(&raw).ok()
    }

    pub fn write_config<T: Serialize>(&self, config: &T) -> ClientResult<()> {
        let serialized = serde_json::to_vec_pretty(config)?;
        std::fs::write(self.config_file(), serialized)?;
        Ok(())
    }

    pub fn log_file(&self) -> &Path {
        self.log_file.as_path()
    }

    pub fn content_dir(&self) -> &Path {
        self.content_dir.as_path()
    }

    pub fn config_file(&self) -> &Path {
        self.config_file.as_path()
    }
}
