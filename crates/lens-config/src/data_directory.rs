//! Data directory management for metrics-lens
//!
//! ```text
//! .metrics-lens/
//! ├── logs/
//! │   ├── lens.log
//! │   ├── lens.log.1.gz
//! ├── settings.json
//! ```

use crate::errors::{ConfigError, Result};
use std::path::{Path, PathBuf};

const LENS_DATA_DIR_NAME: &str = ".metrics-lens";
const LENS_LOGS_DIR_NAME: &str = "logs";
const LENS_LOG_FILE_NAME: &str = "lens.log";
const LENS_SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone)]
pub struct DataDirectory {
    pub root_path: PathBuf,
    pub logs_dir: PathBuf,
    pub settings_path: PathBuf,
}

impl DataDirectory {
    pub fn new_system_default() -> Result<Self> {
        let root_path = Self::get_system_data_directory()?;
        Self::new(root_path)
    }

    pub fn new(root_path: PathBuf) -> Result<Self> {
        let logs_dir = root_path.join(LENS_LOGS_DIR_NAME);
        let settings_path = root_path.join(LENS_SETTINGS_FILE_NAME);
        let data_dir = Self {
            root_path,
            logs_dir,
            settings_path,
        };
        data_dir.ensure_directory_structure()?;
        Ok(data_dir)
    }

    pub fn get_system_data_directory() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(LENS_DATA_DIR_NAME))
            .ok_or(ConfigError::SystemDataDirectoryNotFound)
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.logs_dir.join(LENS_LOG_FILE_NAME)
    }

    pub fn ensure_directory_structure(&self) -> Result<()> {
        for dir in [&self.root_path, &self.logs_dir] {
            Self::create_dir(dir)?;
        }
        Ok(())
    }

    fn create_dir(path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(path).map_err(|_| ConfigError::DataDirectoryCreationFailed {
            path: path.to_path_buf(),
        })?;
        log::debug!("Created directory: {}", path.display());
        Ok(())
    }
}
