use analysis::{CommitPolicy, ToolVersion};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::data_directory::DataDirectory;
use crate::errors::{ConfigError, Result};

pub const DEFAULT_RADON_PATH: &str = "radon";
pub const DEFAULT_MINIMUM_VERSION: &str = "5.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensSettings {
    /// Read at render time; analysis keeps running while annotations are hidden.
    pub annotations_enabled: bool,
    pub radon_path: String,
    pub minimum_version: String,
    pub commit_policy: CommitPolicy,
    pub timeout_secs: Option<u64>,
}

impl LensSettings {
    pub fn new() -> Self {
        Self {
            annotations_enabled: true,
            radon_path: DEFAULT_RADON_PATH.to_string(),
            minimum_version: DEFAULT_MINIMUM_VERSION.to_string(),
            commit_policy: CommitPolicy::default(),
            timeout_secs: None,
        }
    }

    pub fn minimum_version(&self) -> Result<ToolVersion> {
        self.minimum_version
            .parse()
            .map_err(|e: analysis::ClientError| ConfigError::InvalidSetting {
                field: "minimum_version",
                reason: e.to_string(),
            })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for LensSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads settings from `path`, falling back to defaults when the file is
/// missing or unreadable.
pub fn read_settings(path: &Path) -> LensSettings {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(
                "Could not read settings from {}: {}. Using default settings.",
                path.display(),
                e
            );
            return LensSettings::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(settings) => settings,
        Err(e) => {
            warn!(
                "Could not parse settings from {}: {}. Using default settings.",
                path.display(),
                e
            );
            LensSettings::default()
        }
    }
}

/// Reads the settings file of `data_directory`, writing the defaults first
/// if it does not exist yet.
pub fn get_or_create_settings(data_directory: &DataDirectory) -> LensSettings {
    let settings_path = &data_directory.settings_path;

    if !settings_path.exists() {
        let settings = LensSettings::default();
        match settings.save(settings_path) {
            Ok(()) => info!("Created new settings file at {}.", settings_path.display()),
            Err(e) => warn!("Could not save default settings: {}.", e),
        }
        return settings;
    }

    read_settings(settings_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn data_directory() -> (DataDirectory, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let data_directory = DataDirectory::new(temp_dir.path().to_path_buf()).unwrap();
        (data_directory, temp_dir)
    }

    #[test]
    fn test_default_settings() {
        let settings = LensSettings::default();
        assert!(settings.annotations_enabled);
        assert_eq!(settings.radon_path, "radon");
        assert_eq!(settings.minimum_version().unwrap(), ToolVersion::new(5, 1));
        assert_eq!(settings.commit_policy, CommitPolicy::LastWriterWins);
        assert_eq!(settings.timeout(), None);
    }

    #[test]
    fn test_get_or_create_writes_defaults() {
        let (data_directory, _temp_dir) = data_directory();
        assert!(!data_directory.settings_path.exists());

        let settings = get_or_create_settings(&data_directory);

        assert_eq!(settings, LensSettings::default());
        assert!(data_directory.settings_path.exists());
        assert_eq!(read_settings(&data_directory.settings_path), settings);
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_missing_fields() {
        let (data_directory, _temp_dir) = data_directory();
        fs::write(
            &data_directory.settings_path,
            r#"{"annotations_enabled": false, "commit_policy": "discard_superseded", "timeout_secs": 30}"#,
        )
        .unwrap();

        let settings = get_or_create_settings(&data_directory);

        assert!(!settings.annotations_enabled);
        assert_eq!(settings.commit_policy, CommitPolicy::DiscardSuperseded);
        assert_eq!(settings.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.radon_path, DEFAULT_RADON_PATH);
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let (data_directory, _temp_dir) = data_directory();
        fs::write(&data_directory.settings_path, "{ not json").unwrap();

        assert_eq!(
            read_settings(&data_directory.settings_path),
            LensSettings::default()
        );
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let (data_directory, _temp_dir) = data_directory();
        assert_eq!(
            read_settings(&data_directory.root_path.join("absent.json")),
            LensSettings::default()
        );
    }

    #[test]
    fn test_invalid_minimum_version() {
        let settings = LensSettings {
            minimum_version: "five".to_string(),
            ..Default::default()
        };

        match settings.minimum_version() {
            Err(ConfigError::InvalidSetting { field, .. }) => assert_eq!(field, "minimum_version"),
            other => panic!("expected an invalid setting, got {other:?}"),
        }
    }
}
