//! Configuration directory layout

use std::path::PathBuf;

use crate::filesys::file::File;

/// Overrides the configuration directory
pub const CONFIG_DIR_ENV: &str = "RUNDEPLOY_CONFIG_DIR";

/// Storage layout for rundeploy
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all configuration
    pub base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Self::new(dir);
        }

        let base_dir = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME")
                    .or_else(|| std::env::var_os("USERPROFILE"))
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rundeploy");

        Self::new(base_dir)
    }
}
