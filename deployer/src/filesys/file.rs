//! File operations

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::fs;

use crate::errors::DeployError;

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    pub async fn read_string(&self) -> Result<String, DeployError> {
        Ok(fs::read_to_string(&self.path).await?)
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, DeployError> {
        let contents = self.read_string().await?;
        serde_json::from_str(&contents).map_err(|e| {
            DeployError::Config(format!("{}: {}", self.path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_json() {
        let dir = tempfile::tempdir().unwrap();
        let file = File::new(dir.path().join("value.json"));
        assert!(!file.exists().await);

        std::fs::write(file.path(), r#"{"a": 1}"#).unwrap();
        let value: serde_json::Value = file.read_json().await.unwrap();
        assert_eq!(value["a"], 1);

        std::fs::write(file.path(), "{broken").unwrap();
        let err = file.read_json::<serde_json::Value>().await.unwrap_err();
        assert!(matches!(err, DeployError::Config(_)));
    }
}
