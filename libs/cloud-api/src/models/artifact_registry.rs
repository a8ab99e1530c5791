//! Artifact Registry API v1

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// `DOCKER`, `NPM`, ...
    pub format: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
