//! Cloud Storage JSON API v1

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageObject {
    pub name: String,

    #[serde(default)]
    pub bucket: String,

    /// Int64 rendered as a string
    #[serde(default)]
    pub generation: Option<String>,

    #[serde(default)]
    pub size: Option<String>,
}
