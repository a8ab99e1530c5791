//! Service Usage API v1

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiState {
    #[default]
    StateUnspecified,
    Disabled,
    Enabled,
}

/// Enablement state of one API on a project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagedApi {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub state: ApiState,
}
