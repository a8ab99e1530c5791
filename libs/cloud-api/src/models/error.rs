//! Google REST error envelope

use serde::{Deserialize, Serialize};

/// Body of a non-2xx response: `{"error": {...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    /// HTTP status code
    #[serde(default)]
    pub code: u16,

    #[serde(default)]
    pub message: String,

    /// Canonical code name, e.g. `PERMISSION_DENIED`
    #[serde(default)]
    pub status: String,
}
