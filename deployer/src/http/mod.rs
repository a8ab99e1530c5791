//! REST implementations of the client seams

pub mod artifact_registry;
pub mod billing;
pub mod builds;
pub mod client;
pub mod logging;
pub mod registry;
pub mod run;
pub mod service_usage;
pub mod storage;

use serde::{Deserialize, Serialize};

/// Base URLs of the remote services
///
/// Overridable from settings to point at emulators or private endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub run: String,
    pub cloud_build: String,
    pub billing: String,
    pub service_usage: String,
    pub storage: String,
    pub artifact_registry: String,
    pub logging: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            run: "https://run.googleapis.com/v2".to_string(),
            cloud_build: "https://cloudbuild.googleapis.com/v1".to_string(),
            billing: "https://cloudbilling.googleapis.com/v1".to_string(),
            service_usage: "https://serviceusage.googleapis.com/v1".to_string(),
            storage: "https://storage.googleapis.com".to_string(),
            artifact_registry: "https://artifactregistry.googleapis.com/v1".to_string(),
            logging: "https://logging.googleapis.com/v2".to_string(),
        }
    }
}

/// Percent-encode a single query value or path segment
pub(crate) fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
