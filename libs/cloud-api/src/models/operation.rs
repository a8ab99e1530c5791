//! Long-running operation envelope shared by Run, Service Usage and Artifact Registry

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// `google.longrunning.Operation`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,

    #[serde(default)]
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Status>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

impl Operation {
    /// Decode the operation response, if the operation carried one
    pub fn response_as<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        match &self.response {
            Some(value) => serde_json::from_value(value.clone()).map(Some),
            None => Ok(None),
        }
    }
}

/// `google.rpc.Status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,

    #[serde(default)]
    pub message: String,
}
