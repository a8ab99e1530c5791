//! Cloud Logging API v2

use serde::{Deserialize, Serialize};

/// `entries:list` request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLogEntriesRequest {
    pub resource_names: Vec<String>,
    pub filter: String,
    pub order_by: String,
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListLogEntriesResponse {
    #[serde(default)]
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: Option<String>,

    #[serde(default)]
    pub text_payload: Option<String>,

    #[serde(default)]
    pub json_payload: Option<serde_json::Value>,
}

impl LogEntry {
    /// Printable line for this entry, if it has one
    pub fn line(&self) -> Option<String> {
        if let Some(text) = &self.text_payload {
            return Some(text.clone());
        }
        self.json_payload
            .as_ref()
            .and_then(|payload| payload.get("message"))
            .and_then(|message| message.as_str())
            .map(str::to_string)
    }
}
