//! Cloud Build API v1

use serde::{Deserialize, Serialize};

/// Build status as reported by Cloud Build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    #[default]
    StatusUnknown,
    Pending,
    Queued,
    Working,
    Success,
    Failure,
    InternalError,
    Timeout,
    Cancelled,
    Expired,
    #[serde(other)]
    Unrecognized,
}

impl BuildStatus {
    /// Whether the remote build service will no longer change this status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildStatus::Success
                | BuildStatus::Failure
                | BuildStatus::InternalError
                | BuildStatus::Timeout
                | BuildStatus::Cancelled
                | BuildStatus::Expired
        )
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BuildStatus::StatusUnknown => "STATUS_UNKNOWN",
            BuildStatus::Pending => "PENDING",
            BuildStatus::Queued => "QUEUED",
            BuildStatus::Working => "WORKING",
            BuildStatus::Success => "SUCCESS",
            BuildStatus::Failure => "FAILURE",
            BuildStatus::InternalError => "INTERNAL_ERROR",
            BuildStatus::Timeout => "TIMEOUT",
            BuildStatus::Cancelled => "CANCELLED",
            BuildStatus::Expired => "EXPIRED",
            BuildStatus::Unrecognized => "UNRECOGNIZED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub status: BuildStatus,

    #[serde(default)]
    pub results: Option<BuildResults>,

    #[serde(default)]
    pub log_url: Option<String>,
}

impl Build {
    /// Name of the first image pushed by the build
    pub fn first_image(&self) -> Option<&str> {
        self.results
            .as_ref()
            .and_then(|r| r.images.first())
            .map(|image| image.name.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildResults {
    #[serde(default)]
    pub images: Vec<BuiltImage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuiltImage {
    pub name: String,

    #[serde(default)]
    pub digest: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        let build: Build = serde_json::from_str(r#"{"id":"abc","status":"INTERNAL_ERROR"}"#).unwrap();
        assert_eq!(build.status, BuildStatus::InternalError);
        assert!(build.status.is_terminal());

        let build: Build = serde_json::from_str(r#"{"id":"abc","status":"SOMETHING_NEW"}"#).unwrap();
        assert_eq!(build.status, BuildStatus::Unrecognized);
        assert!(!build.status.is_terminal());
    }
}
