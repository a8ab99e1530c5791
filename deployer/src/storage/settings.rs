//! Settings file management

use serde::{Deserialize, Serialize};

use crate::http::Endpoints;
use crate::logs::LogLevel;
use crate::models::DEFAULT_REGION;

/// rundeploy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub json_logs: bool,

    /// Region used when a deployment names none
    #[serde(default = "default_region")]
    pub default_region: String,

    /// gcloud account to take access tokens from
    #[serde(default)]
    pub account: Option<String>,

    /// Remote service base URLs
    #[serde(default)]
    pub endpoints: Endpoints,

    /// Timing and limits
    #[serde(default)]
    pub tuning: TuningSettings,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            default_region: default_region(),
            account: None,
            endpoints: Endpoints::default(),
            tuning: TuningSettings::default(),
        }
    }
}

/// Polling intervals, retry budget and packaging limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningSettings {
    /// Permission-error retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait before the first permission-error retry
    #[serde(default = "default_first_retry_delay")]
    pub first_retry_delay_secs: u64,

    /// Build status polling interval
    #[serde(default = "default_build_poll_interval")]
    pub build_poll_interval_secs: u64,

    /// Long-running operation polling interval
    #[serde(default = "default_operation_poll_interval")]
    pub operation_poll_interval_secs: u64,

    /// Wait before reading the logs of a failed build
    #[serde(default = "default_log_delay")]
    pub build_log_delay_secs: u64,

    /// Log lines quoted from a failed build
    #[serde(default = "default_log_lines")]
    pub build_log_lines: u32,

    /// Largest direct-source archive
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,

    /// Vendor dependencies before a direct-source upload
    #[serde(default = "default_true")]
    pub install_dependencies: bool,

    /// Mount point of foreign drive letters
    #[serde(default = "default_mount_root")]
    pub mount_root: String,
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    7
}

fn default_first_retry_delay() -> u64 {
    15
}

fn default_build_poll_interval() -> u64 {
    5
}

fn default_operation_poll_interval() -> u64 {
    2
}

fn default_log_delay() -> u64 {
    10
}

fn default_log_lines() -> u32 {
    50
}

fn default_max_archive_bytes() -> u64 {
    250 * 1024 * 1024
}

fn default_mount_root() -> String {
    "/mnt".to_string()
}

impl Default for TuningSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            first_retry_delay_secs: default_first_retry_delay(),
            build_poll_interval_secs: default_build_poll_interval(),
            operation_poll_interval_secs: default_operation_poll_interval(),
            build_log_delay_secs: default_log_delay(),
            build_log_lines: default_log_lines(),
            max_archive_bytes: default_max_archive_bytes(),
            install_dependencies: true,
            mount_root: default_mount_root(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: Settings = serde_json::from_str(
            r#"{"log_level": "debug", "tuning": {"build_log_lines": 20}}"#,
        )
        .unwrap();
        assert_eq!(settings.log_level, LogLevel::Debug);
        assert_eq!(settings.default_region, DEFAULT_REGION);
        assert_eq!(settings.tuning.build_log_lines, 20);
        assert_eq!(settings.tuning.max_retries, 7);
        assert!(settings.tuning.install_dependencies);
        assert_eq!(settings.endpoints, Endpoints::default());
    }
}
