//! Small helpers shared across modules

use serde::{Deserialize, Serialize};

/// Reported by `--version`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Lowercase hex SHA-256 digest
pub fn sha256_hash(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    Sha256::digest(data).iter().fold(String::with_capacity(64), |mut out, byte| {
        out.push_str(&format!("{:02x}", byte));
        out
    })
}

/// Revision label value derived from the current time, unique per deployment
///
/// Label values are limited to lowercase letters, digits, `-` and `_`.
pub fn revision_label(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("rev-{}", now.format("%Y%m%d-%H%M%S-%3f"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sha256_hash() {
        let hash = sha256_hash(b"hello world");
        assert_eq!(hash.len(), 64);
        assert!(hash.starts_with("b94d27b9"));
    }

    #[test]
    fn test_revision_label_is_label_safe() {
        let now = chrono::Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let label = revision_label(now);
        assert_eq!(label, "rev-20260304-050607-000");
        assert!(label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'));
    }
}
