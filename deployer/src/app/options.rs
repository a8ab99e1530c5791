//! Deployer configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::deploy::artifacts::ArtifactOptions;
use crate::deploy::build::BuildOptions;
use crate::deploy::service::ServiceOptions;
use crate::preflight::PreflightOptions;
use crate::retry::RetryOptions;
use crate::source::PackagerOptions;
use crate::storage::settings::Settings;

/// Options of every deployment stage
#[derive(Debug, Clone, Default)]
pub struct DeployerOptions {
    /// Permission-error retry schedule
    pub retry: RetryOptions,

    /// API and billing preflight
    pub preflight: PreflightOptions,

    /// Source packaging
    pub packager: PackagerOptions,

    /// Upload bucket and image repository
    pub artifacts: ArtifactOptions,

    /// Remote builds
    pub build: BuildOptions,

    /// Service create or update
    pub service: ServiceOptions,
}

impl DeployerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let tuning = &settings.tuning;
        let operation_poll_interval = Duration::from_secs(tuning.operation_poll_interval_secs);

        Self {
            retry: RetryOptions {
                max_retries: tuning.max_retries,
                first_delay: Duration::from_secs(tuning.first_retry_delay_secs),
                ..Default::default()
            },
            preflight: PreflightOptions {
                operation_poll_interval,
                ..Default::default()
            },
            packager: PackagerOptions {
                mount_root: PathBuf::from(&tuning.mount_root),
                max_archive_bytes: tuning.max_archive_bytes,
                install_dependencies: tuning.install_dependencies,
                ..Default::default()
            },
            artifacts: ArtifactOptions {
                operation_poll_interval,
                ..Default::default()
            },
            build: BuildOptions {
                poll_interval: Duration::from_secs(tuning.build_poll_interval_secs),
                log_propagation_delay: Duration::from_secs(tuning.build_log_delay_secs),
                log_lines: tuning.build_log_lines,
            },
            service: ServiceOptions {
                operation_poll_interval,
            },
        }
    }

    /// No waiting anywhere; for tests against in-memory clients
    pub fn immediate() -> Self {
        Self {
            retry: RetryOptions::immediate(),
            preflight: PreflightOptions {
                api_retry_delay: Duration::ZERO,
                operation_poll_interval: Duration::ZERO,
            },
            packager: PackagerOptions {
                install_dependencies: false,
                ..Default::default()
            },
            artifacts: ArtifactOptions {
                operation_poll_interval: Duration::ZERO,
                ..Default::default()
            },
            build: BuildOptions {
                poll_interval: Duration::ZERO,
                log_propagation_delay: Duration::ZERO,
                ..Default::default()
            },
            service: ServiceOptions {
                operation_poll_interval: Duration::ZERO,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_settings_defaults() {
        let options = DeployerOptions::from_settings(&Settings::default());
        let defaults = DeployerOptions::default();
        assert_eq!(options.retry.max_retries, defaults.retry.max_retries);
        assert_eq!(options.retry.first_delay, defaults.retry.first_delay);
        assert_eq!(options.build.poll_interval, defaults.build.poll_interval);
        assert_eq!(options.build.log_lines, 50);
        assert_eq!(
            options.packager.max_archive_bytes,
            defaults.packager.max_archive_bytes
        );
        assert_eq!(options.artifacts.repository_id, "cloud-run-source-deploy");
    }
}
