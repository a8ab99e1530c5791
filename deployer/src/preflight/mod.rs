//! API & billing preflight
//!
//! Leaves a project in a deployable state: bootstrap APIs enabled, billing
//! attached, required APIs enabled. This is the only place that mutates API
//! enablement or billing attachment, and it never disables anything.

pub mod apis;
pub mod billing;

use std::time::Duration;

use tracing::info;

use crate::api::CloudClients;
use crate::errors::DeployError;
use crate::preflight::apis::{ensure_api_enabled, BOOTSTRAP_APIS};
use crate::preflight::billing::ensure_billing;
use crate::progress::Progress;
use crate::retry::{retry_on_permission_denied, RetryOptions};

/// Preflight options
#[derive(Debug, Clone)]
pub struct PreflightOptions {
    /// Wait before the single retry of a failed API enablement
    pub api_retry_delay: Duration,

    /// Interval between polls of an enablement operation
    pub operation_poll_interval: Duration,
}

impl Default for PreflightOptions {
    fn default() -> Self {
        Self {
            api_retry_delay: Duration::from_secs(1),
            operation_poll_interval: Duration::from_secs(2),
        }
    }
}

/// Ensure `project_id` can take a deployment needing `required_apis`
pub async fn ensure_preflight(
    clients: &CloudClients,
    project_id: &str,
    required_apis: &[&str],
    options: &PreflightOptions,
    retry: &RetryOptions,
    progress: &Progress<'_>,
) -> Result<(), DeployError> {
    progress.info(format!("Checking APIs and billing for project {}...", project_id));

    // Billing status cannot be read before the billing API itself is enabled
    for api in BOOTSTRAP_APIS {
        enable_with_retry(clients, project_id, api, options, retry, progress)
            .await
            .map_err(|e| DeployError::Preflight(format!("Failed to enable {}: {}", api, e)))?;
    }

    ensure_billing(clients, project_id, retry, progress).await?;

    for api in required_apis
        .iter()
        .copied()
        .filter(|api| !BOOTSTRAP_APIS.contains(api))
    {
        if let Err(first) = enable_with_retry(clients, project_id, api, options, retry, progress).await {
            progress.warn(format!(
                "Enabling {} failed ({}), retrying in {:?}...",
                api, first, options.api_retry_delay
            ));
            tokio::time::sleep(options.api_retry_delay).await;
            enable_with_retry(clients, project_id, api, options, retry, progress)
                .await
                .map_err(|e| {
                    DeployError::Preflight(format!("Failed to enable required API {}: {}", api, e))
                })?;
        }
    }

    info!("Preflight complete for project {}", project_id);
    Ok(())
}

async fn enable_with_retry(
    clients: &CloudClients,
    project_id: &str,
    api: &str,
    options: &PreflightOptions,
    retry: &RetryOptions,
    progress: &Progress<'_>,
) -> Result<(), DeployError> {
    retry_on_permission_denied(&format!("enable {}", api), retry, || {
        ensure_api_enabled(clients, project_id, api, options, progress)
    })
    .await
}
