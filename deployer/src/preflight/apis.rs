//! Required API sets and enablement

use cloud_api::service_usage::ApiState;

use crate::api::operation::await_operation;
use crate::api::CloudClients;
use crate::errors::DeployError;
use crate::preflight::PreflightOptions;
use crate::progress::Progress;
use crate::retry::RetryOptions;

pub const SERVICE_USAGE_API: &str = "serviceusage.googleapis.com";
pub const BILLING_API: &str = "cloudbilling.googleapis.com";
pub const RUN_API: &str = "run.googleapis.com";
pub const CLOUD_BUILD_API: &str = "cloudbuild.googleapis.com";
pub const ARTIFACT_REGISTRY_API: &str = "artifactregistry.googleapis.com";
pub const STORAGE_API: &str = "storage.googleapis.com";
pub const IAM_API: &str = "iam.googleapis.com";

/// Enabled before anything else, in this order
pub const BOOTSTRAP_APIS: [&str; 2] = [SERVICE_USAGE_API, BILLING_API];

/// APIs a source deployment touches
pub const SOURCE_DEPLOY_APIS: &[&str] = &[
    SERVICE_USAGE_API,
    BILLING_API,
    RUN_API,
    CLOUD_BUILD_API,
    ARTIFACT_REGISTRY_API,
    STORAGE_API,
    IAM_API,
];

/// APIs an image deployment touches
pub const IMAGE_DEPLOY_APIS: &[&str] = &[SERVICE_USAGE_API, BILLING_API, RUN_API];

/// Get the API state; enable it and wait for the operation when not enabled
///
/// Makes no retries of its own. Callers wrap the whole step.
pub async fn ensure_api_enabled(
    clients: &CloudClients,
    project_id: &str,
    api: &str,
    options: &PreflightOptions,
    progress: &Progress<'_>,
) -> Result<(), DeployError> {
    let state = clients.service_usage.get_api(project_id, api).await?;
    if state.state == ApiState::Enabled {
        progress.debug(format!("API {} already enabled", api));
        return Ok(());
    }

    progress.info(format!("Enabling API {}...", api));
    let op = clients.service_usage.enable_api(project_id, api).await?;
    await_operation(
        &format!("enable {}", api),
        op,
        options.operation_poll_interval,
        &RetryOptions::none(),
        |name| async move { clients.service_usage.get_operation(&name).await },
    )
    .await?;
    progress.info(format!("API {} enabled", api));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_apis_are_a_strict_subset_of_source_apis() {
        assert!(IMAGE_DEPLOY_APIS.len() < SOURCE_DEPLOY_APIS.len());
        for api in IMAGE_DEPLOY_APIS {
            assert!(SOURCE_DEPLOY_APIS.contains(api));
        }
        for api in BOOTSTRAP_APIS {
            assert!(IMAGE_DEPLOY_APIS.contains(&api));
        }
    }
}
