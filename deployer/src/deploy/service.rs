//! Service deployer
//!
//! One existence check decides between create and update. The intended
//! mutation is validated with a dry run before the real call is made.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use cloud_api::operation::Operation;
use cloud_api::run::{Container, RevisionTemplate, Service};
use regex::Regex;
use tracing::{debug, info};

use crate::api::operation::await_operation;
use crate::api::paths::{location_path, service_path};
use crate::api::RunApi;
use crate::deploy::fsm::{ServiceEvent, ServiceFsm};
use crate::errors::{ApiError, DeployError, RpcCode};
use crate::models::DeploymentPath;
use crate::progress::Progress;
use crate::retry::{retry_on_permission_denied, RetryOptions};

pub const MANAGED_BY_LABEL: &str = "managed-by";
pub const MANAGED_BY_VALUE: &str = "rundeploy";
pub const PATH_LABEL: &str = "rundeploy-path";
pub const REVISION_LABEL: &str = "rundeploy-revision";

/// Messages of dry-run rejections caused by an organization IAM policy
static INVOKER_POLICY_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(allowedPolicyMemberDomains|policy violation|constraints/iam\.|allUsers|invokerIamDisabled|invoker_iam_disabled|permission to disable invoker)",
    )
    .expect("valid invoker policy pattern")
});

/// Service deployer options
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Interval between polls of a create or update operation
    pub operation_poll_interval: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            operation_poll_interval: Duration::from_secs(2),
        }
    }
}

/// A revision to roll out
#[derive(Debug, Clone)]
pub struct RevisionRequest {
    pub service_id: String,
    pub container: Container,
    pub skip_invoker_check: bool,
    pub path: DeploymentPath,
    pub revision_label: String,
}

/// Whether a dry-run rejection is explained by the invoker flag
///
/// Heuristic: the remote error carries no structured reason for this case.
pub fn looks_like_invoker_policy_error(err: &ApiError) -> bool {
    err.code == RpcCode::InvalidArgument || INVOKER_POLICY_ERROR.is_match(&err.message)
}

/// Creates or updates Cloud Run services in one project and region
pub struct ServiceDeployer<'a> {
    run: &'a dyn RunApi,
    project_id: &'a str,
    region: &'a str,
    options: &'a ServiceOptions,
    retry: &'a RetryOptions,
    progress: &'a Progress<'a>,
}

impl<'a> ServiceDeployer<'a> {
    pub fn new(
        run: &'a dyn RunApi,
        project_id: &'a str,
        region: &'a str,
        options: &'a ServiceOptions,
        retry: &'a RetryOptions,
        progress: &'a Progress<'a>,
    ) -> Self {
        Self {
            run,
            project_id,
            region,
            options,
            retry,
            progress,
        }
    }

    /// Roll out `request` and return the resulting service
    pub async fn deploy_revision(&self, request: RevisionRequest) -> Result<Service, DeployError> {
        let name = service_path(self.project_id, self.region, &request.service_id);

        let existing = match retry_on_permission_denied("get service", self.retry, || {
            self.run.get_service(&name)
        })
        .await
        {
            Ok(service) => Some(service),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        let mut fsm = ServiceFsm::new(existing.is_some());

        let mut service = build_service(&name, existing.as_ref(), &request);

        self.progress.info(format!(
            "Validating {} of service {}...",
            if fsm.is_update() { "update" } else { "creation" },
            request.service_id
        ));
        match self.mutate(&fsm, &request.service_id, &service, true).await {
            Ok(_) => transition(&mut fsm, ServiceEvent::DryRunPassed)?,
            Err(DeployError::Api(e))
                if request.skip_invoker_check && looks_like_invoker_policy_error(&e) =>
            {
                self.progress.warn(format!(
                    "Public access could not be enabled ({}); deploying with invoker IAM checks on",
                    e.message
                ));
                service.invoker_iam_disabled = None;
                transition(&mut fsm, ServiceEvent::InvokerFallback)?;
            }
            Err(DeployError::Api(e)) => return Err(DeployError::DryRunFailed(e)),
            Err(e) => return Err(e),
        }

        self.progress.info(format!(
            "{} service {}...",
            if fsm.is_update() { "Updating" } else { "Creating" },
            request.service_id
        ));
        let op = self.mutate(&fsm, &request.service_id, &service, false).await?;
        let op = await_operation(
            &format!("deploy service {}", request.service_id),
            op,
            self.options.operation_poll_interval,
            self.retry,
            |op_name| async move { self.run.get_operation(&op_name).await },
        )
        .await?;
        transition(&mut fsm, ServiceEvent::Committed)?;
        debug!("Service {} reached {:?}", request.service_id, fsm.state());

        let deployed = match op.response_as::<Service>()? {
            Some(service) if service.uri.is_some() => service,
            _ => {
                retry_on_permission_denied("get service", self.retry, || {
                    self.run.get_service(&name)
                })
                .await?
            }
        };

        info!(
            "Service {} deployed at {}",
            request.service_id,
            deployed.uri.as_deref().unwrap_or("<pending>")
        );
        Ok(deployed)
    }

    async fn mutate(
        &self,
        fsm: &ServiceFsm,
        service_id: &str,
        service: &Service,
        validate_only: bool,
    ) -> Result<Operation, DeployError> {
        let description = match (fsm.is_update(), validate_only) {
            (true, true) => "validate service update",
            (true, false) => "update service",
            (false, true) => "validate service creation",
            (false, false) => "create service",
        };

        let op = retry_on_permission_denied(description, self.retry, || async {
            if fsm.is_update() {
                self.run.update_service(service, validate_only).await
            } else {
                let parent = location_path(self.project_id, self.region);
                self.run
                    .create_service(&parent, service_id, service, validate_only)
                    .await
            }
        })
        .await?;

        if let Some(status) = op.error.as_ref().filter(|_| op.done) {
            return Err(ApiError::new(
                RpcCode::from_i32(status.code),
                description,
                status.message.clone(),
            )
            .into());
        }
        Ok(op)
    }
}

fn transition(fsm: &mut ServiceFsm, event: ServiceEvent) -> Result<(), DeployError> {
    fsm.process(event).map_err(DeployError::Internal)
}

fn build_service(name: &str, existing: Option<&Service>, request: &RevisionRequest) -> Service {
    let mut labels: BTreeMap<String, String> = existing
        .map(|service| service.labels.clone())
        .unwrap_or_default();
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());
    labels.insert(PATH_LABEL.to_string(), request.path.as_str().to_string());

    let mut template_labels = BTreeMap::new();
    template_labels.insert(REVISION_LABEL.to_string(), request.revision_label.clone());

    Service {
        // The create call takes the id separately and rejects a populated name
        name: if existing.is_some() {
            name.to_string()
        } else {
            String::new()
        },
        labels,
        template: RevisionTemplate {
            labels: template_labels,
            containers: vec![request.container.clone()],
        },
        invoker_iam_disabled: request.skip_invoker_check.then_some(true),
        ..Default::default()
    }
}
