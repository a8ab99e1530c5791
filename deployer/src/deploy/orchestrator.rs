//! Orchestration facade

use std::sync::LazyLock;

use cloud_api::run::{Container, EnvVar, SourceCode};
use regex::Regex;
use tracing::{debug, info};

use crate::api::CloudClients;
use crate::app::options::DeployerOptions;
use crate::deploy::artifacts::{ensure_bucket, ensure_repository, upload_archive};
use crate::deploy::build::BuildOrchestrator;
use crate::deploy::service::{RevisionRequest, ServiceDeployer};
use crate::errors::DeployError;
use crate::models::{
    DeployOutcome, DeploymentPath, DeploymentRequest, SourceFile, SourceSpecification,
};
use crate::preflight::apis::{IMAGE_DEPLOY_APIS, SOURCE_DEPLOY_APIS};
use crate::preflight::ensure_preflight;
use crate::progress::{Progress, ProgressSink};
use crate::source::detect::{detect_attributes, DeploymentAttributes};
use crate::source::{package_direct_source, package_sources, resolve_sources, SourceSet};
use crate::utils::revision_label;

/// Image of a direct-source container; the code runs on `base_image_uri`
const SOURCE_CONTAINER_IMAGE: &str = "scratch";

static SERVICE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]([a-z0-9-]{0,47}[a-z0-9])?$").expect("valid service name pattern")
});

static PROJECT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z][a-z0-9.-]*:)?[a-z][a-z0-9-]{4,28}[a-z0-9]$").expect("valid project pattern")
});

static REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+-[a-z]+[0-9]+$").expect("valid region pattern"));

/// Ways to turn files into a running revision, tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Upload interpreted source and run it on a base image
    DirectSource,

    /// Build a container image remotely, then deploy it
    Build,
}

/// Strategies for sources with the given Dockerfile and runtime detection
pub fn strategies(has_dockerfile: bool, attributes: &DeploymentAttributes) -> Vec<Strategy> {
    if !has_dockerfile && attributes.is_detected() {
        vec![Strategy::DirectSource, Strategy::Build]
    } else {
        vec![Strategy::Build]
    }
}

/// Deploys to Cloud Run in one project
pub struct Deployer {
    clients: CloudClients,
    options: DeployerOptions,
}

impl Deployer {
    pub fn new(clients: CloudClients, options: DeployerOptions) -> Self {
        Self { clients, options }
    }

    pub fn options(&self) -> &DeployerOptions {
        &self.options
    }

    /// Deploy local files, or the image of an image request
    pub async fn deploy(
        &self,
        request: &DeploymentRequest,
        sink: &dyn ProgressSink,
    ) -> Result<DeployOutcome, DeployError> {
        let progress = Progress::new(sink);
        let result = match &request.source {
            SourceSpecification::Files(files) => self.deploy_files(request, files, &progress).await,
            SourceSpecification::Image(image) => self.deploy_image_ref(request, image, &progress).await,
        };
        report(result, &progress)
    }

    /// Deploy a prebuilt container image
    pub async fn deploy_image(
        &self,
        request: &DeploymentRequest,
        sink: &dyn ProgressSink,
    ) -> Result<DeployOutcome, DeployError> {
        let progress = Progress::new(sink);
        let result = match &request.source {
            SourceSpecification::Image(image) => self.deploy_image_ref(request, image, &progress).await,
            SourceSpecification::Files(_) => Err(DeployError::Validation(
                "An image deployment needs an image reference".to_string(),
            )),
        };
        report(result, &progress)
    }

    async fn deploy_files(
        &self,
        request: &DeploymentRequest,
        files: &[SourceFile],
        progress: &Progress<'_>,
    ) -> Result<DeployOutcome, DeployError> {
        validate_target(request)?;
        if files.is_empty() {
            return Err(DeployError::Validation("No source files given".to_string()));
        }

        ensure_preflight(
            &self.clients,
            &request.project_id,
            SOURCE_DEPLOY_APIS,
            &self.options.preflight,
            &self.options.retry,
            progress,
        )
        .await?;

        let owned = files.to_vec();
        let mount_root = self.options.packager.mount_root.clone();
        let sources =
            tokio::task::spawn_blocking(move || resolve_sources(&owned, &mount_root)).await??;
        progress.info(format!("Collected {} source files", sources.entries().len()));

        let attributes = detect_attributes(&sources).await;
        let has_dockerfile = sources.has_dockerfile();
        let plan = strategies(has_dockerfile, &attributes);
        debug!(
            "Dockerfile: {}, runtime: {:?}, strategies: {:?}",
            has_dockerfile, attributes.runtime, plan
        );

        let label = revision_label(chrono::Utc::now());
        let mut plan = plan.into_iter().peekable();
        while let Some(strategy) = plan.next() {
            let attempt = match strategy {
                Strategy::DirectSource => {
                    self.deploy_direct_source(request, &sources, &attributes, &label, progress)
                        .await
                }
                Strategy::Build => self.deploy_built(request, &sources, &label, progress).await,
            };

            match attempt {
                Err(e) if plan.peek().is_some() => {
                    progress.warn(format!(
                        "{:?} deployment failed, trying the next strategy: {}",
                        strategy, e
                    ));
                }
                other => return other,
            }
        }

        Err(DeployError::Internal("No deployment strategy applies".to_string()))
    }

    async fn deploy_direct_source(
        &self,
        request: &DeploymentRequest,
        sources: &SourceSet,
        attributes: &DeploymentAttributes,
        label: &str,
        progress: &Progress<'_>,
    ) -> Result<DeployOutcome, DeployError> {
        progress.info("Deploying source directly, without a container build...");
        let artifact = package_direct_source(sources, attributes, &self.options.packager).await?;

        let bucket = ensure_bucket(
            &self.clients,
            &request.project_id,
            &request.region,
            &self.options.retry,
            progress,
        )
        .await?;
        let storage_source = upload_archive(
            &self.clients,
            &bucket,
            &request.service_name,
            artifact,
            &self.options.retry,
            progress,
        )
        .await?;

        let container = Container {
            image: SOURCE_CONTAINER_IMAGE.to_string(),
            base_image_uri: attributes.base_image.clone(),
            command: attributes.command.clone(),
            args: attributes.args.clone(),
            env: attributes
                .environment_variables
                .iter()
                .map(|(name, value)| EnvVar {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            source_code: Some(SourceCode {
                cloud_storage_source: storage_source,
            }),
        };

        self.roll_out(request, container, DeploymentPath::Source, label, progress)
            .await
    }

    async fn deploy_built(
        &self,
        request: &DeploymentRequest,
        sources: &SourceSet,
        label: &str,
        progress: &Progress<'_>,
    ) -> Result<DeployOutcome, DeployError> {
        let artifact = package_sources(sources).await?;
        let has_dockerfile = artifact.has_dockerfile;
        let retry = &self.options.retry;

        let bucket = ensure_bucket(
            &self.clients,
            &request.project_id,
            &request.region,
            retry,
            progress,
        )
        .await?;
        let storage_source = upload_archive(
            &self.clients,
            &bucket,
            &request.service_name,
            artifact,
            retry,
            progress,
        )
        .await?;
        let image = ensure_repository(
            &self.clients,
            &request.project_id,
            &request.region,
            &request.service_name,
            &self.options.artifacts,
            retry,
            progress,
        )
        .await?;

        let job = BuildOrchestrator::new(
            self.clients.builds.as_ref(),
            self.clients.logging.as_ref(),
            &request.project_id,
            &request.region,
            &self.options.build,
            retry,
            progress,
        )
        .submit_and_await_build(storage_source, &image, has_dockerfile)
        .await?;

        let container = Container {
            image: job.result_image,
            ..Default::default()
        };
        self.roll_out(request, container, DeploymentPath::Build, label, progress)
            .await
    }

    async fn deploy_image_ref(
        &self,
        request: &DeploymentRequest,
        image: &str,
        progress: &Progress<'_>,
    ) -> Result<DeployOutcome, DeployError> {
        validate_target(request)?;
        if image.trim().is_empty() {
            return Err(DeployError::Validation("Image reference is empty".to_string()));
        }

        ensure_preflight(
            &self.clients,
            &request.project_id,
            IMAGE_DEPLOY_APIS,
            &self.options.preflight,
            &self.options.retry,
            progress,
        )
        .await?;

        let container = Container {
            image: image.trim().to_string(),
            ..Default::default()
        };
        let label = revision_label(chrono::Utc::now());
        self.roll_out(request, container, DeploymentPath::Image, &label, progress)
            .await
    }

    async fn roll_out(
        &self,
        request: &DeploymentRequest,
        container: Container,
        path: DeploymentPath,
        label: &str,
        progress: &Progress<'_>,
    ) -> Result<DeployOutcome, DeployError> {
        let service = ServiceDeployer::new(
            self.clients.run.as_ref(),
            &request.project_id,
            &request.region,
            &self.options.service,
            &self.options.retry,
            progress,
        )
        .deploy_revision(RevisionRequest {
            service_id: request.service_name.clone(),
            container,
            skip_invoker_check: request.skip_invoker_check,
            path,
            revision_label: label.to_string(),
        })
        .await?;

        let uri = service.uri.ok_or_else(|| {
            DeployError::Internal(format!(
                "Service {} was deployed but reports no URI",
                request.service_name
            ))
        })?;

        progress.info(format!("Service {} is live at {}", request.service_name, uri));
        Ok(DeployOutcome {
            uri,
            service_name: request.service_name.clone(),
            revision_label: label.to_string(),
            path,
        })
    }
}

fn report(
    result: Result<DeployOutcome, DeployError>,
    progress: &Progress<'_>,
) -> Result<DeployOutcome, DeployError> {
    match result {
        Ok(outcome) => {
            info!("Deployed {} via {}", outcome.service_name, outcome.path.as_str());
            Ok(outcome)
        }
        Err(e) => {
            progress.error(e.to_string());
            Err(e)
        }
    }
}

/// Check the project, service name and region of `request`
pub fn validate_target(request: &DeploymentRequest) -> Result<(), DeployError> {
    if !PROJECT_ID.is_match(&request.project_id) {
        return Err(DeployError::Validation(format!(
            "Invalid project id {:?}",
            request.project_id
        )));
    }
    if !SERVICE_NAME.is_match(&request.service_name) {
        return Err(DeployError::Validation(format!(
            "Invalid service name {:?}: use lowercase letters, digits and hyphens, starting with a letter",
            request.service_name
        )));
    }
    if !REGION.is_match(&request.region) {
        return Err(DeployError::Validation(format!(
            "Invalid region {:?}",
            request.region
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::detect::DetectionResult;

    fn request(project: &str, service: &str, region: &str) -> DeploymentRequest {
        DeploymentRequest::new(project, service, SourceSpecification::Image("img".to_string()))
            .with_region(region)
    }

    #[test]
    fn test_validate_target() {
        assert!(validate_target(&request("my-project", "web", "europe-west1")).is_ok());
        assert!(validate_target(&request("example.com:my-project", "web-2", "us-central1")).is_ok());
        assert!(validate_target(&request("", "web", "europe-west1")).is_err());
        assert!(validate_target(&request("my-project", "Web", "europe-west1")).is_err());
        assert!(validate_target(&request("my-project", "web-", "europe-west1")).is_err());
        assert!(validate_target(&request("my-project", "web", "")).is_err());
    }

    #[test]
    fn test_strategies() {
        let node = DeploymentAttributes::from(DetectionResult::Node {
            command: "node".to_string(),
            args: vec![],
        });
        assert_eq!(
            strategies(false, &node),
            vec![Strategy::DirectSource, Strategy::Build]
        );
        assert_eq!(strategies(true, &node), vec![Strategy::Build]);
        assert_eq!(
            strategies(false, &DeploymentAttributes::default()),
            vec![Strategy::Build]
        );
    }
}
