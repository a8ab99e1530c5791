//! Upload bucket and image repository for the build path

use std::time::Duration;

use cloud_api::artifact_registry::Repository;
use cloud_api::run::StorageSource;

use crate::api::operation::await_operation;
use crate::api::paths::{location_path, registry_image, repository_path, source_bucket};
use crate::api::CloudClients;
use crate::errors::{DeployError, RpcCode};
use crate::progress::Progress;
use crate::retry::{retry_on_permission_denied, RetryOptions};
use crate::source::PackagedArtifact;
use crate::utils::generate_uuid;

/// Repository that receives images built from source
pub const DEFAULT_REPOSITORY: &str = "cloud-run-source-deploy";

/// Artifact options
#[derive(Debug, Clone)]
pub struct ArtifactOptions {
    pub repository_id: String,

    /// Interval between polls of a repository creation
    pub operation_poll_interval: Duration,
}

impl Default for ArtifactOptions {
    fn default() -> Self {
        Self {
            repository_id: DEFAULT_REPOSITORY.to_string(),
            operation_poll_interval: Duration::from_secs(2),
        }
    }
}

/// Create the regional source bucket unless it exists; returns its name
pub async fn ensure_bucket(
    clients: &CloudClients,
    project_id: &str,
    region: &str,
    retry: &RetryOptions,
    progress: &Progress<'_>,
) -> Result<String, DeployError> {
    let bucket = source_bucket(project_id, region);

    let exists = retry_on_permission_denied("get bucket", retry, || {
        clients.storage.bucket_exists(&bucket)
    })
    .await?;
    if exists {
        progress.debug(format!("Bucket {} exists", bucket));
        return Ok(bucket);
    }

    progress.info(format!("Creating bucket {}...", bucket));
    match retry_on_permission_denied("create bucket", retry, || {
        clients.storage.create_bucket(project_id, &bucket, region)
    })
    .await
    {
        Ok(_) => Ok(bucket),
        // Lost a race with a concurrent deployment
        Err(e) if e.rpc_code() == Some(RpcCode::AlreadyExists) => Ok(bucket),
        Err(e) => Err(e),
    }
}

/// Upload `artifact` under a fresh object name
pub async fn upload_archive(
    clients: &CloudClients,
    bucket: &str,
    service_name: &str,
    artifact: PackagedArtifact,
    retry: &RetryOptions,
    progress: &Progress<'_>,
) -> Result<StorageSource, DeployError> {
    let format = artifact.archive_format;
    let object = format!("{}-{}.{}", service_name, generate_uuid(), format.extension());
    progress.info(format!(
        "Uploading {} bytes to gs://{}/{}...",
        artifact.archive_bytes.len(),
        bucket,
        object
    ));

    let data = artifact.archive_bytes;
    let uploaded = retry_on_permission_denied("upload source", retry, || {
        clients
            .storage
            .upload_object(bucket, &object, format.content_type(), data.clone())
    })
    .await?;

    Ok(StorageSource {
        bucket: bucket.to_string(),
        object,
        generation: uploaded.generation,
    })
}

/// Create the Docker repository unless it exists; returns the image to build
pub async fn ensure_repository(
    clients: &CloudClients,
    project_id: &str,
    region: &str,
    service_name: &str,
    options: &ArtifactOptions,
    retry: &RetryOptions,
    progress: &Progress<'_>,
) -> Result<String, DeployError> {
    let name = repository_path(project_id, region, &options.repository_id);
    let image = registry_image(project_id, region, &options.repository_id, service_name);

    let exists = retry_on_permission_denied("get repository", retry, || {
        clients.artifact_registry.repository_exists(&name)
    })
    .await?;
    if exists {
        return Ok(image);
    }

    progress.info(format!("Creating repository {}...", options.repository_id));
    let parent = location_path(project_id, region);
    let repository = Repository {
        format: "DOCKER".to_string(),
        description: Some("Images built from source by rundeploy".to_string()),
        ..Default::default()
    };

    let created = retry_on_permission_denied("create repository", retry, || {
        clients
            .artifact_registry
            .create_repository(&parent, &options.repository_id, &repository)
    })
    .await;
    let op = match created {
        Ok(op) => op,
        Err(e) if e.rpc_code() == Some(RpcCode::AlreadyExists) => return Ok(image),
        Err(e) => return Err(e),
    };

    await_operation(
        "create repository",
        op,
        options.operation_poll_interval,
        retry,
        |op_name| async move { clients.artifact_registry.get_operation(&op_name).await },
    )
    .await?;
    Ok(image)
}
