//! Remote control-plane client seams
//!
//! Each remote service the engine drives is reached through one of these
//! traits. The REST implementations live in [`crate::http`]; tests substitute
//! in-memory fakes.

pub mod operation;
pub mod paths;

use std::sync::Arc;

use async_trait::async_trait;
use cloud_api::artifact_registry::Repository;
use cloud_api::billing::{BillingAccount, ProjectBillingInfo};
use cloud_api::build::Build;
use cloud_api::logging::{ListLogEntriesRequest, ListLogEntriesResponse};
use cloud_api::operation::Operation;
use cloud_api::run::{Service, SubmitBuildRequest, SubmitBuildResponse};
use cloud_api::service_usage::ManagedApi;
use cloud_api::storage::{Bucket, StorageObject};

use crate::errors::DeployError;

/// Cloud Run Admin API
#[async_trait]
pub trait RunApi: Send + Sync {
    /// Fails with `NOT_FOUND` when the service does not exist
    async fn get_service(&self, name: &str) -> Result<Service, DeployError>;

    async fn create_service(
        &self,
        parent: &str,
        service_id: &str,
        service: &Service,
        validate_only: bool,
    ) -> Result<Operation, DeployError>;

    /// `service.name` must be the full resource name
    async fn update_service(
        &self,
        service: &Service,
        validate_only: bool,
    ) -> Result<Operation, DeployError>;

    async fn get_operation(&self, name: &str) -> Result<Operation, DeployError>;
}

/// Remote build service
#[async_trait]
pub trait CloudBuildApi: Send + Sync {
    async fn submit_build(
        &self,
        parent: &str,
        request: &SubmitBuildRequest,
    ) -> Result<SubmitBuildResponse, DeployError>;

    /// `name` is `projects/{p}/locations/{l}/builds/{id}`
    async fn get_build(&self, name: &str) -> Result<Build, DeployError>;
}

/// Cloud Billing API
#[async_trait]
pub trait BillingApi: Send + Sync {
    async fn list_billing_accounts(&self) -> Result<Vec<BillingAccount>, DeployError>;

    async fn get_billing_info(&self, project_id: &str) -> Result<ProjectBillingInfo, DeployError>;

    async fn update_billing_info(
        &self,
        project_id: &str,
        billing_account_name: &str,
    ) -> Result<ProjectBillingInfo, DeployError>;
}

/// Service Usage API
#[async_trait]
pub trait ServiceUsageApi: Send + Sync {
    async fn get_api(&self, project_id: &str, api: &str) -> Result<ManagedApi, DeployError>;

    async fn enable_api(&self, project_id: &str, api: &str) -> Result<Operation, DeployError>;

    async fn get_operation(&self, name: &str) -> Result<Operation, DeployError>;
}

/// Cloud Storage
#[async_trait]
pub trait StorageApi: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, DeployError>;

    async fn create_bucket(
        &self,
        project_id: &str,
        bucket: &str,
        location: &str,
    ) -> Result<Bucket, DeployError>;

    async fn upload_object(
        &self,
        bucket: &str,
        object: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<StorageObject, DeployError>;
}

/// Artifact Registry
#[async_trait]
pub trait ArtifactRegistryApi: Send + Sync {
    async fn repository_exists(&self, name: &str) -> Result<bool, DeployError>;

    async fn create_repository(
        &self,
        parent: &str,
        repository_id: &str,
        repository: &Repository,
    ) -> Result<Operation, DeployError>;

    async fn get_operation(&self, name: &str) -> Result<Operation, DeployError>;
}

/// Cloud Logging
#[async_trait]
pub trait LoggingApi: Send + Sync {
    async fn list_entries(
        &self,
        request: &ListLogEntriesRequest,
    ) -> Result<ListLogEntriesResponse, DeployError>;
}

/// The set of clients one deployment needs
#[derive(Clone)]
pub struct CloudClients {
    pub run: Arc<dyn RunApi>,
    pub builds: Arc<dyn CloudBuildApi>,
    pub billing: Arc<dyn BillingApi>,
    pub service_usage: Arc<dyn ServiceUsageApi>,
    pub storage: Arc<dyn StorageApi>,
    pub artifact_registry: Arc<dyn ArtifactRegistryApi>,
    pub logging: Arc<dyn LoggingApi>,
}
