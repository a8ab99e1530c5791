//! Artifact Registry API client

use std::sync::Arc;

use async_trait::async_trait;
use cloud_api::artifact_registry::Repository;
use cloud_api::operation::Operation;

use crate::api::ArtifactRegistryApi;
use crate::errors::DeployError;
use crate::http::client::HttpClient;
use crate::http::encode;

pub struct ArtifactRegistryClient {
    http: Arc<HttpClient>,
}

impl ArtifactRegistryClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ArtifactRegistryApi for ArtifactRegistryClient {
    async fn repository_exists(&self, name: &str) -> Result<bool, DeployError> {
        match self.http.get::<Repository>(name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_repository(
        &self,
        parent: &str,
        repository_id: &str,
        repository: &Repository,
    ) -> Result<Operation, DeployError> {
        self.http
            .post(
                &format!("{}/repositories?repositoryId={}", parent, encode(repository_id)),
                repository,
            )
            .await
    }

    async fn get_operation(&self, name: &str) -> Result<Operation, DeployError> {
        self.http.get(name).await
    }
}
