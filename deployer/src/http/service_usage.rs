//! Service Usage API client

use std::sync::Arc;

use async_trait::async_trait;
use cloud_api::operation::Operation;
use cloud_api::service_usage::ManagedApi;

use crate::api::ServiceUsageApi;
use crate::errors::DeployError;
use crate::http::client::HttpClient;

pub struct ServiceUsageClient {
    http: Arc<HttpClient>,
}

impl ServiceUsageClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ServiceUsageApi for ServiceUsageClient {
    async fn get_api(&self, project_id: &str, api: &str) -> Result<ManagedApi, DeployError> {
        self.http
            .get(&format!("projects/{}/services/{}", project_id, api))
            .await
    }

    async fn enable_api(&self, project_id: &str, api: &str) -> Result<Operation, DeployError> {
        self.http
            .post(
                &format!("projects/{}/services/{}:enable", project_id, api),
                &serde_json::json!({}),
            )
            .await
    }

    async fn get_operation(&self, name: &str) -> Result<Operation, DeployError> {
        self.http.get(name).await
    }
}
