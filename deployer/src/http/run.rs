//! Cloud Run Admin API client

use std::sync::Arc;

use async_trait::async_trait;
use cloud_api::operation::Operation;
use cloud_api::run::Service;

use crate::api::RunApi;
use crate::errors::DeployError;
use crate::http::client::HttpClient;
use crate::http::encode;

pub struct RunClient {
    http: Arc<HttpClient>,
}

impl RunClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RunApi for RunClient {
    async fn get_service(&self, name: &str) -> Result<Service, DeployError> {
        self.http.get(name).await
    }

    async fn create_service(
        &self,
        parent: &str,
        service_id: &str,
        service: &Service,
        validate_only: bool,
    ) -> Result<Operation, DeployError> {
        let path = format!(
            "{}/services?serviceId={}&validateOnly={}",
            parent,
            encode(service_id),
            validate_only
        );
        // The resource name is derived from parent and serviceId on create
        let mut body = service.clone();
        body.name.clear();
        self.http.post(&path, &body).await
    }

    async fn update_service(
        &self,
        service: &Service,
        validate_only: bool,
    ) -> Result<Operation, DeployError> {
        let path = format!("{}?validateOnly={}", service.name, validate_only);
        self.http.patch(&path, service).await
    }

    async fn get_operation(&self, name: &str) -> Result<Operation, DeployError> {
        self.http.get(name).await
    }
}
