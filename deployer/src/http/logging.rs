//! Cloud Logging API client

use std::sync::Arc;

use async_trait::async_trait;
use cloud_api::logging::{ListLogEntriesRequest, ListLogEntriesResponse};

use crate::api::LoggingApi;
use crate::errors::DeployError;
use crate::http::client::HttpClient;

pub struct LoggingClient {
    http: Arc<HttpClient>,
}

impl LoggingClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl LoggingApi for LoggingClient {
    async fn list_entries(
        &self,
        request: &ListLogEntriesRequest,
    ) -> Result<ListLogEntriesResponse, DeployError> {
        self.http.post("entries:list", request).await
    }
}
