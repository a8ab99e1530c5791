//! Build submission (Cloud Run) and build status (Cloud Build) client

use std::sync::Arc;

use async_trait::async_trait;
use cloud_api::build::Build;
use cloud_api::run::{SubmitBuildRequest, SubmitBuildResponse};

use crate::api::CloudBuildApi;
use crate::errors::DeployError;
use crate::http::client::HttpClient;

pub struct BuildClient {
    run: Arc<HttpClient>,
    cloud_build: Arc<HttpClient>,
}

impl BuildClient {
    /// Builds are submitted through the Run API and read back from Cloud Build
    pub fn new(run: Arc<HttpClient>, cloud_build: Arc<HttpClient>) -> Self {
        Self { run, cloud_build }
    }
}

#[async_trait]
impl CloudBuildApi for BuildClient {
    async fn submit_build(
        &self,
        parent: &str,
        request: &SubmitBuildRequest,
    ) -> Result<SubmitBuildResponse, DeployError> {
        self.run.post(&format!("{}/builds:submit", parent), request).await
    }

    async fn get_build(&self, name: &str) -> Result<Build, DeployError> {
        self.cloud_build.get(name).await
    }
}
