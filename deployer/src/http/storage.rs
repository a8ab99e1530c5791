//! Cloud Storage JSON API client

use std::sync::Arc;

use async_trait::async_trait;
use cloud_api::storage::{Bucket, StorageObject};

use crate::api::StorageApi;
use crate::errors::DeployError;
use crate::http::client::HttpClient;
use crate::http::encode;

pub struct StorageClient {
    http: Arc<HttpClient>,
}

impl StorageClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl StorageApi for StorageClient {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, DeployError> {
        match self
            .http
            .get::<Bucket>(&format!("storage/v1/b/{}", encode(bucket)))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_bucket(
        &self,
        project_id: &str,
        bucket: &str,
        location: &str,
    ) -> Result<Bucket, DeployError> {
        let body = Bucket {
            name: bucket.to_string(),
            location: Some(location.to_string()),
        };
        self.http
            .post(&format!("storage/v1/b?project={}", encode(project_id)), &body)
            .await
    }

    async fn upload_object(
        &self,
        bucket: &str,
        object: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<StorageObject, DeployError> {
        let path = format!(
            "upload/storage/v1/b/{}/o?uploadType=media&name={}",
            encode(bucket),
            encode(object)
        );
        self.http.post_bytes(&path, content_type, data).await
    }
}
