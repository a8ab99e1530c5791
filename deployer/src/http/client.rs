//! HTTP client implementation

use std::sync::Arc;
use std::time::Duration;

use cloud_api::error::ErrorEnvelope;
use reqwest::{header, Client, RequestBuilder};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::authn::token::TokenProvider;
use crate::errors::{ApiError, DeployError, RpcCode};

/// Authorized HTTP client for one Google API endpoint
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Arc<dyn TokenProvider>,
    quota_project: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, token: Arc<dyn TokenProvider>) -> Result<Self, DeployError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("rundeploy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            quota_project: None,
        })
    }

    /// Bill API quota to `project_id` via `x-goog-user-project`
    pub fn with_quota_project(mut self, project_id: impl Into<String>) -> Self {
        self.quota_project = Some(project_id.into());
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, DeployError> {
        let token = self.token.access_token().await?;
        let mut request =
            request.header(header::AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        if let Some(project) = &self.quota_project {
            request = request.header("x-goog-user-project", project);
        }
        Ok(request)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DeployError> {
        let url = self.url(path);
        debug!("GET {}", url);
        let request = self.authorize(self.client.get(&url)).await?;
        self.send(request, "GET", path).await
    }

    /// Make a POST request with a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, DeployError> {
        let url = self.url(path);
        debug!("POST {}", url);
        let request = self.authorize(self.client.post(&url).json(body)).await?;
        self.send(request, "POST", path).await
    }

    /// Make a PUT request with a JSON body
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, DeployError> {
        let url = self.url(path);
        debug!("PUT {}", url);
        let request = self.authorize(self.client.put(&url).json(body)).await?;
        self.send(request, "PUT", path).await
    }

    /// Make a PATCH request with a JSON body
    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, DeployError> {
        let url = self.url(path);
        debug!("PATCH {}", url);
        let request = self.authorize(self.client.patch(&url).json(body)).await?;
        self.send(request, "PATCH", path).await
    }

    /// Make a POST request with a raw body
    pub async fn post_bytes<T: DeserializeOwned>(
        &self,
        path: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<T, DeployError> {
        let url = self.url(path);
        debug!("POST {} ({} bytes)", url, data.len());
        let request = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, content_type)
            .body(data);
        let request = self.authorize(request).await?;
        self.send(request, "POST", path).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        method: &str,
        path: &str,
    ) -> Result<T, DeployError> {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = api_error(status.as_u16(), &format!("{} {}", method, path), &body);
            if err.code != RpcCode::NotFound {
                error!("HTTP {} failed: {} - {}", method, status, err.message);
            }
            return Err(err.into());
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            // Some endpoints reply with an empty body on success
            return Ok(serde_json::from_str("{}")?);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Decode a Google REST error body into an [`ApiError`]
pub fn api_error(http_status: u16, context: &str, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let code = RpcCode::from_status_name(&envelope.error.status)
                .unwrap_or_else(|| RpcCode::from_http_status(http_status));
            ApiError::new(code, context, envelope.error.message)
        }
        Err(_) => ApiError::new(RpcCode::from_http_status(http_status), context, body.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_prefers_canonical_status() {
        let body = r#"{"error":{"code":400,"message":"denied by org policy","status":"FAILED_PRECONDITION"}}"#;
        let err = api_error(400, "POST services", body);
        assert_eq!(err.code, RpcCode::FailedPrecondition);
        assert_eq!(err.message, "denied by org policy");
    }

    #[test]
    fn test_api_error_without_json_body() {
        let err = api_error(403, "GET b/x", "Forbidden\n");
        assert_eq!(err.code, RpcCode::PermissionDenied);
        assert_eq!(err.message, "Forbidden");
    }
}
