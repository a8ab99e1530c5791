//! Client registry
//!
//! Building a `reqwest::Client` sets up a connection pool and TLS state, so
//! handles are reused across deployments within a process. Entries are keyed
//! by (service, project, credential).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::api::CloudClients;
use crate::authn::token::TokenProvider;
use crate::errors::DeployError;
use crate::http::artifact_registry::ArtifactRegistryClient;
use crate::http::billing::BillingClient;
use crate::http::builds::BuildClient;
use crate::http::client::HttpClient;
use crate::http::logging::LoggingClient;
use crate::http::run::RunClient;
use crate::http::service_usage::ServiceUsageClient;
use crate::http::storage::StorageClient;
use crate::http::Endpoints;

/// Remote services reached by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiService {
    Run,
    CloudBuild,
    Billing,
    ServiceUsage,
    Storage,
    ArtifactRegistry,
    Logging,
}

impl ApiService {
    /// Whether requests bill quota to the target project
    ///
    /// Billing and Service Usage are called before the project is known to
    /// have those APIs enabled, so they run on the caller's own quota.
    fn uses_quota_project(&self) -> bool {
        !matches!(self, ApiService::Billing | ApiService::ServiceUsage)
    }

    fn base_url<'a>(&self, endpoints: &'a Endpoints) -> &'a str {
        match self {
            ApiService::Run => &endpoints.run,
            ApiService::CloudBuild => &endpoints.cloud_build,
            ApiService::Billing => &endpoints.billing,
            ApiService::ServiceUsage => &endpoints.service_usage,
            ApiService::Storage => &endpoints.storage,
            ApiService::ArtifactRegistry => &endpoints.artifact_registry,
            ApiService::Logging => &endpoints.logging,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    service: ApiService,
    project_id: String,
    credential: String,
}

/// Process-wide cache of authorized HTTP clients
pub struct ClientRegistry {
    endpoints: Endpoints,
    clients: Mutex<HashMap<ClientKey, Arc<HttpClient>>>,
}

impl ClientRegistry {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            endpoints,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the client for `service` acting on `project_id`
    pub fn http_client(
        &self,
        service: ApiService,
        project_id: &str,
        token: &Arc<dyn TokenProvider>,
    ) -> Result<Arc<HttpClient>, DeployError> {
        let key = ClientKey {
            service,
            project_id: project_id.to_string(),
            credential: token.credential_id(),
        };

        let mut clients = self
            .clients
            .lock()
            .map_err(|e| DeployError::Internal(format!("client registry poisoned: {}", e)))?;

        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        debug!("Creating {:?} client for project {}", service, project_id);
        let mut client = HttpClient::new(service.base_url(&self.endpoints), token.clone())?;
        if service.uses_quota_project() {
            client = client.with_quota_project(project_id);
        }
        let client = Arc::new(client);
        clients.insert(key, client.clone());
        Ok(client)
    }

    /// All clients one deployment against `project_id` needs
    pub fn cloud_clients(
        &self,
        project_id: &str,
        token: &Arc<dyn TokenProvider>,
    ) -> Result<CloudClients, DeployError> {
        let run = self.http_client(ApiService::Run, project_id, token)?;
        let cloud_build = self.http_client(ApiService::CloudBuild, project_id, token)?;

        Ok(CloudClients {
            run: Arc::new(RunClient::new(run.clone())),
            builds: Arc::new(BuildClient::new(run, cloud_build)),
            billing: Arc::new(BillingClient::new(self.http_client(
                ApiService::Billing,
                project_id,
                token,
            )?)),
            service_usage: Arc::new(ServiceUsageClient::new(self.http_client(
                ApiService::ServiceUsage,
                project_id,
                token,
            )?)),
            storage: Arc::new(StorageClient::new(self.http_client(
                ApiService::Storage,
                project_id,
                token,
            )?)),
            artifact_registry: Arc::new(ArtifactRegistryClient::new(self.http_client(
                ApiService::ArtifactRegistry,
                project_id,
                token,
            )?)),
            logging: Arc::new(LoggingClient::new(self.http_client(
                ApiService::Logging,
                project_id,
                token,
            )?)),
        })
    }

    /// Number of cached clients
    pub fn len(&self) -> usize {
        self.clients.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new(Endpoints::default())
    }
}
