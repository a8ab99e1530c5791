//! In-memory control planes for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cloud_api::artifact_registry::Repository;
use cloud_api::billing::{BillingAccount, ProjectBillingInfo};
use cloud_api::build::{Build, BuildResults, BuildStatus, BuiltImage};
use cloud_api::logging::{ListLogEntriesRequest, ListLogEntriesResponse, LogEntry};
use cloud_api::operation::Operation;
use cloud_api::run::{Service, SubmitBuildRequest, SubmitBuildResponse};
use cloud_api::service_usage::{ApiState, ManagedApi};
use cloud_api::storage::{Bucket, StorageObject};

use rundeploy::api::{
    ArtifactRegistryApi, BillingApi, CloudBuildApi, CloudClients, LoggingApi, RunApi,
    ServiceUsageApi, StorageApi,
};
use rundeploy::errors::{ApiError, DeployError, RpcCode};
use rundeploy::preflight::apis::SOURCE_DEPLOY_APIS;

pub const PROJECT: &str = "demo-project";
pub const REGION: &str = "europe-west1";
pub const BUILD_ID: &str = "build-7f3a";

/// Decides whether a dry run of `service` is rejected
pub type DryRunRule = fn(&Service) -> Option<ApiError>;

pub struct CloudState {
    pub enabled_apis: HashSet<String>,
    /// Failures left before enabling an API succeeds
    pub enable_failures: HashMap<String, u32>,
    /// Enablement operation polls answered with `PERMISSION_DENIED`
    pub deny_operation_polls: bool,
    pub billing_enabled: bool,
    pub billing_accounts: Vec<BillingAccount>,
    pub services: HashMap<String, Service>,
    pub dry_run_rule: Option<DryRunRule>,
    pub buckets: HashSet<String>,
    pub repositories: HashSet<String>,
    /// Statuses returned by successive build polls; the last one repeats
    pub build_statuses: VecDeque<BuildStatus>,
    pub build_image: Option<String>,
    pub build_log_url: Option<String>,
    /// Newest first, as the logging API returns them; `None` fails the call
    pub log_entries: Option<Vec<LogEntry>>,
    pub submitted_builds: Vec<SubmitBuildRequest>,
    pub uploads: Vec<(String, String, Vec<u8>)>,
    pub committed: Vec<Service>,
}

impl Default for CloudState {
    fn default() -> Self {
        Self {
            enabled_apis: HashSet::new(),
            enable_failures: HashMap::new(),
            deny_operation_polls: false,
            billing_enabled: true,
            billing_accounts: Vec::new(),
            services: HashMap::new(),
            dry_run_rule: None,
            buckets: HashSet::new(),
            repositories: HashSet::new(),
            build_statuses: VecDeque::from([BuildStatus::Success]),
            build_image: Some(format!(
                "{}-docker.pkg.dev/{}/cloud-run-source-deploy/web@sha256:abc",
                REGION, PROJECT
            )),
            build_log_url: Some("https://console.cloud.google.com/cloud-build/builds/x".to_string()),
            log_entries: Some(Vec::new()),
            submitted_builds: Vec::new(),
            uploads: Vec::new(),
            committed: Vec::new(),
        }
    }
}

/// One fake implementing every client seam
#[derive(Default)]
pub struct MockCloud {
    pub state: Mutex<CloudState>,
    calls: Mutex<Vec<String>>,
}

impl MockCloud {
    /// A project ready for deployment: every API on and billing attached
    pub fn ready() -> Arc<Self> {
        let cloud = Self::default();
        cloud.with_state(|s| {
            s.enabled_apis = SOURCE_DEPLOY_APIS.iter().map(|a| a.to_string()).collect()
        });
        Arc::new(cloud)
    }

    pub fn fresh() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut CloudState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn clients(self: &Arc<Self>) -> CloudClients {
        CloudClients {
            run: self.clone(),
            builds: self.clone(),
            billing: self.clone(),
            service_usage: self.clone(),
            storage: self.clone(),
            artifact_registry: self.clone(),
            logging: self.clone(),
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose name starts with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn add_service(&self, service_id: &str) {
        let name = format!("projects/{}/locations/{}/services/{}", PROJECT, REGION, service_id);
        self.with_state(|s| {
            s.services.insert(
                name.clone(),
                Service {
                    name: name.clone(),
                    uri: Some(format!("https://{}-old.a.run.app", service_id)),
                    ..Default::default()
                },
            )
        });
    }
}

fn not_found(context: &str) -> DeployError {
    ApiError::new(RpcCode::NotFound, context, "not found").into()
}

fn done(name: &str) -> Operation {
    Operation {
        name: name.to_string(),
        done: true,
        ..Default::default()
    }
}

#[async_trait]
impl RunApi for MockCloud {
    async fn get_service(&self, name: &str) -> Result<Service, DeployError> {
        self.record("run.get_service");
        self.with_state(|s| s.services.get(name).cloned())
            .ok_or_else(|| not_found("get service"))
    }

    async fn create_service(
        &self,
        parent: &str,
        service_id: &str,
        service: &Service,
        validate_only: bool,
    ) -> Result<Operation, DeployError> {
        let name = format!("{}/services/{}", parent, service_id);
        self.mutate("create", name, service_id, service, validate_only)
    }

    async fn update_service(
        &self,
        service: &Service,
        validate_only: bool,
    ) -> Result<Operation, DeployError> {
        let service_id = service.name.rsplit('/').next().unwrap_or_default().to_string();
        self.mutate("update", service.name.clone(), &service_id, service, validate_only)
    }

    async fn get_operation(&self, name: &str) -> Result<Operation, DeployError> {
        self.record("run.get_operation");
        Ok(done(name))
    }
}

impl MockCloud {
    fn mutate(
        &self,
        verb: &str,
        name: String,
        service_id: &str,
        service: &Service,
        validate_only: bool,
    ) -> Result<Operation, DeployError> {
        if validate_only {
            self.record(format!("run.dry_run_{}", verb));
            if let Some(rule) = self.with_state(|s| s.dry_run_rule) {
                if let Some(err) = rule(service) {
                    return Err(err.into());
                }
            }
            return Ok(done("operations/dry-run"));
        }

        self.record(format!("run.{}", verb));
        let mut deployed = service.clone();
        deployed.name = name.clone();
        deployed.uri = Some(format!("https://{}-abc123-ew.a.run.app", service_id));
        self.with_state(|s| {
            s.committed.push(deployed.clone());
            s.services.insert(name, deployed);
        });
        Ok(Operation {
            name: "operations/deploy".to_string(),
            done: false,
            ..Default::default()
        })
    }
}

#[async_trait]
impl CloudBuildApi for MockCloud {
    async fn submit_build(
        &self,
        parent: &str,
        request: &SubmitBuildRequest,
    ) -> Result<SubmitBuildResponse, DeployError> {
        self.record("build.submit");
        self.with_state(|s| s.submitted_builds.push(request.clone()));
        let encoded = STANDARD.encode(format!("projects/123/locations/{}/builds/{}", REGION, BUILD_ID));
        Ok(SubmitBuildResponse {
            build_operation: Operation {
                name: format!("{}/operations/{}", parent, encoded),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn get_build(&self, name: &str) -> Result<Build, DeployError> {
        self.record("build.get");
        assert!(name.ends_with(BUILD_ID), "unexpected build name {}", name);
        Ok(self.with_state(|s| {
            let status = if s.build_statuses.len() > 1 {
                s.build_statuses.pop_front().unwrap_or_default()
            } else {
                s.build_statuses.front().copied().unwrap_or_default()
            };
            Build {
                id: BUILD_ID.to_string(),
                status,
                results: s.build_image.clone().map(|image| BuildResults {
                    images: vec![BuiltImage {
                        name: image,
                        digest: None,
                    }],
                }),
                log_url: s.build_log_url.clone(),
            }
        }))
    }
}

#[async_trait]
impl BillingApi for MockCloud {
    async fn list_billing_accounts(&self) -> Result<Vec<BillingAccount>, DeployError> {
        self.record("billing.list");
        Ok(self.with_state(|s| s.billing_accounts.clone()))
    }

    async fn get_billing_info(&self, project_id: &str) -> Result<ProjectBillingInfo, DeployError> {
        self.record("billing.get");
        Ok(self.with_state(|s| ProjectBillingInfo {
            name: Some(format!("projects/{}/billingInfo", project_id)),
            billing_account_name: None,
            billing_enabled: s.billing_enabled,
        }))
    }

    async fn update_billing_info(
        &self,
        project_id: &str,
        billing_account_name: &str,
    ) -> Result<ProjectBillingInfo, DeployError> {
        self.record(format!("billing.update:{}", billing_account_name));
        self.with_state(|s| s.billing_enabled = true);
        Ok(ProjectBillingInfo {
            name: Some(format!("projects/{}/billingInfo", project_id)),
            billing_account_name: Some(billing_account_name.to_string()),
            billing_enabled: true,
        })
    }
}

#[async_trait]
impl ServiceUsageApi for MockCloud {
    async fn get_api(&self, _project_id: &str, api: &str) -> Result<ManagedApi, DeployError> {
        self.record(format!("usage.get:{}", api));
        let enabled = self.with_state(|s| s.enabled_apis.contains(api));
        Ok(ManagedApi {
            name: api.to_string(),
            state: if enabled {
                ApiState::Enabled
            } else {
                ApiState::Disabled
            },
        })
    }

    async fn enable_api(&self, _project_id: &str, api: &str) -> Result<Operation, DeployError> {
        self.record(format!("usage.enable:{}", api));
        self.with_state(|s| {
            if let Some(left) = s.enable_failures.get_mut(api) {
                if *left > 0 {
                    *left -= 1;
                    return Err(ApiError::new(
                        RpcCode::FailedPrecondition,
                        "enable api",
                        format!("{} is not ready", api),
                    )
                    .into());
                }
            }
            s.enabled_apis.insert(api.to_string());
            Ok(Operation {
                name: format!("operations/enable-{}", api),
                done: false,
                ..Default::default()
            })
        })
    }

    async fn get_operation(&self, name: &str) -> Result<Operation, DeployError> {
        self.record("usage.get_operation");
        if self.with_state(|s| s.deny_operation_polls) {
            return Err(ApiError::new(RpcCode::PermissionDenied, "get operation", "caller lacks permission").into());
        }
        Ok(done(name))
    }
}

#[async_trait]
impl StorageApi for MockCloud {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, DeployError> {
        self.record("storage.bucket_exists");
        Ok(self.with_state(|s| s.buckets.contains(bucket)))
    }

    async fn create_bucket(
        &self,
        _project_id: &str,
        bucket: &str,
        location: &str,
    ) -> Result<Bucket, DeployError> {
        self.record("storage.create_bucket");
        self.with_state(|s| s.buckets.insert(bucket.to_string()));
        Ok(Bucket {
            name: bucket.to_string(),
            location: Some(location.to_string()),
        })
    }

    async fn upload_object(
        &self,
        bucket: &str,
        object: &str,
        _content_type: &str,
        data: Vec<u8>,
    ) -> Result<StorageObject, DeployError> {
        self.record("storage.upload");
        let size = data.len();
        self.with_state(|s| s.uploads.push((bucket.to_string(), object.to_string(), data)));
        Ok(StorageObject {
            name: object.to_string(),
            bucket: bucket.to_string(),
            generation: Some("1".to_string()),
            size: Some(size.to_string()),
        })
    }
}

#[async_trait]
impl ArtifactRegistryApi for MockCloud {
    async fn repository_exists(&self, name: &str) -> Result<bool, DeployError> {
        self.record("registry.exists");
        Ok(self.with_state(|s| s.repositories.contains(name)))
    }

    async fn create_repository(
        &self,
        parent: &str,
        repository_id: &str,
        repository: &Repository,
    ) -> Result<Operation, DeployError> {
        self.record("registry.create");
        assert_eq!(repository.format, "DOCKER");
        self.with_state(|s| {
            s.repositories
                .insert(format!("{}/repositories/{}", parent, repository_id))
        });
        Ok(done("operations/repo"))
    }

    async fn get_operation(&self, name: &str) -> Result<Operation, DeployError> {
        self.record("registry.get_operation");
        Ok(done(name))
    }
}

#[async_trait]
impl LoggingApi for MockCloud {
    async fn list_entries(
        &self,
        request: &ListLogEntriesRequest,
    ) -> Result<ListLogEntriesResponse, DeployError> {
        self.record("logging.list");
        assert!(request.filter.contains(BUILD_ID));
        match self.with_state(|s| s.log_entries.clone()) {
            Some(entries) => Ok(ListLogEntriesResponse {
                entries: entries
                    .into_iter()
                    .take(request.page_size as usize)
                    .collect(),
            }),
            None => Err(ApiError::new(RpcCode::Unavailable, "list logs", "backend down").into()),
        }
    }
}

/// A text log entry
pub fn log_line(text: &str) -> LogEntry {
    LogEntry {
        text_payload: Some(text.to_string()),
        ..Default::default()
    }
}
