//! Remote container builds
//!
//! Builds are submitted through the Run API, which answers with a
//! long-running operation whose name embeds the Cloud Build id. The build is
//! then read back from Cloud Build until it reaches a terminal status.

use std::time::Duration;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use cloud_api::build::BuildStatus;
use cloud_api::logging::ListLogEntriesRequest;
use cloud_api::run::{BuildType, BuildpacksBuild, DockerBuild, StorageSource, SubmitBuildRequest};
use tracing::{debug, warn};

use crate::api::paths::{build_path, location_path};
use crate::api::{CloudBuildApi, LoggingApi};
use crate::errors::DeployError;
use crate::progress::Progress;
use crate::retry::{retry_on_permission_denied, RetryOptions};

/// Build orchestrator options
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Interval between build status polls
    pub poll_interval: Duration,

    /// Wait after a failure before reading build logs
    pub log_propagation_delay: Duration,

    /// Log lines included in a failure message
    pub log_lines: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            log_propagation_delay: Duration::from_secs(10),
            log_lines: 50,
        }
    }
}

/// A finished successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJob {
    pub id: String,
    pub status: BuildStatus,
    pub result_image: String,
    pub log_url: Option<String>,
}

/// Build id carried by a build operation name
///
/// The trailing segment of the name is base64 of a resource path such as
/// `projects/123/locations/r/builds/<id>`.
pub fn decode_build_id(operation_name: &str) -> Result<String, DeployError> {
    let segment = operation_name
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            DeployError::Internal(format!("Build operation has no name: {:?}", operation_name))
        })?;

    let decoded = [STANDARD, URL_SAFE, STANDARD_NO_PAD, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(segment).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| {
            DeployError::Internal(format!(
                "Could not decode build id from operation {}",
                operation_name
            ))
        })?;

    decoded
        .rsplit(['/', ':'])
        .next()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            DeployError::Internal(format!(
                "Build operation {} names no build: {:?}",
                operation_name, decoded
            ))
        })
}

/// Submits builds and waits for them in one project and region
pub struct BuildOrchestrator<'a> {
    builds: &'a dyn CloudBuildApi,
    logging: &'a dyn LoggingApi,
    project_id: &'a str,
    region: &'a str,
    options: &'a BuildOptions,
    retry: &'a RetryOptions,
    progress: &'a Progress<'a>,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(
        builds: &'a dyn CloudBuildApi,
        logging: &'a dyn LoggingApi,
        project_id: &'a str,
        region: &'a str,
        options: &'a BuildOptions,
        retry: &'a RetryOptions,
        progress: &'a Progress<'a>,
    ) -> Self {
        Self {
            builds,
            logging,
            project_id,
            region,
            options,
            retry,
            progress,
        }
    }

    /// Build `source` into `image_uri`, with the Dockerfile when there is one
    pub async fn submit_and_await_build(
        &self,
        source: StorageSource,
        image_uri: &str,
        has_dockerfile: bool,
    ) -> Result<BuildJob, DeployError> {
        let build_type = if has_dockerfile {
            BuildType::DockerBuild(DockerBuild {})
        } else {
            BuildType::BuildpackBuild(BuildpacksBuild::default())
        };
        let request = SubmitBuildRequest {
            storage_source: source,
            image_uri: image_uri.to_string(),
            build_type,
        };

        self.progress.info(format!(
            "Submitting {} build for {}...",
            if has_dockerfile { "Dockerfile" } else { "buildpacks" },
            image_uri
        ));
        let parent = location_path(self.project_id, self.region);
        let response = retry_on_permission_denied("submit build", self.retry, || {
            self.builds.submit_build(&parent, &request)
        })
        .await?;
        if let Some(warning) = &response.base_image_warning {
            self.progress.warn(warning.clone());
        }

        let build_id = decode_build_id(&response.build_operation.name)?;
        let name = build_path(self.project_id, self.region, &build_id);
        self.progress.info(format!("Build {} started", build_id));

        let mut last_status = None;
        let build = loop {
            let build = retry_on_permission_denied("get build", self.retry, || {
                self.builds.get_build(&name)
            })
            .await?;

            if last_status != Some(build.status) {
                self.progress
                    .info(format!("Build {} is {}", build_id, build.status));
                last_status = Some(build.status);
            }
            if build.status.is_terminal() {
                break build;
            }
            tokio::time::sleep(self.options.poll_interval).await;
        };

        if build.status != BuildStatus::Success {
            let detail = self.failure_detail(&build_id, build.log_url.as_deref()).await;
            return Err(DeployError::BuildFailed {
                build_id,
                status: build.status.to_string(),
                detail,
            });
        }

        let result_image = match build.first_image() {
            Some(image) => image.to_string(),
            None => {
                warn!("Build {} reported no images, using {}", build_id, image_uri);
                image_uri.to_string()
            }
        };
        self.progress.info(format!("Built image {}", result_image));

        Ok(BuildJob {
            id: build_id,
            status: build.status,
            result_image,
            log_url: build.log_url,
        })
    }

    /// Log excerpt of a failed build, or where to find the logs
    async fn failure_detail(&self, build_id: &str, log_url: Option<&str>) -> String {
        tokio::time::sleep(self.options.log_propagation_delay).await;

        let log_url = log_url
            .map(str::to_string)
            .unwrap_or_else(|| console_log_url(self.project_id, self.region, build_id));

        match self.tail_logs(build_id).await {
            Ok(lines) if !lines.is_empty() => {
                let mut detail = format!("last {} log lines:\n{}", lines.len(), lines.join("\n"));
                detail.push_str(&format!("\nFull logs: {}", log_url));
                detail
            }
            Ok(_) => format!("see logs at {}", log_url),
            Err(e) => {
                debug!("Could not read logs of build {}: {}", build_id, e);
                format!("see logs at {}", log_url)
            }
        }
    }

    /// Latest log lines of a build in chronological order
    async fn tail_logs(&self, build_id: &str) -> Result<Vec<String>, DeployError> {
        let request = ListLogEntriesRequest {
            resource_names: vec![format!("projects/{}", self.project_id)],
            filter: format!(
                "resource.type=\"build\" AND resource.labels.build_id=\"{}\"",
                build_id
            ),
            order_by: "timestamp desc".to_string(),
            page_size: self.options.log_lines,
        };
        let response = self.logging.list_entries(&request).await?;

        let mut lines: Vec<String> = response
            .entries
            .iter()
            .filter_map(|entry| entry.line())
            .take(self.options.log_lines as usize)
            .collect();
        lines.reverse();
        Ok(lines)
    }
}

/// Console page of a build, for builds that report no log URL
pub fn console_log_url(project_id: &str, region: &str, build_id: &str) -> String {
    format!(
        "https://console.cloud.google.com/cloud-build/builds;region={}/{}?project={}",
        region, build_id, project_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_build_id() {
        let encoded = STANDARD.encode("projects/123/locations/europe-west1/builds/abc-123");
        let name = format!("projects/p/locations/europe-west1/operations/{}", encoded);
        assert_eq!(decode_build_id(&name).unwrap(), "abc-123");

        let colon = URL_SAFE_NO_PAD.encode("build:xyz");
        assert_eq!(decode_build_id(&colon).unwrap(), "xyz");

        assert!(decode_build_id("operations/%%%").is_err());
        assert!(decode_build_id("operations/").is_err());
    }

    #[test]
    fn test_console_log_url() {
        assert_eq!(
            console_log_url("demo", "europe-west1", "b-1"),
            "https://console.cloud.google.com/cloud-build/builds;region=europe-west1/b-1?project=demo"
        );
    }
}
