//! Deployment models

use serde::{Deserialize, Serialize};

/// Region used when a request does not name one
pub const DEFAULT_REGION: &str = "europe-west1";

/// A deployment request received from a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    pub project_id: String,

    pub service_name: String,

    #[serde(default = "default_region")]
    pub region: String,

    pub source: SourceSpecification,

    /// Make the service publicly invocable without an IAM binding
    #[serde(default)]
    pub skip_invoker_check: bool,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl DeploymentRequest {
    pub fn new(
        project_id: impl Into<String>,
        service_name: impl Into<String>,
        source: SourceSpecification,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            service_name: service_name.into(),
            region: default_region(),
            source,
            skip_invoker_check: false,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_skip_invoker_check(mut self, skip: bool) -> Self {
        self.skip_invoker_check = skip;
        self
    }
}

/// What to deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceSpecification {
    /// Local paths and/or inline file contents
    Files(Vec<SourceFile>),

    /// A prebuilt container image reference
    Image(String),
}

/// One item of a file-based source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceFile {
    /// A file or directory on the local filesystem
    Path(String),

    /// Inline content addressed by a relative file name
    Content { filename: String, content: String },
}

impl SourceFile {
    pub fn path(path: impl Into<String>) -> Self {
        SourceFile::Path(path.into())
    }

    pub fn content(filename: impl Into<String>, content: impl Into<String>) -> Self {
        SourceFile::Content {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// How the final revision was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentPath {
    /// Interpreted source run directly on a base image
    Source,

    /// Container image produced by a remote build
    Build,

    /// Prebuilt container image
    Image,
}

impl DeploymentPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentPath::Source => "source",
            DeploymentPath::Build => "build",
            DeploymentPath::Image => "image",
        }
    }
}

/// Result returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutcome {
    pub uri: String,
    pub service_name: String,
    pub revision_label: String,
    pub path: DeploymentPath,
}
