//! Cloud Run Admin API v2

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::operation::Operation;

/// A Cloud Run service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub template: RevisionTemplate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoker_iam_disabled: Option<bool>,

    /// Output only
    #[serde(default, skip_serializing)]
    pub uri: Option<String>,

    /// Output only
    #[serde(default, skip_serializing)]
    pub latest_ready_revision: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionTemplate {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code: Option<SourceCode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// Source run directly on a base image, without a container build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCode {
    pub cloud_storage_source: StorageSource,
}

/// An archive in a Cloud Storage bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSource {
    pub bucket: String,
    pub object: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
}

/// `projects.locations.builds:submit` request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBuildRequest {
    pub storage_source: StorageSource,
    pub image_uri: String,

    #[serde(flatten)]
    pub build_type: BuildType,
}

/// Exactly one of a Dockerfile build or a buildpacks build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildType {
    DockerBuild(DockerBuild),
    BuildpackBuild(BuildpacksBuild),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerBuild {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildpacksBuild {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment_variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBuildResponse {
    #[serde(default)]
    pub build_operation: Operation,

    #[serde(default)]
    pub base_image_uri: Option<String>,

    #[serde(default)]
    pub base_image_warning: Option<String>,
}
