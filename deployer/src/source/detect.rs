//! Runtime detection by static inspection of root-level manifests

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::source::SourceSet;

pub const NODEJS_BASE_IMAGE: &str =
    "us-central1-docker.pkg.dev/serverless-runtimes/google-22-full/runtimes/nodejs22";
pub const PYTHON_BASE_IMAGE: &str =
    "us-central1-docker.pkg.dev/serverless-runtimes/google-22-full/runtimes/python312";

/// Directory, relative to the source root, receiving vendored Python packages
pub const PYTHON_PACKAGES_DIR: &str = ".python_packages";

/// Where the source archive is unpacked inside the running container
pub const WORKSPACE_ROOT: &str = "/workspace";

const PYTHON_ENTRYPOINTS: [&str; 2] = ["main.py", "app.py"];
const PYTHON_VERSION_PINS: [&str; 2] = [".python-version", "runtime.txt"];

/// Supported interpreted runtimes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    Nodejs,
    Python,
}

impl Runtime {
    pub fn base_image(&self) -> &'static str {
        match self {
            Runtime::Nodejs => NODEJS_BASE_IMAGE,
            Runtime::Python => PYTHON_BASE_IMAGE,
        }
    }
}

/// Outcome of inspecting a source set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionResult {
    Node { command: String, args: Vec<String> },
    Python { entrypoint: String },
    Undetected,
}

/// Runtime metadata for a direct-source deployment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentAttributes {
    /// Unset when no supported manifest was found
    pub runtime: Option<Runtime>,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub base_image: Option<String>,
    pub environment_variables: Vec<(String, String)>,
}

impl DeploymentAttributes {
    pub fn is_detected(&self) -> bool {
        self.runtime.is_some()
    }
}

impl From<DetectionResult> for DeploymentAttributes {
    fn from(result: DetectionResult) -> Self {
        match result {
            DetectionResult::Node { command, args } => Self {
                runtime: Some(Runtime::Nodejs),
                command: vec![command],
                args,
                base_image: Some(NODEJS_BASE_IMAGE.to_string()),
                environment_variables: Vec::new(),
            },
            DetectionResult::Python { entrypoint } => Self {
                runtime: Some(Runtime::Python),
                command: vec!["python3".to_string()],
                args: vec![entrypoint],
                base_image: Some(PYTHON_BASE_IMAGE.to_string()),
                environment_variables: vec![(
                    "PYTHONPATH".to_string(),
                    format!("{}/{}", WORKSPACE_ROOT, PYTHON_PACKAGES_DIR),
                )],
            },
            DetectionResult::Undetected => Self::default(),
        }
    }
}

/// Root-level files relevant to detection
#[derive(Debug, Default)]
pub struct RootManifests {
    pub package_json: Option<Vec<u8>>,
    pub has_requirements: bool,
    pub python_entrypoint: Option<String>,
    pub has_python_pin: bool,
}

#[derive(Deserialize)]
struct PackageManifest {
    #[serde(default)]
    scripts: HashMap<String, String>,

    #[serde(default)]
    engines: HashMap<String, serde_json::Value>,
}

/// Classify the runtime of a source root
pub fn detect_runtime(manifests: &RootManifests) -> DetectionResult {
    if let Some(raw) = &manifests.package_json {
        let result = detect_node(raw);
        if result != DetectionResult::Undetected {
            return result;
        }
    }

    if manifests.has_requirements && !manifests.has_python_pin {
        if let Some(entrypoint) = &manifests.python_entrypoint {
            return DetectionResult::Python {
                entrypoint: entrypoint.clone(),
            };
        }
    }

    DetectionResult::Undetected
}

fn detect_node(raw: &[u8]) -> DetectionResult {
    let manifest: PackageManifest = match serde_json::from_slice(raw) {
        Ok(manifest) => manifest,
        Err(e) => {
            warn!("Ignoring unreadable package.json: {}", e);
            return DetectionResult::Undetected;
        }
    };

    if manifest.engines.contains_key("node") {
        debug!("package.json pins a node version, leaving it to the build");
        return DetectionResult::Undetected;
    }

    let Some(start) = manifest.scripts.get("start") else {
        return DetectionResult::Undetected;
    };

    let mut words = start.split_whitespace().map(str::to_string);
    match words.next() {
        Some(command) => DetectionResult::Node {
            command,
            args: words.collect(),
        },
        None => DetectionResult::Undetected,
    }
}

/// Inspect the root of `sources` and derive deployment attributes
pub async fn detect_attributes(sources: &SourceSet) -> DeploymentAttributes {
    let manifests = RootManifests {
        package_json: match sources.root_entry("package.json") {
            Some(entry) => match entry.read().await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("Could not read package.json: {}", e);
                    None
                }
            },
            None => None,
        },
        has_requirements: sources.root_entry("requirements.txt").is_some(),
        python_entrypoint: PYTHON_ENTRYPOINTS
            .iter()
            .find(|name| sources.root_entry(name).is_some())
            .map(|name| name.to_string()),
        has_python_pin: PYTHON_VERSION_PINS
            .iter()
            .any(|name| sources.root_entry(name).is_some()),
    };

    let result = detect_runtime(&manifests);
    debug!("Detected {:?}", result);
    result.into()
}
