//! Logging setup for the CLI
//!
//! Everything is written to stderr. stdout carries only the deployment result.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::DeployError;

/// Crates whose debug output drowns the deployment steps
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Filter directive for this level with HTTP internals capped at `warn`
    pub fn directive(&self) -> String {
        let mut directive = self.as_str().to_string();
        if matches!(self, LogLevel::Trace | LogLevel::Debug) {
            for target in QUIET_TARGETS {
                directive.push_str(&format!(",{}=warn", target));
            }
        }
        directive
    }
}

impl std::str::FromStr for LogLevel {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
            .map_err(|_| DeployError::Config(format!("unknown log level '{}'", s)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub log_level: LogLevel,

    /// One JSON object per line
    pub json_format: bool,
}

/// Install the global subscriber. `RUST_LOG` wins over `options.log_level`.
pub fn init_logging(options: LogOptions) -> Result<(), DeployError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(options.log_level.directive())
            .map_err(|e| DeployError::Config(e.to_string()))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = if options.json_format {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| DeployError::Config(format!("logging already initialised: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_debug_directive_quiets_http_crates() {
        assert_eq!(LogLevel::Info.directive(), "info");
        let directive = LogLevel::Debug.directive();
        assert!(directive.starts_with("debug,"));
        assert!(directive.contains("reqwest=warn"));
    }

    #[test]
    fn test_log_level_serde() {
        let level: LogLevel = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(level, LogLevel::Error);
        assert_eq!(serde_json::to_string(&LogLevel::Trace).unwrap(), "\"trace\"");
    }
}
