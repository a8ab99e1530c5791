//! API models

pub mod artifact_registry;
pub mod billing;
pub mod build;
pub mod error;
pub mod logging;
pub mod operation;
pub mod run;
pub mod service_usage;
pub mod storage;
