//! Deployment pipeline
//!
//! [`orchestrator::Deployer`] is the entry point. The other modules are the
//! stages it drives: artifact storage, remote builds and the service
//! create-or-update protocol.

pub mod artifacts;
pub mod build;
pub mod fsm;
pub mod orchestrator;
pub mod service;

pub use orchestrator::{Deployer, Strategy};
