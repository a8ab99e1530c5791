//! rundeploy library
//!
//! Deploys local source folders, inline files and prebuilt images to Cloud
//! Run, preparing the target project on the way.

pub mod api;
pub mod app;
pub mod authn;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod preflight;
pub mod progress;
pub mod retry;
pub mod source;
pub mod storage;
pub mod utils;
