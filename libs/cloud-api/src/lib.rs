//! REST resource models consumed by the rundeploy engine.
//!
//! Field names follow the JSON representation of the Google Cloud v1/v2 REST
//! APIs. Output-only fields are deserialized but never serialized back.

pub mod models;

pub use models::*;
