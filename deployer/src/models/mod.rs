//! Request and result models

pub mod deployment;

pub use deployment::*;
