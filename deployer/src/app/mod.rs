//! Application wiring

pub mod options;
