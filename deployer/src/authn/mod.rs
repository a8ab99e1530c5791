//! Access-token providers for the REST clients

pub mod token;
