//! Error types for rundeploy

use std::path::PathBuf;

use thiserror::Error;

/// Canonical RPC codes reported by the remote control planes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl RpcCode {
    /// Numeric value, e.g. 5 for `NOT_FOUND`
    pub fn as_i32(&self) -> i32 {
        match self {
            RpcCode::Ok => 0,
            RpcCode::Cancelled => 1,
            RpcCode::Unknown => 2,
            RpcCode::InvalidArgument => 3,
            RpcCode::DeadlineExceeded => 4,
            RpcCode::NotFound => 5,
            RpcCode::AlreadyExists => 6,
            RpcCode::PermissionDenied => 7,
            RpcCode::ResourceExhausted => 8,
            RpcCode::FailedPrecondition => 9,
            RpcCode::Aborted => 10,
            RpcCode::OutOfRange => 11,
            RpcCode::Unimplemented => 12,
            RpcCode::Internal => 13,
            RpcCode::Unavailable => 14,
            RpcCode::DataLoss => 15,
            RpcCode::Unauthenticated => 16,
        }
    }

    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => RpcCode::Ok,
            1 => RpcCode::Cancelled,
            3 => RpcCode::InvalidArgument,
            4 => RpcCode::DeadlineExceeded,
            5 => RpcCode::NotFound,
            6 => RpcCode::AlreadyExists,
            7 => RpcCode::PermissionDenied,
            8 => RpcCode::ResourceExhausted,
            9 => RpcCode::FailedPrecondition,
            10 => RpcCode::Aborted,
            11 => RpcCode::OutOfRange,
            12 => RpcCode::Unimplemented,
            13 => RpcCode::Internal,
            14 => RpcCode::Unavailable,
            15 => RpcCode::DataLoss,
            16 => RpcCode::Unauthenticated,
            _ => RpcCode::Unknown,
        }
    }

    /// Parse the canonical name carried in `error.status` of a REST error body
    pub fn from_status_name(name: &str) -> Option<Self> {
        let code = match name {
            "OK" => RpcCode::Ok,
            "CANCELLED" => RpcCode::Cancelled,
            "UNKNOWN" => RpcCode::Unknown,
            "INVALID_ARGUMENT" => RpcCode::InvalidArgument,
            "DEADLINE_EXCEEDED" => RpcCode::DeadlineExceeded,
            "NOT_FOUND" => RpcCode::NotFound,
            "ALREADY_EXISTS" => RpcCode::AlreadyExists,
            "PERMISSION_DENIED" => RpcCode::PermissionDenied,
            "RESOURCE_EXHAUSTED" => RpcCode::ResourceExhausted,
            "FAILED_PRECONDITION" => RpcCode::FailedPrecondition,
            "ABORTED" => RpcCode::Aborted,
            "OUT_OF_RANGE" => RpcCode::OutOfRange,
            "UNIMPLEMENTED" => RpcCode::Unimplemented,
            "INTERNAL" => RpcCode::Internal,
            "UNAVAILABLE" => RpcCode::Unavailable,
            "DATA_LOSS" => RpcCode::DataLoss,
            "UNAUTHENTICATED" => RpcCode::Unauthenticated,
            _ => return None,
        };
        Some(code)
    }

    /// Best-effort mapping when the body carries no canonical status
    pub fn from_http_status(status: u16) -> Self {
        match status {
            200..=299 => RpcCode::Ok,
            400 => RpcCode::InvalidArgument,
            401 => RpcCode::Unauthenticated,
            403 => RpcCode::PermissionDenied,
            404 => RpcCode::NotFound,
            409 => RpcCode::AlreadyExists,
            412 => RpcCode::FailedPrecondition,
            429 => RpcCode::ResourceExhausted,
            499 => RpcCode::Cancelled,
            500 => RpcCode::Internal,
            501 => RpcCode::Unimplemented,
            503 => RpcCode::Unavailable,
            504 => RpcCode::DeadlineExceeded,
            _ => RpcCode::Unknown,
        }
    }
}

impl std::fmt::Display for RpcCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.as_i32())
    }
}

/// An error returned by a remote control-plane call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{context}: {code}: {message}")]
pub struct ApiError {
    pub code: RpcCode,
    pub message: String,
    pub context: String,
}

impl ApiError {
    pub fn new(code: RpcCode, context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: context.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code == RpcCode::NotFound
    }

    pub fn is_permission_denied(&self) -> bool {
        self.code == RpcCode::PermissionDenied
    }
}

/// Main error type for rundeploy
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Preflight failed: {0}")]
    Preflight(String),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("Dry run failed: {0}")]
    DryRunFailed(ApiError),

    #[error("Build {build_id} failed with status {status}: {detail}")]
    BuildFailed {
        build_id: String,
        status: String,
        detail: String,
    },

    #[error("Packaging error: {0}")]
    Packaging(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// The remote RPC code, when the error came from a control-plane call
    pub fn rpc_code(&self) -> Option<RpcCode> {
        match self {
            DeployError::Api(e) | DeployError::DryRunFailed(e) => Some(e.code),
            _ => None,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        self.rpc_code() == Some(RpcCode::PermissionDenied)
    }

    pub fn is_not_found(&self) -> bool {
        self.rpc_code() == Some(RpcCode::NotFound)
    }
}

impl From<tokio::task::JoinError> for DeployError {
    fn from(err: tokio::task::JoinError) -> Self {
        DeployError::Internal(err.to_string())
    }
}

impl From<walkdir::Error> for DeployError {
    fn from(err: walkdir::Error) -> Self {
        DeployError::Packaging(err.to_string())
    }
}
