//! Error types and error codes for Confreg
//!
//! This module defines:
//! - `ConfregError`: the outcome taxonomy shared by every registry operation
//! - `ErrorCode`: structured error codes for API responses

use serde::{Deserialize, Serialize};

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum ConfregError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("storage fault: {0}")]
    StorageFault(#[from] anyhow::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl ConfregError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ConfregError::NotFound(what.into())
    }

    pub fn already_exists(what: impl Into<String>) -> Self {
        ConfregError::AlreadyExists(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        ConfregError::Conflict(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ConfregError::ValidationError(message.into())
    }

    /// Structured code reported to API callers.
    pub fn error_code(&self) -> ErrorCode<'static> {
        match self {
            ConfregError::NotFound(_) => RESOURCE_NOT_FOUND,
            ConfregError::AlreadyExists(_) => RESOURCE_ALREADY_EXISTS,
            ConfregError::Conflict(_) => RESOURCE_CONFLICT,
            ConfregError::RateLimited { .. } => TOO_MANY_REQUESTS,
            ConfregError::StorageFault(_) => DATA_ACCESS_ERROR,
            ConfregError::ValidationError(_) => PARAMETER_VALIDATE_ERROR,
            ConfregError::ConfigError(_) => SERVER_ERROR,
        }
    }
}

/// Result alias used by the registry crates
pub type Result<T> = std::result::Result<T, ConfregError>;

/// Error code structure for API responses
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

pub const SUCCESS: ErrorCode<'static> = ErrorCode {
    code: 0,
    message: "success",
};

pub const DATA_ACCESS_ERROR: ErrorCode<'static> = ErrorCode {
    code: 10002,
    message: "data access error",
};

pub const TOO_MANY_REQUESTS: ErrorCode<'static> = ErrorCode {
    code: 10003,
    message: "too many requests",
};

pub const PARAMETER_VALIDATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20002,
    message: "parameter validate error",
};

pub const RESOURCE_NOT_FOUND: ErrorCode<'static> = ErrorCode {
    code: 20004,
    message: "resource not found",
};

pub const RESOURCE_ALREADY_EXISTS: ErrorCode<'static> = ErrorCode {
    code: 20005,
    message: "resource already exists",
};

pub const RESOURCE_CONFLICT: ErrorCode<'static> = ErrorCode {
    code: 20006,
    message: "resource conflict",
};

pub const SERVER_ERROR: ErrorCode<'static> = ErrorCode {
    code: 30000,
    message: "server error",
};
