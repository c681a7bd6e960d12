//! Error types for the clinical core engine

use serde_json::{json, Value as JsonValue};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Internal configuration error: {0}")]
    InternalConfig(String),

    #[error("Version conflict: expected {expected}, got {actual}")]
    VersionConflict { expected: i32, actual: i32 },

    #[error("Resource not found: {resource_type}/{id}")]
    ResourceNotFound { resource_type: String, id: String },

    #[error("Version not found: {resource_type}/{id}/_history/{version_id}")]
    VersionNotFound {
        resource_type: String,
        id: String,
        version_id: i32,
    },

    #[error("Resource already exists: {resource_type}/{id}")]
    ResourceExists { resource_type: String, id: String },

    #[error("Resource deleted: {resource_type}/{id}")]
    ResourceDeleted {
        resource_type: String,
        id: String,
        version_id: i32,
    },

    #[error("Patch operation {index} failed: path '{path}' not found")]
    PatchPathNotFound { index: usize, path: String },

    #[error("Patch operation {index} failed: test at '{path}' did not match")]
    PatchTestFailed { index: usize, path: String },

    #[error("Unsupported patch operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid patch document: {0}")]
    InvalidPatch(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`Error`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidParameter,
    InternalConfig,
    VersionConflict,
    NotFound,
    AlreadyExists,
    Deleted,
    PatchPathNotFound,
    PatchTestFailed,
    UnsupportedOperation,
    InvalidPatch,
    UnsupportedMediaType,
    Cancelled,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Error::InternalConfig(_) | Error::Config(_) => ErrorKind::InternalConfig,
            Error::VersionConflict { .. } => ErrorKind::VersionConflict,
            Error::ResourceNotFound { .. } | Error::VersionNotFound { .. } => ErrorKind::NotFound,
            Error::ResourceExists { .. } => ErrorKind::AlreadyExists,
            Error::ResourceDeleted { .. } => ErrorKind::Deleted,
            Error::PatchPathNotFound { .. } => ErrorKind::PatchPathNotFound,
            Error::PatchTestFailed { .. } => ErrorKind::PatchTestFailed,
            Error::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            Error::InvalidPatch(_) => ErrorKind::InvalidPatch,
            Error::UnsupportedMediaType(_) => ErrorKind::UnsupportedMediaType,
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::Database(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// A version conflict is resolved by re-reading the resource and retrying.
    /// Nothing else is worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::VersionConflict { .. })
    }

    /// HTTP status the REST layer reports for this error.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidParameter | ErrorKind::InvalidPatch => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Deleted => 410,
            ErrorKind::AlreadyExists => 409,
            ErrorKind::VersionConflict => 412,
            ErrorKind::UnsupportedMediaType => 415,
            ErrorKind::PatchPathNotFound
            | ErrorKind::PatchTestFailed
            | ErrorKind::UnsupportedOperation => 422,
            ErrorKind::Cancelled => 499,
            ErrorKind::InternalConfig | ErrorKind::Internal => 500,
        }
    }

    /// FHIR `OperationOutcome.issue.code` for this error.
    pub fn issue_code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidParameter | ErrorKind::InvalidPatch => "invalid",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Deleted => "deleted",
            ErrorKind::AlreadyExists | ErrorKind::VersionConflict => "conflict",
            ErrorKind::UnsupportedMediaType | ErrorKind::UnsupportedOperation => "not-supported",
            ErrorKind::PatchPathNotFound | ErrorKind::PatchTestFailed => "processing",
            ErrorKind::Cancelled => "timeout",
            ErrorKind::InternalConfig | ErrorKind::Internal => "exception",
        }
    }

    /// Render the error as a FHIR OperationOutcome.
    ///
    /// Internal failures are logged and reported without their details.
    pub fn operation_outcome(&self) -> JsonValue {
        let diagnostics = match self.kind() {
            ErrorKind::Internal | ErrorKind::InternalConfig => {
                tracing::error!("Internal error: {}", self);
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        json!({
            "resourceType": "OperationOutcome",
            "issue": [{
                "severity": "error",
                "code": self.issue_code(),
                "diagnostics": diagnostics
            }]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_conflict_maps_to_precondition_failed() {
        let err = Error::VersionConflict {
            expected: 1,
            actual: 2,
        };
        assert_eq!(err.kind(), ErrorKind::VersionConflict);
        assert_eq!(err.status_code(), 412);
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Version conflict: expected 1, got 2");
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let err = Error::InternalConfig("descriptor 'x' has type 'money'".to_string());
        let outcome = err.operation_outcome();
        assert_eq!(outcome["issue"][0]["code"], "exception");
        assert_eq!(outcome["issue"][0]["diagnostics"], "Internal server error");
        assert!(!err.is_retryable());
    }

    #[test]
    fn patch_failures_are_unprocessable() {
        let err = Error::PatchTestFailed {
            index: 0,
            path: "/status".to_string(),
        };
        assert_eq!(err.status_code(), 422);
        let outcome = err.operation_outcome();
        assert_eq!(outcome["resourceType"], "OperationOutcome");
        assert_eq!(outcome["issue"][0]["code"], "processing");
    }
}
