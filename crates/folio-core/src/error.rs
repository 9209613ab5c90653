//! Error types module
//!
//! `AppError` unifies database, storage, validation, authorization and
//! replacement-protocol failures. Each variant describes its own HTTP
//! presentation through [`ErrorMetadata`].
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.


#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

use crate::models::ReplaceStage;
use crate::validation::ValidationError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected rejections such as validation failures
    Debug,
    /// Recoverable issues such as contention
    Warn,
    /// Unexpected failures
    Error,
}

/// Metadata for error responses: how an error should be presented to a client
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "REPLACE_FAILED")
    fn error_code(&self) -> &'static str;

    /// Whether resubmitting the same request may succeed
    fn is_recoverable(&self) -> bool;

    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from the client
    fn is_sensitive(&self) -> bool;

    fn log_level(&self) -> LogLevel;
}

/// Authentication and authorization failures, raised before any storage I/O
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Another replace holds the per-file lease
    #[error("Replace already in progress for file {0}")]
    ReplaceInProgress(String),

    /// A protocol stage failed; the cause is only logged
    #[error("Replace failed at stage {stage}")]
    ReplaceFailed { stage: ReplaceStage },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated(msg) => AppError::Unauthorized(msg),
            AuthError::Forbidden(msg) => AppError::Forbidden(msg),
        }
    }
}

/// Static metadata for each variant:
/// (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
/// `client_message` stays per-variant for dynamic content.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Validation(ValidationError::PathTraversal(_)) => (
            400,
            "PATH_TRAVERSAL",
            false,
            Some("Use a plain file name without directory components"),
            false,
            LogLevel::Debug,
        ),
        AppError::Validation(ValidationError::InvalidType(_)) => (
            400,
            "INVALID_TYPE",
            false,
            Some("Upload a file with an allowed extension and content type"),
            false,
            LogLevel::Debug,
        ),
        AppError::Validation(ValidationError::InvalidSize { .. }) => (
            413,
            "INVALID_SIZE",
            false,
            Some("Upload a non-empty file within the size limit"),
            false,
            LogLevel::Debug,
        ),
        // Same code as the validator's size check; clients see one class
        AppError::PayloadTooLarge(_) => (
            413,
            "INVALID_SIZE",
            false,
            Some("Upload a non-empty file within the size limit"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check authentication token"),
            false,
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (
            403,
            "FORBIDDEN",
            false,
            None,
            false,
            LogLevel::Debug,
        ),
        AppError::Conflict(_) => (
            409,
            "CONFLICT",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Warn,
        ),
        AppError::ReplaceInProgress(_) => (
            409,
            "REPLACE_IN_PROGRESS",
            true,
            Some("Wait for the running replacement to finish, then resubmit"),
            false,
            LogLevel::Warn,
        ),
        AppError::ReplaceFailed { .. } => (
            500,
            "REPLACE_FAILED",
            true,
            Some("Resubmit the whole replacement"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Validation(_) => "Validation",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::NotFound(_) => "NotFound",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Conflict(_) => "Conflict",
            AppError::ReplaceInProgress(_) => "ReplaceInProgress",
            AppError::ReplaceFailed { .. } => "ReplaceFailed",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Error message followed by its source chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Validation(err) => err.to_string(),
            AppError::PayloadTooLarge(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::Forbidden(_) => "You do not have access to this file".to_string(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::ReplaceInProgress(file_id) => format!(
                "Another replacement of file {} is in progress",
                file_id
            ),
            AppError::ReplaceFailed { .. } => "File replacement failed".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access database");
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_validation_codes() {
        let traversal = AppError::from(ValidationError::PathTraversal("../x.pdf".into()));
        assert_eq!(traversal.http_status_code(), 400);
        assert_eq!(traversal.error_code(), "PATH_TRAVERSAL");
        assert_eq!(traversal.log_level(), LogLevel::Debug);

        let bad_type = AppError::from(ValidationError::InvalidType("exe".into()));
        assert_eq!(bad_type.http_status_code(), 400);
        assert_eq!(bad_type.error_code(), "INVALID_TYPE");

        let bad_size = AppError::from(ValidationError::InvalidSize { size: 0, max: 10 });
        assert_eq!(bad_size.http_status_code(), 413);
        assert_eq!(bad_size.error_code(), "INVALID_SIZE");
        assert!(bad_size.client_message().contains("max: 10"));
    }

    #[test]
    fn test_oversized_body_shares_size_code() {
        let too_large = AppError::PayloadTooLarge("length limit exceeded".into());
        assert_eq!(too_large.http_status_code(), 413);
        assert_eq!(too_large.error_code(), "INVALID_SIZE");
    }

    #[test]
    fn test_replace_failed_hides_cause() {
        let err = AppError::ReplaceFailed {
            stage: ReplaceStage::Commit,
        };
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "REPLACE_FAILED");
        assert!(err.is_sensitive());
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "File replacement failed");
        assert_eq!(err.to_string(), "Replace failed at stage commit");
    }

    #[test]
    fn test_auth_error_conversion() {
        let err = AppError::from(AuthError::Unauthenticated("missing token".into()));
        assert_eq!(err.http_status_code(), 401);

        let err = AppError::from(AuthError::Forbidden("viewer".into()));
        assert_eq!(err.http_status_code(), 403);
        assert_eq!(err.error_code(), "FORBIDDEN");
    }

    #[test]
    fn test_replace_in_progress() {
        let err = AppError::ReplaceInProgress("file_123".into());
        assert_eq!(err.http_status_code(), 409);
        assert_eq!(err.error_code(), "REPLACE_IN_PROGRESS");
        assert!(err.client_message().contains("file_123"));
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_detailed_message_includes_source() {
        let err = AppError::from(anyhow::anyhow!("disk full"));
        assert!(err.detailed_message().contains("Caused by: disk full"));
    }
}
