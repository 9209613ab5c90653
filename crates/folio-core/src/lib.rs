//! Folio Core Library
//!
//! Domain models, error types, configuration and upload validation shared by
//! every Folio crate.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::{BaseConfig, Config, LogFormat, PortalConfig};
pub use error::{AppError, AuthError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
pub use validation::{ReplaceValidator, ValidatedName, ValidationError};
