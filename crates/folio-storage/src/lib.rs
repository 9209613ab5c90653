//! Folio Storage Library
//!
//! Object store access for file content: the `Storage` trait, S3 and local
//! filesystem backends, and a pool that maps bucket names to backends.
//!
//! # Key layout
//!
//! Committed objects live at the path recorded in the file's metadata row.
//! Staging objects live under the reserved `_staging/` prefix, see [`keys`].
//! Keys must not contain `..` or a leading `/`.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod pool;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage_pool;
pub use folio_core::StorageBackend;
pub use keys::{is_staging_key, new_staging_token, staging_key, STAGING_PREFIX};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use pool::StoragePool;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ObjectMeta, Storage, StorageError, StorageResult};
