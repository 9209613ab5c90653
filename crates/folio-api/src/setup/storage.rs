//! Storage setup

use anyhow::{Context, Result};
use folio_core::Config;
use folio_storage::{create_storage_pool, StoragePool};

/// One backend per configured bucket
pub async fn setup_storage(config: &Config) -> Result<StoragePool> {
    let pool = create_storage_pool(config)
        .await
        .context("Failed to initialize storage")?;

    tracing::info!(
        backend = %config.storage_backend(),
        buckets = %config.storage_buckets().join(","),
        default_bucket = %pool.default_bucket(),
        "Storage initialized"
    );

    Ok(pool)
}
