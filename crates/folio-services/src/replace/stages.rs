//! Individual protocol stages. Each performs exactly one collaborator call
//! and logs its outcome with the stage name; sequencing lives in the
//! orchestrator.

use bytes::Bytes;
use folio_core::models::{FileContentUpdate, FileRecord, ReplaceStage};
use folio_db::FileRecordStore;
use folio_storage::{Storage, StorageError};

use super::error::{MetadataUpdateFailure, ReplaceError};

/// Staging Writer: put the uploaded bytes at the staging key.
pub(crate) async fn write_staging(
    store: &dyn Storage,
    staging_key: &str,
    bytes: Bytes,
    content_type: &str,
) -> Result<(), ReplaceError> {
    let size = bytes.len();
    store
        .put(staging_key, bytes, content_type)
        .await
        .map_err(ReplaceError::StagingWrite)?;

    tracing::debug!(
        stage = %ReplaceStage::StagingWrite,
        staging_key = %staging_key,
        size_bytes = size,
        "Staged new content"
    );
    Ok(())
}

/// Staging Reader: read the staged object back in full and check it is the
/// length that was uploaded.
pub(crate) async fn read_staging(
    store: &dyn Storage,
    staging_key: &str,
    expected_len: usize,
) -> Result<Bytes, ReplaceError> {
    let content = store
        .get(staging_key)
        .await
        .map_err(ReplaceError::StagingRead)?;

    if content.len() != expected_len {
        return Err(ReplaceError::StagingRead(StorageError::DownloadFailed(
            format!(
                "staged object {} has {} bytes, expected {}",
                staging_key,
                content.len(),
                expected_len
            ),
        )));
    }

    tracing::debug!(
        stage = %ReplaceStage::StagingRead,
        staging_key = %staging_key,
        size_bytes = content.len(),
        "Read back staged content"
    );
    Ok(content)
}

/// Committer: overwrite the original object with the read-back content.
pub(crate) async fn commit(
    store: &dyn Storage,
    file_path: &str,
    content: Bytes,
    content_type: &str,
) -> Result<(), ReplaceError> {
    let size = content.len();
    store
        .put(file_path, content, content_type)
        .await
        .map_err(ReplaceError::Commit)?;

    tracing::info!(
        stage = %ReplaceStage::Commit,
        file_path = %file_path,
        size_bytes = size,
        "Committed new content over original object"
    );
    Ok(())
}

/// Metadata Updater: one conditional update keyed by id and version. Zero
/// affected rows is a failure.
pub(crate) async fn update_metadata(
    files: &dyn FileRecordStore,
    record: &FileRecord,
    update: &FileContentUpdate,
) -> Result<FileRecord, ReplaceError> {
    match files.update_content(&record.id, update, record.version).await {
        Ok(Some(updated)) => {
            tracing::info!(
                stage = %ReplaceStage::MetadataUpdate,
                version = updated.version,
                "Metadata updated"
            );
            Ok(updated)
        }
        Ok(None) => Err(ReplaceError::MetadataUpdate(MetadataUpdateFailure::ZeroRows {
            file_id: record.id.clone(),
            expected_version: record.version,
        })),
        Err(e) => Err(ReplaceError::MetadataUpdate(MetadataUpdateFailure::Store(e))),
    }
}

/// Cleanup: best-effort removal of the staging object. Never fails the
/// operation.
pub(crate) async fn cleanup(store: &dyn Storage, staging_key: &str) {
    match store.delete(&[staging_key.to_string()]).await {
        Ok(()) => tracing::debug!(
            stage = %ReplaceStage::Cleanup,
            staging_key = %staging_key,
            "Removed staging object"
        ),
        Err(e) => tracing::warn!(
            stage = %ReplaceStage::Cleanup,
            staging_key = %staging_key,
            error = %e,
            "Failed to remove staging object; the sweeper will reclaim it"
        ),
    }
}
