//! File content replacement.
//!
//! A replace runs strictly in order: authorize, validate, open an intent,
//! stage the new bytes, read them back, overwrite the original object, update
//! the metadata row, then remove the staging object. Rejections happen before
//! any storage call. Once a staging object exists, every outcome ends with a
//! best-effort cleanup.

mod error;
mod stages;

pub use error::{MetadataUpdateFailure, ReplaceError};

use bytes::Bytes;
use chrono::Utc;
use folio_core::models::{
    Actor, FileContentUpdate, FileRecord, IntentStatus, NewReplaceIntent, ReplaceIntent,
    ReplaceStage, ReplacedFile,
};
use folio_core::{AppError, AuthError, ReplaceValidator, ValidatedName};
use folio_db::{FileRecordStore, ReplaceIntentStore};
use folio_storage::{is_staging_key, new_staging_token, staging_key, Storage, StoragePool};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::access::AuthorizationGate;

/// One replace call: who is asking, which file, and the new content
#[derive(Debug, Clone)]
pub struct ReplaceRequest {
    pub actor: Actor,
    pub file_id: String,
    pub bytes: Bytes,
    pub declared_name: String,
    pub declared_type: String,
    pub correlation_id: Option<String>,
}

#[derive(Clone)]
pub struct FileReplaceService {
    files: Arc<dyn FileRecordStore>,
    intents: Arc<dyn ReplaceIntentStore>,
    storage: StoragePool,
    gate: Arc<dyn AuthorizationGate>,
    validator: ReplaceValidator,
}

impl FileReplaceService {
    pub fn new(
        files: Arc<dyn FileRecordStore>,
        intents: Arc<dyn ReplaceIntentStore>,
        storage: StoragePool,
        gate: Arc<dyn AuthorizationGate>,
        validator: ReplaceValidator,
    ) -> Self {
        Self {
            files,
            intents,
            storage,
            gate,
            validator,
        }
    }

    pub fn max_file_size(&self) -> usize {
        self.validator.max_file_size()
    }

    /// Ask the authorization gate whether `actor` may replace `file_id`.
    /// Lets callers refuse before reading the upload; `replace` checks again.
    pub async fn check_access(&self, actor: &Actor, file_id: &str) -> Result<(), ReplaceError> {
        self.authorize(actor, file_id).await
    }

    /// Replace the content of `request.file_id` in place.
    ///
    /// On success the object at the record's `file_path` holds the new bytes,
    /// the metadata row describes them and the staging object is gone.
    pub async fn replace(&self, request: ReplaceRequest) -> Result<ReplacedFile, ReplaceError> {
        let span = tracing::info_span!(
            "file_replace",
            file_id = %request.file_id,
            correlation_id = request.correlation_id.as_deref().unwrap_or("-"),
            user_id = %request.actor.user_id,
        );

        async move {
            let started = Instant::now();
            let result = self.run(request).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match &result {
                Ok(replaced) => tracing::info!(
                    stage = %ReplaceStage::Done,
                    version = replaced.version,
                    size_bytes = replaced.file_size,
                    duration_ms,
                    "File content replaced"
                ),
                Err(e @ (ReplaceError::Auth(_)
                | ReplaceError::Validation(_)
                | ReplaceError::NotFound(_)
                | ReplaceError::Conflict(_))) => tracing::info!(
                    stage = %e.stage(),
                    error = %e,
                    duration_ms,
                    "Replace rejected"
                ),
                Err(e) => tracing::error!(
                    stage = %e.stage(),
                    error = %e,
                    blob_may_have_changed = e.blob_may_have_changed(),
                    duration_ms,
                    "Replace failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: ReplaceRequest) -> Result<ReplacedFile, ReplaceError> {
        let ReplaceRequest {
            actor,
            file_id,
            bytes,
            declared_name,
            declared_type,
            correlation_id,
        } = request;

        self.authorize(&actor, &file_id).await?;

        let validated = self
            .validator
            .validate(&declared_name, &declared_type, bytes.len())?;

        let record = self.load_record(&file_id).await?;
        let store = self
            .storage
            .bucket(&record.storage_bucket)
            .map_err(|e| unavailable(ReplaceStage::Intent, e.into()))?;

        let staging_key = staging_key(&record.id, &new_staging_token());
        let intent = self
            .open_intent(&record, &validated, &staging_key, bytes.len(), correlation_id)
            .await?;

        let size = bytes.len();
        if let Err(e) =
            stages::write_staging(store.as_ref(), &staging_key, bytes, &validated.content_type)
                .await
        {
            self.fail_before_commit(&intent, &e).await;
            return Err(e);
        }

        let result = self
            .commit_staged(store.as_ref(), &record, &validated, &staging_key, size, &intent)
            .await;

        stages::cleanup(store.as_ref(), &staging_key).await;

        result
    }

    /// Stages after the staging write. The caller always runs cleanup.
    async fn commit_staged(
        &self,
        store: &dyn Storage,
        record: &FileRecord,
        validated: &ValidatedName,
        staging_key: &str,
        size: usize,
        intent: &ReplaceIntent,
    ) -> Result<ReplacedFile, ReplaceError> {
        let intent_id = intent.id;
        let content = match stages::read_staging(store, staging_key, size).await {
            Ok(content) => content,
            Err(e) => {
                self.fail_before_commit(intent, &e).await;
                return Err(e);
            }
        };

        if let Err(e) =
            stages::commit(store, &record.file_path, content, &validated.content_type).await
        {
            self.fail_before_commit(intent, &e).await;
            return Err(e);
        }

        // From here the object holds the new bytes. `status` tracks what the
        // intent log actually recorded so later transitions start from it.
        let status = if self
            .mark(intent_id, IntentStatus::Pending, IntentStatus::BlobCommitted, None)
            .await
        {
            IntentStatus::BlobCommitted
        } else {
            IntentStatus::Pending
        };

        let update = FileContentUpdate {
            file_name: validated.file_name.clone(),
            file_type: validated.content_type.clone(),
            file_size: size as i64,
            updated_at: Utc::now(),
        };

        let updated = match stages::update_metadata(self.files.as_ref(), record, &update).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::error!(
                    stage = %ReplaceStage::MetadataUpdate,
                    file_path = %record.file_path,
                    intent_id = %intent_id,
                    error = %e,
                    "Original object overwritten but metadata still describes the old content"
                );
                // Intent stays blob_committed so the reconciler or a resubmit
                // can finish it
                if !self
                    .mark(intent_id, status, IntentStatus::BlobCommitted, Some(&e))
                    .await
                {
                    tracing::error!(
                        stage = %ReplaceStage::MetadataUpdate,
                        intent_id = %intent_id,
                        file_id = %record.id,
                        file_path = %record.file_path,
                        "Intent log does not record the committed object; metadata must be repaired by hand"
                    );
                }
                return Err(e);
            }
        };

        self.mark(intent_id, status, IntentStatus::Done, None).await;

        Ok(ReplacedFile::from_record(
            &updated,
            store.public_url(&updated.file_path),
        ))
    }

    async fn authorize(&self, actor: &Actor, file_id: &str) -> Result<(), ReplaceError> {
        match self.gate.is_authorized(actor, file_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::Forbidden(format!(
                "{} may not replace file {}",
                actor.user_id, file_id
            ))
            .into()),
            Err(AppError::NotFound(_)) => Err(ReplaceError::NotFound(file_id.to_string())),
            Err(e) => Err(unavailable(ReplaceStage::Authorizing, e)),
        }
    }

    async fn load_record(&self, file_id: &str) -> Result<FileRecord, ReplaceError> {
        let record = self
            .files
            .get(file_id)
            .await
            .map_err(|e| unavailable(ReplaceStage::Intent, e))?
            .ok_or_else(|| ReplaceError::NotFound(file_id.to_string()))?;

        if is_staging_key(&record.file_path) {
            return Err(unavailable(
                ReplaceStage::Intent,
                AppError::Internal(format!(
                    "file {} points at staging object {}",
                    record.id, record.file_path
                )),
            ));
        }

        Ok(record)
    }

    async fn open_intent(
        &self,
        record: &FileRecord,
        validated: &ValidatedName,
        staging_key: &str,
        size: usize,
        correlation_id: Option<String>,
    ) -> Result<ReplaceIntent, ReplaceError> {
        let intent = self
            .intents
            .begin(NewReplaceIntent {
                file_id: record.id.clone(),
                storage_bucket: record.storage_bucket.clone(),
                file_path: record.file_path.clone(),
                staging_key: staging_key.to_string(),
                new_file_name: validated.file_name.clone(),
                new_file_type: validated.content_type.clone(),
                new_file_size: size as i64,
                expected_version: record.version,
                correlation_id,
            })
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => ReplaceError::Conflict(record.id.clone()),
                other => unavailable(ReplaceStage::Intent, other),
            })?;

        tracing::debug!(
            stage = %ReplaceStage::Intent,
            intent_id = %intent.id,
            staging_key = %staging_key,
            supersedes = ?intent.supersedes,
            "Replace intent opened"
        );

        Ok(intent)
    }

    /// The object was never overwritten: close this intent and hand any lease
    /// taken over at `begin` back to the intent it came from, whose committed
    /// object still disagrees with the metadata.
    async fn fail_before_commit(&self, intent: &ReplaceIntent, error: &ReplaceError) {
        let failed = self
            .mark(intent.id, IntentStatus::Pending, IntentStatus::Failed, Some(error))
            .await;

        let Some(previous) = intent.supersedes else {
            return;
        };

        if failed
            && self
                .mark(previous, IntentStatus::Superseded, IntentStatus::BlobCommitted, None)
                .await
        {
            tracing::info!(
                intent_id = %intent.id,
                restored_intent_id = %previous,
                "Returned lease to the earlier committed replace"
            );
        } else {
            tracing::error!(
                intent_id = %intent.id,
                superseded_intent_id = %previous,
                "Earlier committed replace is no longer tracked; metadata must be repaired by hand"
            );
        }
    }

    /// Record an intent transition and report whether it landed. Failures
    /// here are logged and never change the outcome of the replace.
    async fn mark(
        &self,
        intent_id: Uuid,
        from: IntentStatus,
        to: IntentStatus,
        error: Option<&ReplaceError>,
    ) -> bool {
        let last_error = error.map(|e| e.to_string());
        match self.intents.mark(intent_id, from, to, last_error).await {
            Ok(true) => return true,
            Ok(false) => tracing::warn!(
                intent_id = %intent_id,
                from = %from,
                to = %to,
                "Replace intent was not in the expected state"
            ),
            Err(e) => tracing::warn!(
                intent_id = %intent_id,
                from = %from,
                to = %to,
                error = %e,
                "Failed to record replace intent transition"
            ),
        }
        false
    }
}

fn unavailable(stage: ReplaceStage, source: AppError) -> ReplaceError {
    ReplaceError::Unavailable { stage, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        actor, file_record, FailOn, InMemoryFileRecords, InMemoryIntents, MockStorage,
        StaticGate, StorageOp,
    };
    use folio_core::models::UserRole;
    use folio_core::ValidationError;
    use folio_storage::{StorageError, STAGING_PREFIX};

    const FILE_ID: &str = "file_123";
    const FILE_PATH: &str = "documents/file_123_old_file.pdf";
    const NEW_CONTENT: &[u8] = b"%PDF-1.7 new";

    struct Harness {
        storage: MockStorage,
        files: InMemoryFileRecords,
        intents: InMemoryIntents,
        service: FileReplaceService,
    }

    fn harness_with_gate(allowed: bool) -> Harness {
        let storage = MockStorage::new("documents");
        storage.insert_object(FILE_PATH, b"%PDF-1.4 old", Utc::now());

        let files = InMemoryFileRecords::new();
        files.insert(file_record(FILE_ID, FILE_PATH));

        let intents = InMemoryIntents::new();
        let validator = ReplaceValidator::new(
            1024,
            vec!["pdf".into(), "png".into()],
            vec!["application/pdf".into(), "image/png".into()],
        );

        let service = FileReplaceService::new(
            Arc::new(files.clone()),
            Arc::new(intents.clone()),
            StoragePool::new(Arc::new(storage.clone())),
            Arc::new(StaticGate(allowed)),
            validator,
        );

        Harness {
            storage,
            files,
            intents,
            service,
        }
    }

    fn harness() -> Harness {
        harness_with_gate(true)
    }

    fn request(name: &str, content_type: &str, bytes: &[u8]) -> ReplaceRequest {
        ReplaceRequest {
            actor: actor("user_1", UserRole::Editor, &[]),
            file_id: FILE_ID.to_string(),
            bytes: Bytes::copy_from_slice(bytes),
            declared_name: name.to_string(),
            declared_type: content_type.to_string(),
            correlation_id: Some("req-1".to_string()),
        }
    }

    fn pdf_request() -> ReplaceRequest {
        request("new_file.pdf", "application/pdf", NEW_CONTENT)
    }

    fn staged_key(ops: &[StorageOp]) -> String {
        match ops.first() {
            Some(StorageOp::Put(key)) => key.clone(),
            other => panic!("expected a staging put first, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn successful_replace_runs_stages_in_order() {
        let h = harness();

        let replaced = h.service.replace(pdf_request()).await.unwrap();

        let ops = h.storage.ops();
        let staging = staged_key(&ops);
        assert!(staging.starts_with(STAGING_PREFIX));
        assert_eq!(
            ops,
            vec![
                StorageOp::Put(staging.clone()),
                StorageOp::Get(staging.clone()),
                StorageOp::Put(FILE_PATH.to_string()),
                StorageOp::Delete(vec![staging.clone()]),
            ]
        );

        assert_eq!(h.storage.object(FILE_PATH).unwrap().as_ref(), NEW_CONTENT);
        assert!(h.storage.object(&staging).is_none());

        let record = h.files.record(FILE_ID).unwrap();
        assert_eq!(record.file_name, "new_file.pdf");
        assert_eq!(record.file_type, "application/pdf");
        assert_eq!(record.file_size, NEW_CONTENT.len() as i64);
        assert_eq!(record.file_path, FILE_PATH);
        assert_eq!(record.version, 1);

        assert_eq!(replaced.id, FILE_ID);
        assert_eq!(replaced.version, 1);
        assert_eq!(replaced.url, format!("https://files.test/documents/{}", FILE_PATH));

        let intents = h.intents.all();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].status, IntentStatus::Done);
        assert_eq!(intents[0].staging_key, staging);
        assert_eq!(intents[0].correlation_id.as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn staging_write_failure_touches_nothing_else() {
        let h = harness();
        h.storage.fail_on(FailOn::StagingPut);

        let err = h.service.replace(pdf_request()).await.unwrap_err();
        assert!(matches!(err, ReplaceError::StagingWrite(_)));

        let ops = h.storage.ops();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], StorageOp::Put(key) if key.starts_with(STAGING_PREFIX)));
        assert!(!ops.iter().any(|op| matches!(op, StorageOp::Put(k) if k == FILE_PATH)));

        assert_eq!(h.storage.object(FILE_PATH).unwrap().as_ref(), b"%PDF-1.4 old");
        assert!(h.files.update_calls().is_empty());
        assert_eq!(h.intents.all()[0].status, IntentStatus::Failed);
    }

    #[tokio::test]
    async fn metadata_failure_after_commit_still_cleans_up() {
        let h = harness();
        h.files.fail_updates();

        let err = h.service.replace(pdf_request()).await.unwrap_err();
        assert!(matches!(
            err,
            ReplaceError::MetadataUpdate(MetadataUpdateFailure::Store(_))
        ));
        assert!(err.blob_may_have_changed());

        let ops = h.storage.ops();
        let staging = staged_key(&ops);
        assert_eq!(ops.last(), Some(&StorageOp::Delete(vec![staging])));

        // The inconsistency window: new blob, old metadata
        assert_eq!(h.storage.object(FILE_PATH).unwrap().as_ref(), NEW_CONTENT);
        assert_eq!(h.files.record(FILE_ID).unwrap().file_name, "old_file.pdf");

        let intent = &h.intents.all()[0];
        assert_eq!(intent.status, IntentStatus::BlobCommitted);
        assert!(intent.last_error.is_some());
    }

    #[tokio::test]
    async fn resubmit_after_metadata_failure_takes_over_the_lease() {
        let h = harness();
        h.files.fail_updates();
        h.service.replace(pdf_request()).await.unwrap_err();
        let failed = h.intents.all()[0].id;

        h.files.resume_updates();
        let replaced = h.service.replace(pdf_request()).await.unwrap();

        assert_eq!(replaced.file_name, "new_file.pdf");
        assert_eq!(replaced.version, 1);
        assert_eq!(h.storage.object(FILE_PATH).unwrap().as_ref(), NEW_CONTENT);

        let intents = h.intents.all();
        assert_eq!(intents.len(), 2);
        assert_eq!(h.intents.get(failed).unwrap().status, IntentStatus::Superseded);
        assert_eq!(intents[1].status, IntentStatus::Done);
        assert_eq!(intents[1].supersedes, Some(failed));
    }

    #[tokio::test]
    async fn takeover_is_handed_back_when_resubmit_fails_before_commit() {
        let h = harness();
        h.files.fail_updates();
        h.service.replace(pdf_request()).await.unwrap_err();
        let failed = h.intents.all()[0].id;

        h.storage.fail_on(FailOn::StagingPut);
        h.service.replace(pdf_request()).await.unwrap_err();

        let intents = h.intents.all();
        assert_eq!(
            h.intents.get(failed).unwrap().status,
            IntentStatus::BlobCommitted
        );
        assert_eq!(intents[1].status, IntentStatus::Failed);
        assert_eq!(intents[1].supersedes, Some(failed));
    }

    #[tokio::test]
    async fn committed_intent_without_reported_failure_keeps_the_lease() {
        let h = harness();
        h.intents.insert(InMemoryIntents::intent(
            FILE_ID,
            FILE_PATH,
            "_staging/file_123/crashed",
            IntentStatus::BlobCommitted,
            Utc::now(),
        ));

        let err = h.service.replace(pdf_request()).await.unwrap_err();
        assert!(matches!(err, ReplaceError::Conflict(_)));
        assert!(h.storage.ops().is_empty());
    }

    /// Intent log whose first `pending -> blob_committed` transition errors
    struct LosesFirstCommitMark {
        inner: InMemoryIntents,
        lost: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl ReplaceIntentStore for LosesFirstCommitMark {
        async fn begin(&self, intent: NewReplaceIntent) -> Result<ReplaceIntent, AppError> {
            self.inner.begin(intent).await
        }

        async fn mark(
            &self,
            id: Uuid,
            from: IntentStatus,
            to: IntentStatus,
            last_error: Option<String>,
        ) -> Result<bool, AppError> {
            let first_commit_mark = from == IntentStatus::Pending
                && to == IntentStatus::BlobCommitted
                && !self.lost.swap(true, std::sync::atomic::Ordering::SeqCst);
            if first_commit_mark {
                return Err(AppError::Internal("connection reset".to_string()));
            }
            self.inner.mark(id, from, to, last_error).await
        }

        async fn list_open(
            &self,
            status: IntentStatus,
            older_than: chrono::DateTime<Utc>,
        ) -> Result<Vec<ReplaceIntent>, AppError> {
            self.inner.list_open(status, older_than).await
        }
    }

    #[tokio::test]
    async fn lost_commit_mark_is_recorded_when_metadata_fails() {
        let h = harness();
        h.files.fail_updates();
        let service = FileReplaceService::new(
            Arc::new(h.files.clone()),
            Arc::new(LosesFirstCommitMark {
                inner: h.intents.clone(),
                lost: std::sync::atomic::AtomicBool::new(false),
            }),
            StoragePool::new(Arc::new(h.storage.clone())),
            Arc::new(StaticGate(true)),
            ReplaceValidator::new(1024, vec!["pdf".into()], vec!["application/pdf".into()]),
        );

        service.replace(pdf_request()).await.unwrap_err();

        assert_eq!(h.storage.object(FILE_PATH).unwrap().as_ref(), NEW_CONTENT);
        let intent = &h.intents.all()[0];
        assert_eq!(intent.status, IntentStatus::BlobCommitted);
        assert!(intent.last_error.is_some());

        // The reconciler can now close the gap instead of abandoning the intent
        h.files.resume_updates();
        let reconciler = crate::IntentReconciler::new(
            Arc::new(h.files.clone()),
            Arc::new(h.intents.clone()),
            StoragePool::new(Arc::new(h.storage.clone())),
            std::time::Duration::from_secs(900),
            std::time::Duration::from_secs(300),
        );
        let report = reconciler
            .reconcile_once(Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(report.completed, 1);
        assert_eq!(report.abandoned, 0);
        assert_eq!(h.files.record(FILE_ID).unwrap().file_name, "new_file.pdf");
        assert_eq!(h.intents.all()[0].status, IntentStatus::Done);
    }

    #[tokio::test]
    async fn lost_commit_mark_still_finishes_a_successful_replace() {
        let h = harness();
        let service = FileReplaceService::new(
            Arc::new(h.files.clone()),
            Arc::new(LosesFirstCommitMark {
                inner: h.intents.clone(),
                lost: std::sync::atomic::AtomicBool::new(false),
            }),
            StoragePool::new(Arc::new(h.storage.clone())),
            Arc::new(StaticGate(true)),
            ReplaceValidator::new(1024, vec!["pdf".into()], vec!["application/pdf".into()]),
        );

        service.replace(pdf_request()).await.unwrap();

        assert_eq!(h.intents.all()[0].status, IntentStatus::Done);
    }

    #[tokio::test]
    async fn zero_rows_updated_is_a_failure() {
        let h = harness();
        let service = FileReplaceService::new(
            Arc::new(VersionRacer {
                inner: h.files.clone(),
            }),
            Arc::new(h.intents.clone()),
            StoragePool::new(Arc::new(h.storage.clone())),
            Arc::new(StaticGate(true)),
            ReplaceValidator::new(1024, vec!["pdf".into()], vec!["application/pdf".into()]),
        );

        let err = service.replace(pdf_request()).await.unwrap_err();
        assert!(matches!(
            err,
            ReplaceError::MetadataUpdate(MetadataUpdateFailure::ZeroRows {
                expected_version: 0,
                ..
            })
        ));

        let ops = h.storage.ops();
        let staging = staged_key(&ops);
        assert_eq!(ops.last(), Some(&StorageOp::Delete(vec![staging])));
        assert_eq!(h.files.record(FILE_ID).unwrap().file_name, "old_file.pdf");
        assert_eq!(h.intents.all()[0].status, IntentStatus::BlobCommitted);
    }

    /// Metadata store that lets another writer bump the version right before
    /// every conditional update.
    struct VersionRacer {
        inner: InMemoryFileRecords,
    }

    #[async_trait::async_trait]
    impl FileRecordStore for VersionRacer {
        async fn get(&self, id: &str) -> Result<Option<FileRecord>, AppError> {
            self.inner.get(id).await
        }

        async fn update_content(
            &self,
            id: &str,
            update: &FileContentUpdate,
            expected_version: i64,
        ) -> Result<Option<FileRecord>, AppError> {
            self.inner.bump_version(id);
            self.inner.update_content(id, update, expected_version).await
        }
    }

    #[tokio::test]
    async fn staging_read_failure_cleans_up_and_leaves_original() {
        let h = harness();
        h.storage.fail_on(FailOn::Get);

        let err = h.service.replace(pdf_request()).await.unwrap_err();
        assert!(matches!(err, ReplaceError::StagingRead(_)));

        let ops = h.storage.ops();
        let staging = staged_key(&ops);
        assert_eq!(
            ops,
            vec![
                StorageOp::Put(staging.clone()),
                StorageOp::Get(staging.clone()),
                StorageOp::Delete(vec![staging]),
            ]
        );
        assert_eq!(h.storage.object(FILE_PATH).unwrap().as_ref(), b"%PDF-1.4 old");
        assert_eq!(h.intents.all()[0].status, IntentStatus::Failed);
    }

    #[tokio::test]
    async fn truncated_read_back_is_rejected_before_commit() {
        let h = harness();
        h.storage.fail_on(FailOn::TruncatedGet);

        let err = h.service.replace(pdf_request()).await.unwrap_err();
        assert!(matches!(
            err,
            ReplaceError::StagingRead(StorageError::DownloadFailed(_))
        ));
        assert!(!h
            .storage
            .ops()
            .iter()
            .any(|op| matches!(op, StorageOp::Put(k) if k == FILE_PATH)));
        assert!(h.files.update_calls().is_empty());
    }

    #[tokio::test]
    async fn commit_failure_cleans_up_and_skips_metadata() {
        let h = harness();
        h.storage.fail_on(FailOn::CommitPut);

        let err = h.service.replace(pdf_request()).await.unwrap_err();
        assert!(matches!(err, ReplaceError::Commit(_)));
        assert!(!err.blob_may_have_changed());

        let ops = h.storage.ops();
        let staging = staged_key(&ops);
        assert_eq!(ops.last(), Some(&StorageOp::Delete(vec![staging])));
        assert_eq!(h.storage.object(FILE_PATH).unwrap().as_ref(), b"%PDF-1.4 old");
        assert!(h.files.update_calls().is_empty());
        assert_eq!(h.intents.all()[0].status, IntentStatus::Failed);
    }

    #[tokio::test]
    async fn cleanup_failure_does_not_change_outcome() {
        let h = harness();
        h.storage.fail_on(FailOn::Delete);

        let replaced = h.service.replace(pdf_request()).await.unwrap();
        assert_eq!(replaced.version, 1);

        let ops = h.storage.ops();
        let staging = staged_key(&ops);
        assert_eq!(ops.last(), Some(&StorageOp::Delete(vec![staging.clone()])));
        // Orphan left for the sweeper
        assert!(h.storage.object(&staging).is_some());
        assert_eq!(h.intents.all()[0].status, IntentStatus::Done);
    }

    #[tokio::test]
    async fn path_traversal_is_rejected_without_storage_calls() {
        let h = harness();

        let err = h
            .service
            .replace(request("../../../etc/passwd.pdf", "application/pdf", NEW_CONTENT))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReplaceError::Validation(ValidationError::PathTraversal(_))
        ));
        assert!(h.storage.ops().is_empty());
        assert!(h.intents.all().is_empty());
    }

    #[tokio::test]
    async fn disallowed_type_is_rejected_without_storage_calls() {
        let h = harness();

        let err = h
            .service
            .replace(request("payload.exe", "application/x-msdownload", NEW_CONTENT))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReplaceError::Validation(ValidationError::InvalidType(_))
        ));
        assert!(h.storage.ops().is_empty());
    }

    #[tokio::test]
    async fn oversized_and_empty_uploads_are_rejected() {
        let h = harness();

        let big = vec![0u8; 1025];
        let err = h
            .service
            .replace(request("new_file.pdf", "application/pdf", &big))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReplaceError::Validation(ValidationError::InvalidSize { size: 1025, max: 1024 })
        ));

        let err = h
            .service
            .replace(request("new_file.pdf", "application/pdf", b""))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReplaceError::Validation(ValidationError::InvalidSize { size: 0, .. })
        ));

        assert!(h.storage.ops().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_actor_is_rejected_before_validation() {
        let h = harness_with_gate(false);

        // Invalid name too; authorization is checked first
        let err = h
            .service
            .replace(request("../evil.exe", "application/pdf", NEW_CONTENT))
            .await
            .unwrap_err();

        assert!(matches!(err, ReplaceError::Auth(AuthError::Forbidden(_))));
        assert!(h.storage.ops().is_empty());
        assert!(h.intents.all().is_empty());
    }

    #[tokio::test]
    async fn unknown_file_is_not_found() {
        let h = harness();
        let mut req = pdf_request();
        req.file_id = "file_999".to_string();

        let err = h.service.replace(req).await.unwrap_err();
        assert!(matches!(err, ReplaceError::NotFound(id) if id == "file_999"));
        assert!(h.storage.ops().is_empty());
    }

    #[tokio::test]
    async fn open_intent_blocks_concurrent_replace() {
        let h = harness();
        h.intents.insert(InMemoryIntents::intent(
            FILE_ID,
            FILE_PATH,
            "_staging/file_123/abc",
            IntentStatus::Pending,
            Utc::now(),
        ));

        let err = h.service.replace(pdf_request()).await.unwrap_err();
        assert!(matches!(err, ReplaceError::Conflict(id) if id == FILE_ID));
        assert!(h.storage.ops().is_empty());
        assert_eq!(h.files.record(FILE_ID).unwrap().version, 0);
    }

    #[tokio::test]
    async fn intent_log_outage_fails_before_storage() {
        let h = harness();
        h.intents.fail_begin();

        let err = h.service.replace(pdf_request()).await.unwrap_err();
        assert!(matches!(
            err,
            ReplaceError::Unavailable {
                stage: ReplaceStage::Intent,
                ..
            }
        ));
        assert!(h.storage.ops().is_empty());
    }

    #[tokio::test]
    async fn sequential_replaces_each_get_a_fresh_staging_key() {
        let h = harness();

        h.service.replace(pdf_request()).await.unwrap();
        let first = staged_key(&h.storage.ops());
        h.storage.clear_ops();

        let replaced = h
            .service
            .replace(request("newer.pdf", "application/pdf", b"%PDF-1.7 newer"))
            .await
            .unwrap();
        let second = staged_key(&h.storage.ops());

        assert_ne!(first, second);
        assert_eq!(replaced.version, 2);
        assert_eq!(replaced.file_name, "newer.pdf");
        assert!(h
            .storage
            .keys()
            .iter()
            .all(|k| !k.starts_with(STAGING_PREFIX)));
    }
}
