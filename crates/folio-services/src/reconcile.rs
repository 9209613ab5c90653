//! Closes replace intents left open by a failed metadata update or a process
//! that died mid-replace.
//!
//! A `blob_committed` intent means the original object already holds the new
//! content while the metadata row may still describe the old one. The
//! reconciler re-applies the recorded metadata update under the recorded
//! version. The replace path records `blob_committed` even when the first
//! attempt to mark it fails, so a stale `pending` intent has no record of a
//! committed object (a double failure there is logged at error by the replace
//! path). Its staging object is dropped and the lease released, back to the
//! intent it took over if there was one.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use folio_core::models::{FileContentUpdate, IntentStatus, ReplaceIntent};
use folio_core::AppError;
use folio_db::{FileRecordStore, ReplaceIntentStore};
use folio_storage::StoragePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Counts from one reconcile pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// `blob_committed` intents whose metadata update now landed
    pub completed: usize,
    /// `blob_committed` intents whose record moved on; needs an operator
    pub superseded: usize,
    /// Stale `pending` intents released
    pub abandoned: usize,
    pub failed: usize,
}

enum Resolution {
    Completed,
    Superseded,
}

pub struct IntentReconciler {
    files: Arc<dyn FileRecordStore>,
    intents: Arc<dyn ReplaceIntentStore>,
    storage: StoragePool,
    stale_after: ChronoDuration,
    interval: Duration,
}

impl IntentReconciler {
    pub fn new(
        files: Arc<dyn FileRecordStore>,
        intents: Arc<dyn ReplaceIntentStore>,
        storage: StoragePool,
        stale_after: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            files,
            intents,
            storage,
            stale_after: ChronoDuration::from_std(stale_after).unwrap_or(ChronoDuration::MAX),
            interval,
        }
    }

    /// Start the background reconcile loop.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut reconcile_interval = interval(self.interval);

            loop {
                reconcile_interval.tick().await;

                match self.reconcile_once(Utc::now()).await {
                    Ok(report) if report == ReconcileReport::default() => {
                        tracing::debug!("No stale replace intents")
                    }
                    Ok(report) => tracing::info!(
                        completed = report.completed,
                        superseded = report.superseded,
                        abandoned = report.abandoned,
                        failed = report.failed,
                        "Replace intents reconciled"
                    ),
                    Err(e) => tracing::error!(error = %e, "Intent reconciliation failed"),
                }
            }
        })
    }

    /// Resolve every open intent last updated before `now - stale_after`.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_once(&self, now: DateTime<Utc>) -> Result<ReconcileReport, AppError> {
        let cutoff = now - self.stale_after;
        let mut report = ReconcileReport::default();

        let committed = self
            .intents
            .list_open(IntentStatus::BlobCommitted, cutoff)
            .await?;
        for intent in committed {
            match self.finish_committed(&intent, now).await {
                Ok(Some(Resolution::Completed)) => report.completed += 1,
                Ok(Some(Resolution::Superseded)) => report.superseded += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        intent_id = %intent.id,
                        file_id = %intent.file_id,
                        error = %e,
                        "Failed to re-apply metadata update"
                    );
                    report.failed += 1;
                    continue;
                }
            }
            self.remove_staging(&intent).await;
        }

        let pending = self.intents.list_open(IntentStatus::Pending, cutoff).await?;
        for intent in pending {
            match self
                .intents
                .mark(
                    intent.id,
                    IntentStatus::Pending,
                    IntentStatus::Abandoned,
                    Some("stale pending intent".to_string()),
                )
                .await
            {
                Ok(true) => {
                    tracing::warn!(
                        intent_id = %intent.id,
                        file_id = %intent.file_id,
                        staging_key = %intent.staging_key,
                        "Abandoned stale replace intent"
                    );
                    report.abandoned += 1;
                    if let Some(previous) = intent.supersedes {
                        self.restore_taken_over(&intent, previous).await;
                    }
                    self.remove_staging(&intent).await;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        intent_id = %intent.id,
                        error = %e,
                        "Failed to abandon replace intent"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Re-apply the recorded metadata update. `None` when the intent was
    /// resolved by someone else in the meantime.
    async fn finish_committed(
        &self,
        intent: &ReplaceIntent,
        now: DateTime<Utc>,
    ) -> Result<Option<Resolution>, AppError> {
        let update = FileContentUpdate {
            file_name: intent.new_file_name.clone(),
            file_type: intent.new_file_type.clone(),
            file_size: intent.new_file_size,
            updated_at: now,
        };

        let applied = self
            .files
            .update_content(&intent.file_id, &update, intent.expected_version)
            .await?;

        let (to, resolution, last_error) = match applied {
            Some(_) => (IntentStatus::Done, Resolution::Completed, None),
            None if self.already_applied(intent).await? => {
                (IntentStatus::Done, Resolution::Completed, None)
            }
            None => (
                IntentStatus::Superseded,
                Resolution::Superseded,
                Some(format!(
                    "record no longer at version {}",
                    intent.expected_version
                )),
            ),
        };

        if !self
            .intents
            .mark(intent.id, IntentStatus::BlobCommitted, to, last_error)
            .await?
        {
            return Ok(None);
        }

        match resolution {
            Resolution::Completed => tracing::info!(
                intent_id = %intent.id,
                file_id = %intent.file_id,
                "Completed interrupted replace"
            ),
            Resolution::Superseded => tracing::error!(
                intent_id = %intent.id,
                file_id = %intent.file_id,
                file_path = %intent.file_path,
                expected_version = intent.expected_version,
                "Object content and metadata diverged and the record has since changed"
            ),
        }

        Ok(Some(resolution))
    }

    /// The update landed on a previous attempt but the intent was never marked
    async fn already_applied(&self, intent: &ReplaceIntent) -> Result<bool, AppError> {
        Ok(self
            .files
            .get(&intent.file_id)
            .await?
            .is_some_and(|record| {
                record.version == intent.expected_version + 1
                    && record.file_name == intent.new_file_name
                    && record.file_type == intent.new_file_type
                    && record.file_size == intent.new_file_size
            }))
    }

    /// Give the lease back to the committed intent an abandoned resubmit took
    /// it from, so its metadata update is retried.
    async fn restore_taken_over(&self, intent: &ReplaceIntent, previous: uuid::Uuid) {
        match self
            .intents
            .mark(
                previous,
                IntentStatus::Superseded,
                IntentStatus::BlobCommitted,
                None,
            )
            .await
        {
            Ok(true) => tracing::info!(
                intent_id = %intent.id,
                restored_intent_id = %previous,
                "Returned lease to the earlier committed replace"
            ),
            Ok(false) => {}
            Err(e) => tracing::error!(
                intent_id = %intent.id,
                superseded_intent_id = %previous,
                error = %e,
                "Failed to return lease to the earlier committed replace"
            ),
        }
    }

    async fn remove_staging(&self, intent: &ReplaceIntent) {
        let result = match self.storage.bucket(&intent.storage_bucket) {
            Ok(store) => store
                .delete(&[intent.staging_key.clone()])
                .await
                .map_err(AppError::from),
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            tracing::warn!(
                intent_id = %intent.id,
                staging_key = %intent.staging_key,
                error = %e,
                "Failed to remove staging object; the sweeper will reclaim it"
            );
        }
    }
}
