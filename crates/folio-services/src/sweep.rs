//! Periodic removal of orphaned staging objects.
//!
//! Per-request cleanup misses staging objects left behind by a crashed
//! process or a failed delete. The sweeper lists the staging namespace of
//! every bucket and deletes whatever is older than the TTL and not referenced
//! by an open replace intent.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use folio_core::models::IntentStatus;
use folio_core::AppError;
use folio_db::ReplaceIntentStore;
use folio_storage::{StoragePool, STAGING_PREFIX};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Counts from one sweep over all buckets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
    /// Expired objects kept because an open intent still references them
    pub protected: usize,
    pub failed: usize,
}

pub struct StagingSweeper {
    storage: StoragePool,
    intents: Arc<dyn ReplaceIntentStore>,
    ttl: ChronoDuration,
    interval: Duration,
}

impl StagingSweeper {
    pub fn new(
        storage: StoragePool,
        intents: Arc<dyn ReplaceIntentStore>,
        ttl: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            storage,
            intents,
            ttl: ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX),
            interval,
        }
    }

    /// Start the background sweep loop.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval = interval(self.interval);

            loop {
                sweep_interval.tick().await;

                match self.sweep_once(Utc::now()).await {
                    Ok(report) if report.deleted > 0 || report.failed > 0 => tracing::info!(
                        scanned = report.scanned,
                        deleted = report.deleted,
                        protected = report.protected,
                        failed = report.failed,
                        "Staging sweep completed"
                    ),
                    Ok(report) => tracing::debug!(
                        scanned = report.scanned,
                        protected = report.protected,
                        "Staging sweep found nothing to delete"
                    ),
                    Err(e) => tracing::error!(error = %e, "Staging sweep failed"),
                }
            }
        })
    }

    /// Delete staging objects last modified more than the TTL before `now`.
    #[tracing::instrument(skip(self), fields(sweep.prefix = STAGING_PREFIX))]
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        let cutoff = now - self.ttl;
        let protected_keys = self.open_staging_keys().await?;
        let mut report = SweepReport::default();

        for store in self.storage.stores() {
            let objects = match store.list(STAGING_PREFIX).await {
                Ok(objects) => objects,
                Err(e) => {
                    tracing::error!(
                        bucket = %store.bucket(),
                        error = %e,
                        "Failed to list staging objects"
                    );
                    continue;
                }
            };

            report.scanned += objects.len();

            let mut expired = Vec::new();
            for object in objects {
                if object.last_modified >= cutoff {
                    continue;
                }
                if protected_keys.contains(&object.key) {
                    report.protected += 1;
                    continue;
                }
                expired.push(object.key);
            }

            if expired.is_empty() {
                continue;
            }

            match store.delete(&expired).await {
                Ok(()) => {
                    tracing::info!(
                        bucket = %store.bucket(),
                        count = expired.len(),
                        "Deleted orphaned staging objects"
                    );
                    report.deleted += expired.len();
                }
                Err(e) => {
                    tracing::warn!(
                        bucket = %store.bucket(),
                        count = expired.len(),
                        error = %e,
                        "Failed to delete orphaned staging objects"
                    );
                    report.failed += expired.len();
                }
            }
        }

        Ok(report)
    }

    /// Staging keys of every intent still holding its file's lease
    async fn open_staging_keys(&self) -> Result<HashSet<String>, AppError> {
        let mut keys = HashSet::new();
        for status in [IntentStatus::Pending, IntentStatus::BlobCommitted] {
            let open = self
                .intents
                .list_open(status, DateTime::<Utc>::MAX_UTC)
                .await?;
            keys.extend(open.into_iter().map(|intent| intent.staging_key));
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailOn, InMemoryIntents, MockStorage};

    const TTL: Duration = Duration::from_secs(3600);

    fn sweeper(stores: &[&MockStorage], intents: &InMemoryIntents) -> StagingSweeper {
        let mut pool = StoragePool::new(Arc::new(stores[0].clone()));
        for store in &stores[1..] {
            pool = pool.with_store(Arc::new((*store).clone()));
        }
        StagingSweeper::new(pool, Arc::new(intents.clone()), TTL, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn deletes_only_expired_staging_objects() {
        let now = Utc::now();
        let storage = MockStorage::new("documents");
        storage.insert_object("_staging/file_1/old", b"x", now - ChronoDuration::hours(2));
        storage.insert_object("_staging/file_2/fresh", b"x", now - ChronoDuration::minutes(5));
        storage.insert_object("documents/file_1_a.pdf", b"x", now - ChronoDuration::days(30));

        let report = sweeper(&[&storage], &InMemoryIntents::new())
            .sweep_once(now)
            .await
            .unwrap();

        assert_eq!(
            report,
            SweepReport {
                scanned: 2,
                deleted: 1,
                protected: 0,
                failed: 0
            }
        );
        assert_eq!(
            storage.keys(),
            vec!["_staging/file_2/fresh", "documents/file_1_a.pdf"]
        );
    }

    #[tokio::test]
    async fn keeps_objects_referenced_by_open_intents() {
        let now = Utc::now();
        let old = now - ChronoDuration::hours(2);
        let storage = MockStorage::new("documents");
        storage.insert_object("_staging/file_1/held", b"x", old);
        storage.insert_object("_staging/file_2/done", b"x", old);

        let intents = InMemoryIntents::new();
        intents.insert(InMemoryIntents::intent(
            "file_1",
            "documents/file_1_a.pdf",
            "_staging/file_1/held",
            IntentStatus::BlobCommitted,
            old,
        ));
        intents.insert(InMemoryIntents::intent(
            "file_2",
            "documents/file_2_b.pdf",
            "_staging/file_2/done",
            IntentStatus::Done,
            old,
        ));

        let report = sweeper(&[&storage], &intents).sweep_once(now).await.unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.protected, 1);
        assert_eq!(storage.keys(), vec!["_staging/file_1/held"]);
    }

    #[tokio::test]
    async fn sweeps_every_bucket_and_survives_failures() {
        let now = Utc::now();
        let old = now - ChronoDuration::hours(2);

        let documents = MockStorage::new("documents");
        documents.insert_object("_staging/file_1/a", b"x", old);
        documents.fail_on(FailOn::Delete);

        let attachments = MockStorage::new("attachments");
        attachments.insert_object("_staging/file_9/b", b"x", old);

        let broken = MockStorage::new("archive");
        broken.fail_on(FailOn::List);

        let report = sweeper(&[&documents, &attachments, &broken], &InMemoryIntents::new())
            .sweep_once(now)
            .await
            .unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 1);
        assert!(attachments.keys().is_empty());
        assert_eq!(documents.keys(), vec!["_staging/file_1/a"]);
    }
}
