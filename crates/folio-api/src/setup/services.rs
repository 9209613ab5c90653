//! Service wiring and background maintenance tasks

use crate::state::AppState;
use folio_core::{Config, ReplaceValidator};
use folio_db::{FileRecordRepository, FileRecordStore, ReplaceIntentRepository, ReplaceIntentStore};
use folio_services::{FileReplaceService, IntentReconciler, RecordAccessGate, StagingSweeper};
use folio_storage::StoragePool;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Handles of the periodic sweeper and reconciler
#[derive(Default)]
pub struct BackgroundTasks {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundTasks {
    fn push(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.handles.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop every task. Both loops are idempotent per tick, so aborting
    /// mid-pass is safe.
    pub fn shutdown(self) {
        for (name, handle) in self.handles {
            handle.abort();
            tracing::debug!(task = name, "Background task stopped");
        }
    }
}

/// Build repositories and services, then spawn the enabled maintenance loops
pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: StoragePool,
) -> (Arc<AppState>, BackgroundTasks) {
    let files: Arc<dyn FileRecordStore> = Arc::new(FileRecordRepository::new(pool.clone()));
    let intents: Arc<dyn ReplaceIntentStore> = Arc::new(ReplaceIntentRepository::new(pool));

    build(config, files, intents, storage)
}

/// Wire services over any metadata store and intent log
pub fn build(
    config: &Config,
    files: Arc<dyn FileRecordStore>,
    intents: Arc<dyn ReplaceIntentStore>,
    storage: StoragePool,
) -> (Arc<AppState>, BackgroundTasks) {
    let validator = ReplaceValidator::new(
        config.max_file_size_bytes(),
        config.allowed_extensions().to_vec(),
        config.allowed_content_types().to_vec(),
    );
    let gate = Arc::new(RecordAccessGate::new(files.clone()));

    let replace_service = FileReplaceService::new(
        files.clone(),
        intents.clone(),
        storage.clone(),
        gate,
        validator,
    );

    let mut background = BackgroundTasks::default();

    if config.staging_sweep_interval_secs() > 0 {
        let sweeper = Arc::new(StagingSweeper::new(
            storage.clone(),
            intents.clone(),
            Duration::from_secs(config.staging_ttl_secs()),
            Duration::from_secs(config.staging_sweep_interval_secs()),
        ));
        background.push("staging_sweeper", sweeper.start());
        tracing::info!(
            ttl_secs = config.staging_ttl_secs(),
            interval_secs = config.staging_sweep_interval_secs(),
            "Staging sweeper started"
        );
    } else {
        tracing::warn!("Staging sweeper disabled; orphaned staging objects will accumulate");
    }

    if config.reconcile_interval_secs() > 0 {
        let reconciler = Arc::new(IntentReconciler::new(
            files,
            intents,
            storage,
            Duration::from_secs(config.intent_stale_after_secs()),
            Duration::from_secs(config.reconcile_interval_secs()),
        ));
        background.push("intent_reconciler", reconciler.start());
        tracing::info!(
            stale_after_secs = config.intent_stale_after_secs(),
            interval_secs = config.reconcile_interval_secs(),
            "Intent reconciler started"
        );
    } else {
        tracing::warn!("Intent reconciler disabled; interrupted replaces stay open");
    }

    (Arc::new(AppState::new(replace_service)), background)
}
