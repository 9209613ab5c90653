//! In-memory metadata store, intent log and gate

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_core::models::{
    Actor, FileContentUpdate, FileRecord, IntentStatus, NewReplaceIntent, ReplaceIntent,
};
use folio_core::AppError;
use folio_db::{FileRecordStore, ReplaceIntentStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::access::AuthorizationGate;

/// In-memory file metadata with the same version compare-and-swap as Postgres
#[derive(Clone, Default)]
pub struct InMemoryFileRecords {
    records: Arc<Mutex<HashMap<String, FileRecord>>>,
    fail_updates: Arc<AtomicBool>,
    update_calls: Arc<Mutex<Vec<String>>>,
}

impl InMemoryFileRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: FileRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record);
    }

    pub fn record(&self, id: &str) -> Option<FileRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }

    /// Make every `update_content` return a database error
    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    /// Undo [`fail_updates`](Self::fail_updates)
    pub fn resume_updates(&self) {
        self.fail_updates.store(false, Ordering::SeqCst);
    }

    /// Bump a record's version as if another writer had updated it
    pub fn bump_version(&self, id: &str) {
        if let Some(record) = self.records.lock().unwrap().get_mut(id) {
            record.version += 1;
        }
    }

    /// Ids passed to `update_content`, in call order
    pub fn update_calls(&self) -> Vec<String> {
        self.update_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileRecordStore for InMemoryFileRecords {
    async fn get(&self, id: &str) -> Result<Option<FileRecord>, AppError> {
        Ok(self.record(id))
    }

    async fn update_content(
        &self,
        id: &str,
        update: &FileContentUpdate,
        expected_version: i64,
    ) -> Result<Option<FileRecord>, AppError> {
        self.update_calls.lock().unwrap().push(id.to_string());

        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(AppError::Internal("injected metadata update failure".to_string()));
        }

        let mut records = self.records.lock().unwrap();
        let Some(record) = records.get_mut(id) else {
            return Ok(None);
        };
        if record.version != expected_version {
            return Ok(None);
        }

        record.file_name = update.file_name.clone();
        record.file_type = update.file_type.clone();
        record.file_size = update.file_size;
        record.updated_at = update.updated_at;
        record.version += 1;
        Ok(Some(record.clone()))
    }
}

/// In-memory intent log enforcing one open intent per file
#[derive(Clone, Default)]
pub struct InMemoryIntents {
    intents: Arc<Mutex<Vec<ReplaceIntent>>>,
    fail_begin: Arc<AtomicBool>,
}

impl InMemoryIntents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<ReplaceIntent> {
        self.intents.lock().unwrap().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<ReplaceIntent> {
        self.intents
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }

    /// Seed an intent as-is, bypassing the open-intent check
    pub fn insert(&self, intent: ReplaceIntent) {
        self.intents.lock().unwrap().push(intent);
    }

    pub fn fail_begin(&self) {
        self.fail_begin.store(true, Ordering::SeqCst);
    }

    /// Build an intent in `status`, last updated at `updated_at`
    pub fn intent(
        file_id: &str,
        file_path: &str,
        staging_key: &str,
        status: IntentStatus,
        updated_at: DateTime<Utc>,
    ) -> ReplaceIntent {
        ReplaceIntent {
            id: Uuid::new_v4(),
            file_id: file_id.to_string(),
            storage_bucket: "documents".to_string(),
            file_path: file_path.to_string(),
            staging_key: staging_key.to_string(),
            new_file_name: "new_file.pdf".to_string(),
            new_file_type: "application/pdf".to_string(),
            new_file_size: 7,
            expected_version: 0,
            status,
            correlation_id: None,
            last_error: None,
            supersedes: None,
            created_at: updated_at,
            updated_at,
        }
    }
}

#[async_trait]
impl ReplaceIntentStore for InMemoryIntents {
    async fn begin(&self, new: NewReplaceIntent) -> Result<ReplaceIntent, AppError> {
        if self.fail_begin.load(Ordering::SeqCst) {
            return Err(AppError::Internal("injected intent log failure".to_string()));
        }

        let mut intents = self.intents.lock().unwrap();
        let takeover = |i: &ReplaceIntent| {
            i.file_id == new.file_id
                && i.status == IntentStatus::BlobCommitted
                && i.last_error.is_some()
        };
        if intents
            .iter()
            .any(|i| i.file_id == new.file_id && i.status.is_open() && !takeover(i))
        {
            return Err(AppError::Conflict(format!(
                "File {} already has an open replace intent",
                new.file_id
            )));
        }

        let now = Utc::now();
        let supersedes = intents.iter_mut().find(|i| takeover(&**i)).map(|previous| {
            previous.status = IntentStatus::Superseded;
            previous.updated_at = now;
            previous.id
        });

        let intent = ReplaceIntent {
            id: Uuid::new_v4(),
            file_id: new.file_id,
            storage_bucket: new.storage_bucket,
            file_path: new.file_path,
            staging_key: new.staging_key,
            new_file_name: new.new_file_name,
            new_file_type: new.new_file_type,
            new_file_size: new.new_file_size,
            expected_version: new.expected_version,
            status: IntentStatus::Pending,
            correlation_id: new.correlation_id,
            last_error: None,
            supersedes,
            created_at: now,
            updated_at: now,
        };
        intents.push(intent.clone());
        Ok(intent)
    }

    async fn mark(
        &self,
        id: Uuid,
        from: IntentStatus,
        to: IntentStatus,
        last_error: Option<String>,
    ) -> Result<bool, AppError> {
        let mut intents = self.intents.lock().unwrap();
        match intents.iter_mut().find(|i| i.id == id && i.status == from) {
            Some(intent) => {
                intent.status = to;
                if last_error.is_some() {
                    intent.last_error = last_error;
                }
                intent.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_open(
        &self,
        status: IntentStatus,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<ReplaceIntent>, AppError> {
        let mut matching: Vec<ReplaceIntent> = self
            .intents
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.status == status && i.updated_at < older_than)
            .cloned()
            .collect();
        matching.sort_by_key(|i| i.updated_at);
        Ok(matching)
    }
}

/// Gate with a fixed answer
pub struct StaticGate(pub bool);

#[async_trait]
impl AuthorizationGate for StaticGate {
    async fn is_authorized(&self, _actor: &Actor, _file_id: &str) -> Result<bool, AppError> {
        Ok(self.0)
    }
}
