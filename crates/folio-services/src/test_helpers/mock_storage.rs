//! Recording in-memory object store

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use folio_storage::{
    is_staging_key, ObjectMeta, Storage, StorageBackend, StorageError, StorageResult,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

/// One call made against the store, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Put(String),
    Get(String),
    Delete(Vec<String>),
    List(String),
}

/// Injectable failure points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOn {
    /// `put` to a key in the staging namespace
    StagingPut,
    /// `put` to any other key
    CommitPut,
    Get,
    Delete,
    List,
    /// `get` succeeds but returns one byte less than stored
    TruncatedGet,
}

/// In-memory [`Storage`] that records every call, including failed ones.
#[derive(Clone)]
pub struct MockStorage {
    bucket: String,
    objects: Arc<Mutex<BTreeMap<String, (Bytes, DateTime<Utc>)>>>,
    ops: Arc<Mutex<Vec<StorageOp>>>,
    failures: Arc<Mutex<HashSet<FailOn>>>,
}

impl MockStorage {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            ops: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn fail_on(&self, failure: FailOn) {
        self.failures.lock().unwrap().insert(failure);
    }

    /// Clear every injected failure
    pub fn recover(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Seed an object without recording an operation
    pub fn insert_object(&self, key: &str, data: &[u8], last_modified: DateTime<Utc>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (Bytes::copy_from_slice(data), last_modified));
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).map(|(b, _)| b.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn ops(&self) -> Vec<StorageOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    fn record(&self, op: StorageOp) {
        self.ops.lock().unwrap().push(op);
    }

    fn fails(&self, failure: FailOn) -> bool {
        self.failures.lock().unwrap().contains(&failure)
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> StorageResult<()> {
        self.record(StorageOp::Put(key.to_string()));

        let failure = if is_staging_key(key) {
            FailOn::StagingPut
        } else {
            FailOn::CommitPut
        };
        if self.fails(failure) {
            return Err(StorageError::UploadFailed(format!(
                "injected put failure for {}",
                key
            )));
        }

        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, Utc::now()));
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.record(StorageOp::Get(key.to_string()));

        if self.fails(FailOn::Get) {
            return Err(StorageError::DownloadFailed(format!(
                "injected get failure for {}",
                key
            )));
        }

        let data = self
            .object(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        if self.fails(FailOn::TruncatedGet) && !data.is_empty() {
            return Ok(data.slice(..data.len() - 1));
        }
        Ok(data)
    }

    async fn delete(&self, keys: &[String]) -> StorageResult<()> {
        self.record(StorageOp::Delete(keys.to_vec()));

        if self.fails(FailOn::Delete) {
            return Err(StorageError::DeleteFailed("injected delete failure".to_string()));
        }

        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://files.test/{}/{}", self.bucket, key)
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectMeta>> {
        self.record(StorageOp::List(prefix.to_string()));

        if self.fails(FailOn::List) {
            return Err(StorageError::ListFailed("injected list failure".to_string()));
        }

        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, (data, last_modified))| ObjectMeta {
                key: key.clone(),
                size: data.len() as u64,
                last_modified: *last_modified,
            })
            .collect())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
