use crate::traits::{Storage, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Bucket name to backend mapping. File records name their bucket; the
/// protocol resolves it here before any object is touched.
#[derive(Clone)]
pub struct StoragePool {
    default_bucket: String,
    stores: BTreeMap<String, Arc<dyn Storage>>,
}

impl StoragePool {
    /// Pool whose default bucket is the one `default_store` serves
    pub fn new(default_store: Arc<dyn Storage>) -> Self {
        let default_bucket = default_store.bucket().to_string();
        let mut stores = BTreeMap::new();
        stores.insert(default_bucket.clone(), default_store);
        Self {
            default_bucket,
            stores,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn Storage>) -> Self {
        self.stores.insert(store.bucket().to_string(), store);
        self
    }

    pub fn bucket(&self, name: &str) -> StorageResult<Arc<dyn Storage>> {
        self.stores
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::UnknownBucket(name.to_string()))
    }

    pub fn default_bucket(&self) -> &str {
        &self.default_bucket
    }

    /// All stores, ordered by bucket name
    pub fn stores(&self) -> impl Iterator<Item = &Arc<dyn Storage>> {
        self.stores.values()
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use crate::LocalStorage;
    use tempfile::tempdir;

    #[tokio::test]
    async fn resolves_known_buckets_only() {
        let dir = tempdir().unwrap();
        let base_url = "http://localhost/files".to_string();
        let documents = LocalStorage::new(dir.path(), base_url.clone(), "documents")
            .await
            .unwrap();
        let attachments = LocalStorage::new(dir.path(), base_url, "attachments")
            .await
            .unwrap();

        let pool = StoragePool::new(Arc::new(documents)).with_store(Arc::new(attachments));

        assert_eq!(pool.default_bucket(), "documents");
        assert_eq!(pool.bucket("attachments").unwrap().bucket(), "attachments");
        assert!(matches!(
            pool.bucket("missing"),
            Err(StorageError::UnknownBucket(_))
        ));
        let names: Vec<&str> = pool.stores().map(|s| s.bucket()).collect();
        assert_eq!(names, vec!["attachments", "documents"]);
    }
}
