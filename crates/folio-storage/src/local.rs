use crate::traits::{ObjectMeta, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Scratch directory for in-progress writes, inside the bucket root so the
/// final rename never crosses a filesystem boundary.
const TMP_DIR: &str = ".folio-tmp";

/// Local filesystem storage. Each bucket is a directory under the base path.
#[derive(Clone)]
pub struct LocalStorage {
    bucket: String,
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage for `bucket`
    ///
    /// # Arguments
    /// * `base_path` - Root directory holding one sub-directory per bucket
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:3000/files")
    /// * `bucket` - Bucket name
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: String,
        bucket: impl Into<String>,
    ) -> StorageResult<Self> {
        let bucket = bucket.into();
        if bucket.is_empty() || bucket.contains("..") || bucket.contains('/') {
            return Err(StorageError::ConfigError(format!(
                "Invalid bucket name: {}",
                bucket
            )));
        }

        let root = base_path.into().join(&bucket);
        fs::create_dir_all(root.join(TMP_DIR)).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            bucket,
            root,
            base_url,
        })
    }

    /// Convert a storage key to a filesystem path, rejecting keys that could
    /// escape the bucket directory or address the scratch area.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty()
            || key.contains("..")
            || key.starts_with('/')
            || key.contains('\\')
            || key.contains('\0')
            || key.starts_with(TMP_DIR)
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        Ok(self.root.join(key))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Remove now-empty directories between `path` and the bucket root.
    async fn prune_empty_dirs(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            if fs::remove_dir(dir).await.is_err() {
                break;
            }
            current = dir.parent();
        }
    }

    fn path_to_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        Some(parts.join("/"))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let size = data.len();
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&path).await?;

        // Write a scratch file first and rename it over the target, so a failed
        // write never leaves a partial object at `key`.
        let tmp_path = self
            .root
            .join(TMP_DIR)
            .join(Uuid::new_v4().simple().to_string());

        let write = async {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &path).await
        };

        if let Err(e) = write.await {
            let _ = fs::remove_file(&tmp_path).await;
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Local storage put failed"
            );
            return Err(StorageError::UploadFailed(format!(
                "Failed to write {}: {}",
                path.display(),
                e
            )));
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage get successful"
        );

        Ok(Bytes::from(data))
    }

    async fn delete(&self, keys: &[String]) -> StorageResult<()> {
        let start = std::time::Instant::now();

        for key in keys {
            let path = self.key_to_path(key)?;
            match fs::remove_file(&path).await {
                Ok(()) => self.prune_empty_dirs(&path).await,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StorageError::DeleteFailed(format!(
                        "Failed to delete {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            keys = ?keys,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.bucket,
            key
        )
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectMeta>> {
        if prefix.contains("..") || prefix.starts_with('/') {
            return Err(StorageError::InvalidKey(prefix.to_string()));
        }

        // Walk from the deepest directory fully named by the prefix.
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let mut pending = vec![self.root.join(dir_part)];
        let mut objects = Vec::new();

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::ListFailed(e.to_string())),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::ListFailed(e.to_string()))?
            {
                let path = entry.path();
                let metadata = entry
                    .metadata()
                    .await
                    .map_err(|e| StorageError::ListFailed(e.to_string()))?;

                if metadata.is_dir() {
                    if path != self.root.join(TMP_DIR) {
                        pending.push(path);
                    }
                    continue;
                }

                let Some(key) = self.path_to_key(&path) else {
                    continue;
                };
                if !key.starts_with(prefix) {
                    continue;
                }

                let last_modified: DateTime<Utc> = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .map_err(|e| StorageError::ListFailed(e.to_string()))?;

                objects.push(ObjectMeta {
                    key,
                    size: metadata.len(),
                    last_modified,
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
