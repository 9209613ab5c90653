//! File metadata repository: reads and the conditional content update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_core::models::{FileContentUpdate, FileRecord, Visibility};
use folio_core::AppError;
use sqlx::{PgPool, Postgres};

/// Relational store for file metadata
#[async_trait]
pub trait FileRecordStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<FileRecord>, AppError>;

    /// Apply `update` only if the row still has `expected_version`, bumping
    /// the version. `None` means zero rows were affected.
    async fn update_content(
        &self,
        id: &str,
        update: &FileContentUpdate,
        expected_version: i64,
    ) -> Result<Option<FileRecord>, AppError>;
}

/// Row type for file_records table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct FileRecordRow {
    pub id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_path: String,
    pub storage_bucket: String,
    pub document_id: Option<String>,
    pub application_id: Option<String>,
    pub uploaded_by: String,
    pub visibility: Visibility,
    pub team_id: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FileRecordRow> for FileRecord {
    fn from(row: FileRecordRow) -> Self {
        FileRecord {
            id: row.id,
            file_name: row.file_name,
            file_type: row.file_type,
            file_size: row.file_size,
            file_path: row.file_path,
            storage_bucket: row.storage_bucket,
            document_id: row.document_id,
            application_id: row.application_id,
            uploaded_by: row.uploaded_by,
            visibility: row.visibility,
            team_id: row.team_id,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const FILE_RECORD_COLUMNS: &str = "id, file_name, file_type, file_size, file_path, storage_bucket, \
     document_id, application_id, uploaded_by, visibility, team_id, version, created_at, updated_at";

/// Postgres repository for file_records
#[derive(Clone)]
pub struct FileRecordRepository {
    pool: PgPool,
}

impl FileRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRecordStore for FileRecordRepository {
    #[tracing::instrument(
        skip(self),
        fields(db.table = "file_records", db.operation = "select", db.record_id = %id)
    )]
    async fn get(&self, id: &str) -> Result<Option<FileRecord>, AppError> {
        let row: Option<FileRecordRow> = sqlx::query_as::<Postgres, FileRecordRow>(&format!(
            "SELECT {} FROM file_records WHERE id = $1",
            FILE_RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FileRecord::from))
    }

    #[tracing::instrument(
        skip(self, update),
        fields(db.table = "file_records", db.operation = "update", db.record_id = %id)
    )]
    async fn update_content(
        &self,
        id: &str,
        update: &FileContentUpdate,
        expected_version: i64,
    ) -> Result<Option<FileRecord>, AppError> {
        let row: Option<FileRecordRow> = sqlx::query_as::<Postgres, FileRecordRow>(&format!(
            r#"
            UPDATE file_records
            SET file_name = $3,
                file_type = $4,
                file_size = $5,
                updated_at = $6,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {}
            "#,
            FILE_RECORD_COLUMNS
        ))
        .bind(id)
        .bind(expected_version)
        .bind(&update.file_name)
        .bind(&update.file_type)
        .bind(update.file_size)
        .bind(update.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        if row.is_none() {
            tracing::warn!(
                file_id = %id,
                expected_version,
                "Content update matched zero rows"
            );
        }

        Ok(row.map(FileRecord::from))
    }
}
