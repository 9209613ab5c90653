//! Durable replace-intent log.
//!
//! A row is written before any object is touched and moved through
//! `pending -> blob_committed -> done` as the protocol advances. The partial
//! unique index on `file_id` for open rows doubles as a per-file lease. A
//! resubmit may take the lease over from an intent whose metadata update
//! already failed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_core::models::{IntentStatus, NewReplaceIntent, ReplaceIntent};
use folio_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

#[async_trait]
pub trait ReplaceIntentStore: Send + Sync {
    /// Open a `pending` intent. Fails with `AppError::Conflict` when the file
    /// already has an open intent, except a `blob_committed` one carrying a
    /// `last_error`: that one is marked `superseded` and the new intent records
    /// it in `supersedes`.
    async fn begin(&self, intent: NewReplaceIntent) -> Result<ReplaceIntent, AppError>;

    /// Move an intent from `from` to `to`. Returns `false` when the row was no
    /// longer in `from`.
    async fn mark(
        &self,
        id: Uuid,
        from: IntentStatus,
        to: IntentStatus,
        last_error: Option<String>,
    ) -> Result<bool, AppError>;

    /// Intents in `status` not touched since `older_than`, oldest first.
    async fn list_open(
        &self,
        status: IntentStatus,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<ReplaceIntent>, AppError>;
}

/// Row type for replace_intents table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct ReplaceIntentRow {
    pub id: Uuid,
    pub file_id: String,
    pub storage_bucket: String,
    pub file_path: String,
    pub staging_key: String,
    pub new_file_name: String,
    pub new_file_type: String,
    pub new_file_size: i64,
    pub expected_version: i64,
    pub status: IntentStatus,
    pub correlation_id: Option<String>,
    pub last_error: Option<String>,
    pub supersedes: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ReplaceIntentRow> for ReplaceIntent {
    fn from(row: ReplaceIntentRow) -> Self {
        ReplaceIntent {
            id: row.id,
            file_id: row.file_id,
            storage_bucket: row.storage_bucket,
            file_path: row.file_path,
            staging_key: row.staging_key,
            new_file_name: row.new_file_name,
            new_file_type: row.new_file_type,
            new_file_size: row.new_file_size,
            expected_version: row.expected_version,
            status: row.status,
            correlation_id: row.correlation_id,
            last_error: row.last_error,
            supersedes: row.supersedes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const INTENT_COLUMNS: &str = "id, file_id, storage_bucket, file_path, staging_key, new_file_name, \
     new_file_type, new_file_size, expected_version, status, correlation_id, last_error, \
     supersedes, created_at, updated_at";

/// Postgres repository for replace_intents
#[derive(Clone)]
pub struct ReplaceIntentRepository {
    pool: PgPool,
}

impl ReplaceIntentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReplaceIntentStore for ReplaceIntentRepository {
    async fn begin(&self, intent: NewReplaceIntent) -> Result<ReplaceIntent, AppError> {
        let mut tx = self.pool.begin().await?;

        // A blob_committed intent whose request already reported its metadata
        // failure gives up the lease; the new request rewrites object and row.
        let taken_over: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE replace_intents
            SET status = 'superseded', updated_at = NOW()
            WHERE file_id = $1 AND status = 'blob_committed' AND last_error IS NOT NULL
            RETURNING id
            "#,
        )
        .bind(&intent.file_id)
        .fetch_optional(&mut *tx)
        .await?;

        let result = sqlx::query_as::<Postgres, ReplaceIntentRow>(&format!(
            r#"
            INSERT INTO replace_intents (
                file_id, storage_bucket, file_path, staging_key, new_file_name,
                new_file_type, new_file_size, expected_version, correlation_id, supersedes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            INTENT_COLUMNS
        ))
        .bind(&intent.file_id)
        .bind(&intent.storage_bucket)
        .bind(&intent.file_path)
        .bind(&intent.staging_key)
        .bind(&intent.new_file_name)
        .bind(&intent.new_file_type)
        .bind(intent.new_file_size)
        .bind(intent.expected_version)
        .bind(&intent.correlation_id)
        .bind(taken_over)
        .fetch_one(&mut *tx)
        .await;

        match result {
            Ok(row) => {
                tx.commit().await?;
                if let Some(previous) = taken_over {
                    tracing::info!(
                        intent_id = %row.id,
                        superseded_intent_id = %previous,
                        "Took over lease from failed replace intent"
                    );
                }
                Ok(row.into())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AppError::Conflict(format!(
                    "File {} already has an open replace intent",
                    intent.file_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(
        skip(self, last_error),
        fields(db.table = "replace_intents", db.operation = "update", db.record_id = %id)
    )]
    async fn mark(
        &self,
        id: Uuid,
        from: IntentStatus,
        to: IntentStatus,
        last_error: Option<String>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE replace_intents
            SET status = $3, last_error = COALESCE($4, last_error), updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(last_error)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self), fields(db.table = "replace_intents", db.operation = "select"))]
    async fn list_open(
        &self,
        status: IntentStatus,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<ReplaceIntent>, AppError> {
        let rows = sqlx::query_as::<Postgres, ReplaceIntentRow>(&format!(
            r#"
            SELECT {}
            FROM replace_intents
            WHERE status = $1 AND updated_at < $2
            ORDER BY updated_at
            "#,
            INTENT_COLUMNS
        ))
        .bind(status)
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ReplaceIntent::from).collect())
    }
}
