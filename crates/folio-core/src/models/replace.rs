//! Replacement protocol state: pipeline stages and the durable intent log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// Stages of one replace operation, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceStage {
    Authorizing,
    Validating,
    Intent,
    StagingWrite,
    StagingRead,
    Commit,
    MetadataUpdate,
    Cleanup,
    Done,
}

impl ReplaceStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplaceStage::Authorizing => "authorizing",
            ReplaceStage::Validating => "validating",
            ReplaceStage::Intent => "intent",
            ReplaceStage::StagingWrite => "staging_write",
            ReplaceStage::StagingRead => "staging_read",
            ReplaceStage::Commit => "commit",
            ReplaceStage::MetadataUpdate => "metadata_update",
            ReplaceStage::Cleanup => "cleanup",
            ReplaceStage::Done => "done",
        }
    }
}

impl Display for ReplaceStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a replace-intent row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "replace_intent_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    /// Recorded before the first storage write
    Pending,
    /// The original object was overwritten; metadata not yet updated
    BlobCommitted,
    Done,
    Failed,
    /// Stale pending intent reclaimed by the reconciler
    Abandoned,
    /// Either the record changed underneath a committed blob (needs a human)
    /// or a resubmitted replace took over the file's lease
    Superseded,
}

impl IntentStatus {
    /// Open intents hold the per-file lease
    pub fn is_open(&self) -> bool {
        matches!(self, IntentStatus::Pending | IntentStatus::BlobCommitted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Pending => "pending",
            IntentStatus::BlobCommitted => "blob_committed",
            IntentStatus::Done => "done",
            IntentStatus::Failed => "failed",
            IntentStatus::Abandoned => "abandoned",
            IntentStatus::Superseded => "superseded",
        }
    }
}

impl Display for IntentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Durable record of one replace attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceIntent {
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
    /// The failed `blob_committed` intent this one took the lease from
    pub supersedes: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to open an intent
#[derive(Debug, Clone)]
pub struct NewReplaceIntent {
    pub file_id: String,
    pub storage_bucket: String,
    pub file_path: String,
    pub staging_key: String,
    pub new_file_name: String,
    pub new_file_type: String,
    pub new_file_size: i64,
    pub expected_version: i64,
    pub correlation_id: Option<String>,
}
