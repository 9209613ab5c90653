use folio_core::models::ReplaceStage;
use folio_core::{AppError, AuthError, ValidationError};
use folio_storage::StorageError;

/// Why a metadata update did not land
#[derive(Debug, thiserror::Error)]
pub enum MetadataUpdateFailure {
    #[error("no row for file {file_id} at version {expected_version}")]
    ZeroRows {
        file_id: String,
        expected_version: i64,
    },

    #[error(transparent)]
    Store(AppError),
}

/// Outcome of a failed replace.
///
/// `Auth`, `Validation`, `NotFound` and `Conflict` are raised before any
/// storage operation. The stage variants keep their cause for the logs; the
/// caller only sees a generic failure.
#[derive(Debug, thiserror::Error)]
pub enum ReplaceError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("File {0} not found")]
    NotFound(String),

    #[error("Replace already in progress for file {0}")]
    Conflict(String),

    #[error("Replace infrastructure unavailable at {stage}: {source}")]
    Unavailable {
        stage: ReplaceStage,
        #[source]
        source: AppError,
    },

    #[error("Staging write failed: {0}")]
    StagingWrite(#[source] StorageError),

    #[error("Staging read failed: {0}")]
    StagingRead(#[source] StorageError),

    #[error("Commit failed: {0}")]
    Commit(#[source] StorageError),

    #[error("Metadata update failed: {0}")]
    MetadataUpdate(#[source] MetadataUpdateFailure),
}

impl ReplaceError {
    /// Stage at which the operation stopped
    pub fn stage(&self) -> ReplaceStage {
        match self {
            ReplaceError::Auth(_) => ReplaceStage::Authorizing,
            ReplaceError::Validation(_) => ReplaceStage::Validating,
            ReplaceError::NotFound(_) | ReplaceError::Conflict(_) => ReplaceStage::Intent,
            ReplaceError::Unavailable { stage, .. } => *stage,
            ReplaceError::StagingWrite(_) => ReplaceStage::StagingWrite,
            ReplaceError::StagingRead(_) => ReplaceStage::StagingRead,
            ReplaceError::Commit(_) => ReplaceStage::Commit,
            ReplaceError::MetadataUpdate(_) => ReplaceStage::MetadataUpdate,
        }
    }

    /// Whether the original object may already have been overwritten
    pub fn blob_may_have_changed(&self) -> bool {
        matches!(self, ReplaceError::MetadataUpdate(_))
    }
}

impl From<ReplaceError> for AppError {
    fn from(err: ReplaceError) -> Self {
        match err {
            ReplaceError::Auth(e) => e.into(),
            ReplaceError::Validation(e) => AppError::Validation(e),
            ReplaceError::NotFound(id) => AppError::NotFound(format!("File {} not found", id)),
            ReplaceError::Conflict(id) => AppError::ReplaceInProgress(id),
            other => AppError::ReplaceFailed {
                stage: other.stage(),
            },
        }
    }
}
