//! Authorization gate consulted once per replace, before any validation or I/O.

use async_trait::async_trait;
use folio_core::models::{Actor, UserRole};
use folio_core::AppError;
use folio_db::FileRecordStore;
use std::sync::Arc;

/// Yes/no decision on whether `actor` may replace the content of `file_id`.
///
/// Returns `AppError::NotFound` when the file does not exist.
#[async_trait]
pub trait AuthorizationGate: Send + Sync {
    async fn is_authorized(&self, actor: &Actor, file_id: &str) -> Result<bool, AppError>;
}

/// Role and ownership based gate over the file metadata store.
///
/// Admins may replace any file and viewers none. Editors may replace files
/// they uploaded or that belong to one of their teams.
pub struct RecordAccessGate {
    files: Arc<dyn FileRecordStore>,
}

impl RecordAccessGate {
    pub fn new(files: Arc<dyn FileRecordStore>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl AuthorizationGate for RecordAccessGate {
    async fn is_authorized(&self, actor: &Actor, file_id: &str) -> Result<bool, AppError> {
        let record = self
            .files
            .get(file_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", file_id)))?;

        let allowed = match actor.role {
            UserRole::Admin => true,
            UserRole::Viewer => false,
            UserRole::Editor => {
                record.uploaded_by == actor.user_id
                    || record
                        .team_id
                        .as_deref()
                        .is_some_and(|team| actor.belongs_to(team))
            }
        };

        tracing::debug!(
            user_id = %actor.user_id,
            role = %actor.role,
            file_id = %file_id,
            allowed,
            "Authorization decision"
        );

        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{actor, file_record, InMemoryFileRecords};

    fn gate() -> RecordAccessGate {
        let files = InMemoryFileRecords::new();
        let mut record = file_record("file_123", "documents/file_123_old_file.pdf");
        record.uploaded_by = "alice".to_string();
        record.team_id = Some("team_docs".to_string());
        files.insert(record);
        RecordAccessGate::new(Arc::new(files))
    }

    #[tokio::test]
    async fn admin_may_replace_anything() {
        let admin = actor("root", UserRole::Admin, &[]);
        assert!(gate().is_authorized(&admin, "file_123").await.unwrap());
    }

    #[tokio::test]
    async fn viewer_may_not_replace() {
        let viewer = actor("alice", UserRole::Viewer, &["team_docs"]);
        assert!(!gate().is_authorized(&viewer, "file_123").await.unwrap());
    }

    #[tokio::test]
    async fn editor_needs_ownership_or_team() {
        let gate = gate();
        let uploader = actor("alice", UserRole::Editor, &[]);
        let teammate = actor("bob", UserRole::Editor, &["team_docs"]);
        let outsider = actor("carol", UserRole::Editor, &["team_ops"]);

        assert!(gate.is_authorized(&uploader, "file_123").await.unwrap());
        assert!(gate.is_authorized(&teammate, "file_123").await.unwrap());
        assert!(!gate.is_authorized(&outsider, "file_123").await.unwrap());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let admin = actor("root", UserRole::Admin, &[]);
        let result = gate().is_authorized(&admin, "file_999").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
