//! Test helpers for the replacement protocol
//!
//! In-memory collaborators and fixtures so the protocol, the sweeper and the
//! reconciler can be exercised without Postgres or an object store.

pub mod mock_repositories;
pub mod mock_storage;

pub use mock_repositories::{InMemoryFileRecords, InMemoryIntents, StaticGate};
pub use mock_storage::{FailOn, MockStorage, StorageOp};

use chrono::Utc;
use folio_core::models::{Actor, FileRecord, UserRole, Visibility};

/// A `team` visibility PDF record at `file_path` in the `documents` bucket
pub fn file_record(id: &str, file_path: &str) -> FileRecord {
    let now = Utc::now();
    FileRecord {
        id: id.to_string(),
        file_name: "old_file.pdf".to_string(),
        file_type: "application/pdf".to_string(),
        file_size: 11,
        file_path: file_path.to_string(),
        storage_bucket: "documents".to_string(),
        document_id: Some("doc_1".to_string()),
        application_id: None,
        uploaded_by: "user_1".to_string(),
        visibility: Visibility::Team,
        team_id: None,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

pub fn actor(user_id: &str, role: UserRole, teams: &[&str]) -> Actor {
    Actor {
        user_id: user_id.to_string(),
        role,
        team_ids: teams.iter().map(|t| t.to_string()).collect(),
    }
}
