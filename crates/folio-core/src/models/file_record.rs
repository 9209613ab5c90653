use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Who may see a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "file_visibility", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Team,
    Public,
}

/// Metadata of one stored file.
///
/// `file_path` always points at a committed object, never at a staging object.
/// `file_name`, `file_type`, `file_size`, `version` and `updated_at` change only
/// through a successful replace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_path: String,
    pub storage_bucket: String,
    /// `None` means the file belongs to an application rather than a document
    pub document_id: Option<String>,
    pub application_id: Option<String>,
    pub uploaded_by: String,
    pub visibility: Visibility,
    pub team_id: Option<String>,
    /// Optimistic concurrency token, bumped by every content replacement
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a file hangs off
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOwner<'a> {
    Document(&'a str),
    Application(Option<&'a str>),
}

impl FileRecord {
    pub fn owner(&self) -> FileOwner<'_> {
        match self.document_id.as_deref() {
            Some(document_id) => FileOwner::Document(document_id),
            None => FileOwner::Application(self.application_id.as_deref()),
        }
    }
}

/// New content description written by the metadata update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContentUpdate {
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub updated_at: DateTime<Utc>,
}

/// Response body of a successful replace
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReplacedFile {
    pub id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
    /// Public URL of the committed object
    pub url: String,
}

impl ReplacedFile {
    pub fn from_record(record: &FileRecord, url: String) -> Self {
        Self {
            id: record.id.clone(),
            file_name: record.file_name.clone(),
            file_type: record.file_type.clone(),
            file_size: record.file_size,
            updated_at: record.updated_at,
            version: record.version,
            url,
        }
    }
}
