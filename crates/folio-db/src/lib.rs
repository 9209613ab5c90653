//! Database repositories for file metadata and the replace-intent log.
//!
//! Each store is a trait so the replacement protocol can run against
//! Postgres in production and in-memory doubles in tests.

pub mod file_record;
pub mod replace_intent;

pub use file_record::{FileRecordRepository, FileRecordStore};
pub use replace_intent::{ReplaceIntentRepository, ReplaceIntentStore};
