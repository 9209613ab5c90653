pub mod actor;
pub mod file_record;
pub mod replace;

pub use actor::{Actor, UserRole};
pub use file_record::{FileContentUpdate, FileOwner, FileRecord, ReplacedFile, Visibility};
pub use replace::{IntentStatus, NewReplaceIntent, ReplaceIntent, ReplaceStage};
