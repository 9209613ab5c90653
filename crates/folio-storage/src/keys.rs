//! Reserved staging namespace.
//!
//! Staging keys have the form `_staging/{file_id}/{token}`. No committed object
//! may live under the prefix, so anything found there is either in flight or
//! an orphan.

use uuid::Uuid;

/// Prefix reserved for staging objects
pub const STAGING_PREFIX: &str = "_staging/";

/// Fresh uniqueness token for one replace attempt
pub fn new_staging_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Staging key for `file_id`. Characters outside `[A-Za-z0-9_-]` are replaced
/// so the id always forms exactly one path segment.
pub fn staging_key(file_id: &str, token: &str) -> String {
    let segment: String = file_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}/{}", STAGING_PREFIX, segment, token)
}

pub fn is_staging_key(key: &str) -> bool {
    key.starts_with(STAGING_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_key_layout() {
        let key = staging_key("file_123", "abc");
        assert_eq!(key, "_staging/file_123/abc");
        assert!(is_staging_key(&key));
    }

    #[test]
    fn committed_paths_are_not_staging() {
        assert!(!is_staging_key("documents/file_123_old_file.pdf"));
        assert!(!is_staging_key("documents/_staging/x"));
    }

    #[test]
    fn file_id_cannot_escape_its_segment() {
        assert_eq!(staging_key("../a/b", "t"), "_staging/___a_b/t");
    }

    #[test]
    fn tokens_are_unique() {
        let a = new_staging_token();
        let b = new_staging_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }
}
