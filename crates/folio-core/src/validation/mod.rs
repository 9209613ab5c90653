//! Upload validation for replacement content.
//!
//! Runs before any storage I/O. Checks happen in a fixed order: path safety of the
//! name, then extension / content type against the allow-lists, then size.

use std::path::Path;

/// Classified validation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("File name contains a path traversal or absolute path: {0}")]
    PathTraversal(String),

    #[error("File type not allowed: {0}")]
    InvalidType(String),

    #[error("Invalid file size: {size} bytes (max: {max} bytes)")]
    InvalidSize { size: usize, max: usize },
}

impl ValidationError {
    /// Stable classification used in logs and responses
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::PathTraversal(_) => "path_traversal",
            ValidationError::InvalidType(_) => "invalid_type",
            ValidationError::InvalidSize { .. } => "invalid_size",
        }
    }
}

/// A name and type that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedName {
    pub file_name: String,
    pub extension: String,
    /// MIME type with parameters stripped and lower-cased
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct ReplaceValidator {
    max_file_size: usize,
    allowed_extensions: Vec<String>,
    allowed_content_types: Vec<String>,
}

impl ReplaceValidator {
    pub fn new(
        max_file_size: usize,
        allowed_extensions: Vec<String>,
        allowed_content_types: Vec<String>,
    ) -> Self {
        Self {
            max_file_size,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            allowed_content_types: allowed_content_types
                .into_iter()
                .map(|ct| ct.to_lowercase())
                .collect(),
        }
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Validate a proposed name, declared content type and byte length.
    pub fn validate(
        &self,
        file_name: &str,
        content_type: &str,
        size: usize,
    ) -> Result<ValidatedName, ValidationError> {
        check_path_safety(file_name)?;
        let (extension, content_type) = self.check_type(file_name, content_type)?;
        self.check_size(size)?;

        Ok(ValidatedName {
            file_name: file_name.to_string(),
            extension,
            content_type,
        })
    }

    fn check_type(
        &self,
        file_name: &str,
        content_type: &str,
    ) -> Result<(String, String), ValidationError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                ValidationError::InvalidType(format!("missing file extension ({})", file_name))
            })?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::InvalidType(format!(
                "extension '{}' is not allowed",
                extension
            )));
        }

        let normalized = normalize_mime_type(content_type).to_lowercase();
        if !self.allowed_content_types.contains(&normalized) {
            return Err(ValidationError::InvalidType(format!(
                "content type '{}' is not allowed",
                normalized
            )));
        }

        if let Some(expected) = expected_content_types(&extension) {
            if !expected.contains(&normalized.as_str()) {
                return Err(ValidationError::InvalidType(format!(
                    "content type '{}' does not match extension '{}' (expected one of: {})",
                    normalized,
                    extension,
                    expected.join(", ")
                )));
            }
        } else {
            tracing::debug!(
                extension = %extension,
                content_type = %normalized,
                "Unknown extension, skipping content type cross-check"
            );
        }

        Ok((extension, normalized))
    }

    fn check_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 || size > self.max_file_size {
            return Err(ValidationError::InvalidSize {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }
}

/// Reject names that could address anything other than a single file name.
/// An empty name is treated the same way. Separators are rejected outright,
/// so a `..` segment can only be the whole name.
fn check_path_safety(file_name: &str) -> Result<(), ValidationError> {
    let reject = || Err(ValidationError::PathTraversal(file_name.to_string()));

    if file_name.trim().is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains('/')
        || file_name.contains('\\')
        || file_name.contains('\0')
        || file_name.starts_with('~')
    {
        return reject();
    }

    // Windows drive prefix, e.g. "C:evil.pdf"
    let bytes = file_name.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return reject();
    }

    Ok(())
}

/// Strip MIME parameters ("application/pdf; charset=binary" -> "application/pdf").
fn normalize_mime_type(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .map(|s| s.trim())
        .unwrap_or(content_type)
}

fn expected_content_types(extension: &str) -> Option<&'static [&'static str]> {
    let expected: &'static [&'static str] = match extension {
        "pdf" => &["application/pdf"],
        "doc" => &["application/msword"],
        "docx" => &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
        "xls" => &["application/vnd.ms-excel"],
        "xlsx" => &["application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"],
        "ppt" => &["application/vnd.ms-powerpoint"],
        "pptx" => &["application/vnd.openxmlformats-officedocument.presentationml.presentation"],
        "txt" => &["text/plain"],
        "md" => &["text/markdown", "text/plain"],
        "csv" => &["text/csv", "text/plain"],
        "png" => &["image/png"],
        "jpg" | "jpeg" => &["image/jpeg"],
        "gif" => &["image/gif"],
        "webp" => &["image/webp"],
        "svg" => &["image/svg+xml"],
        "zip" => &["application/zip", "application/x-zip-compressed"],
        _ => return None,
    };
    Some(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> ReplaceValidator {
        ReplaceValidator::new(
            1024,
            vec!["pdf".to_string(), "txt".to_string(), ".PNG".to_string()],
            vec![
                "application/pdf".to_string(),
                "text/plain".to_string(),
                "image/png".to_string(),
            ],
        )
    }

    #[test]
    fn accepts_allowed_file() {
        let validated = validator()
            .validate("new_file.pdf", "application/pdf", 10)
            .unwrap();
        assert_eq!(validated.file_name, "new_file.pdf");
        assert_eq!(validated.extension, "pdf");
        assert_eq!(validated.content_type, "application/pdf");
    }

    #[test]
    fn strips_mime_parameters() {
        let validated = validator()
            .validate("notes.txt", "Text/Plain; charset=utf-8", 10)
            .unwrap();
        assert_eq!(validated.content_type, "text/plain");
    }

    #[test]
    fn normalizes_configured_extensions() {
        assert!(validator().validate("logo.png", "image/png", 10).is_ok());
    }

    #[test]
    fn rejects_path_traversal() {
        let err = validator()
            .validate("../../../etc/passwd.pdf", "application/pdf", 10)
            .unwrap_err();
        assert_eq!(err.kind(), "path_traversal");

        for name in ["", "/etc/passwd.pdf", "a\\b.pdf", "~root.pdf", "C:boot.pdf", ".."] {
            let err = validator()
                .validate(name, "application/pdf", 10)
                .unwrap_err();
            assert_eq!(err.kind(), "path_traversal", "{name}");
        }
    }

    #[test]
    fn double_dots_inside_a_name_are_allowed() {
        let validated = validator()
            .validate("v1..2.pdf", "application/pdf", 10)
            .unwrap();
        assert_eq!(validated.file_name, "v1..2.pdf");
        assert!(validator()
            .validate("report...final.pdf", "application/pdf", 10)
            .is_ok());
    }

    #[test]
    fn path_check_runs_before_type_check() {
        let err = validator()
            .validate("../evil.exe", "application/x-msdownload", 0)
            .unwrap_err();
        assert_eq!(err.kind(), "path_traversal");
    }

    #[test]
    fn rejects_disallowed_extension() {
        let err = validator()
            .validate("setup.exe", "application/pdf", 10)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_type");
    }

    #[test]
    fn rejects_missing_extension() {
        let err = validator()
            .validate("README", "text/plain", 10)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_type");
    }

    #[test]
    fn rejects_content_type_mismatch() {
        let err = validator()
            .validate("report.pdf", "text/plain", 10)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_type");
    }

    #[test]
    fn type_check_runs_before_size_check() {
        let err = validator()
            .validate("setup.exe", "application/pdf", 1_000_000)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_type");
    }

    #[test]
    fn rejects_empty_and_oversized() {
        let err = validator()
            .validate("a.pdf", "application/pdf", 0)
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidSize { size: 0, max: 1024 });

        let err = validator()
            .validate("a.pdf", "application/pdf", 1025)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_size");

        assert!(validator().validate("a.pdf", "application/pdf", 1024).is_ok());
    }
}
