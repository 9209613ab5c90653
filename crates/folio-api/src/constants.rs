//! API path constants

/// API base path prefix (version-independent)
pub const API_BASE: &str = "/api";

/// Versioned prefix for every resource route
pub const API_PREFIX: &str = "/api/v0";

/// Request body headroom on top of `MAX_FILE_SIZE_BYTES` for multipart framing
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Multipart field carrying the new content
pub const FILE_FIELD: &str = "file";

/// Used when the multipart part declares no content type
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
