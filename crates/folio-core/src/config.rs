//! Configuration module
//!
//! Settings for the HTTP server, database, storage buckets, upload
//! validation and the background maintenance tasks.

use std::env;

use crate::storage_types::StorageBackend;

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const SERVER_PORT: u16 = 3000;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
const MAX_FILE_SIZE_BYTES: usize = 50 * 1024 * 1024;
const STAGING_TTL_SECS: u64 = 3600;
const STAGING_SWEEP_INTERVAL_SECS: u64 = 900;
const RECONCILE_INTERVAL_SECS: u64 = 300;
const INTENT_STALE_AFTER_SECS: u64 = 900;

const DEFAULT_EXTENSIONS: &str =
    "pdf,doc,docx,xls,xlsx,ppt,pptx,txt,md,csv,png,jpg,jpeg,gif,webp,svg,zip";
const DEFAULT_CONTENT_TYPES: &str = "application/pdf,\
application/msword,\
application/vnd.openxmlformats-officedocument.wordprocessingml.document,\
application/vnd.ms-excel,\
application/vnd.openxmlformats-officedocument.spreadsheetml.sheet,\
application/vnd.ms-powerpoint,\
application/vnd.openxmlformats-officedocument.presentationml.presentation,\
text/plain,text/markdown,text/csv,\
image/png,image/jpeg,image/gif,image/webp,image/svg+xml,\
application/zip,application/x-zip-compressed";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server-level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub http_concurrency_limit: usize,
    pub environment: String,
    pub log_format: LogFormat,
}

/// Portal file service configuration
#[derive(Clone, Debug)]
pub struct PortalConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Storage
    pub storage_backend: StorageBackend,
    /// First entry is the default bucket
    pub storage_buckets: Vec<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Upload validation
    pub max_file_size_bytes: usize,
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
    // Maintenance
    pub staging_ttl_secs: u64,
    /// 0 = disabled
    pub staging_sweep_interval_secs: u64,
    /// 0 = disabled
    pub reconcile_interval_secs: u64,
    pub intent_stale_after_secs: u64,
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config(pub Box<PortalConfig>);

impl Config {
    fn as_portal(&self) -> &PortalConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production(&self.as_portal().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = PortalConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_portal().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_portal().base.server_port
    }

    pub fn jwt_secret(&self) -> &str {
        &self.as_portal().base.jwt_secret
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_portal().base.cors_origins
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.as_portal().base.http_concurrency_limit
    }

    pub fn environment(&self) -> &str {
        &self.as_portal().base.environment
    }

    pub fn log_format(&self) -> LogFormat {
        self.as_portal().base.log_format
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_portal().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_portal().base.db_timeout_seconds
    }

    pub fn database_url(&self) -> &str {
        &self.as_portal().database_url
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_portal().storage_backend
    }

    pub fn storage_buckets(&self) -> &[String] {
        &self.as_portal().storage_buckets
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.as_portal().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_portal().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.as_portal().aws_region.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_portal().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.as_portal().local_storage_base_url.as_deref()
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.as_portal().max_file_size_bytes
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.as_portal().allowed_extensions
    }

    pub fn allowed_content_types(&self) -> &[String] {
        &self.as_portal().allowed_content_types
    }

    pub fn staging_ttl_secs(&self) -> u64 {
        self.as_portal().staging_ttl_secs
    }

    pub fn staging_sweep_interval_secs(&self) -> u64 {
        self.as_portal().staging_sweep_interval_secs
    }

    pub fn reconcile_interval_secs(&self) -> u64 {
        self.as_portal().reconcile_interval_secs
    }

    pub fn intent_stale_after_secs(&self) -> u64 {
        self.as_portal().intent_stale_after_secs
    }
}

fn is_production(environment: &str) -> bool {
    let environment = environment.to_lowercase();
    environment == "production" || environment == "prod"
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source, then validate.
    pub fn from_lookup<F>(get: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = get("ENVIRONMENT")
            .or_else(|| get("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins_str = get("CORS_ORIGINS").unwrap_or_else(|| "*".to_string());
        if is_production(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let log_format = match get("LOG_FORMAT")
            .unwrap_or_else(|| "text".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            other => {
                return Err(anyhow::anyhow!(
                    "LOG_FORMAT must be 'text' or 'json', got '{}'",
                    other
                ))
            }
        };

        let base = BaseConfig {
            server_port: get("SERVER_PORT")
                .or_else(|| get("PORT"))
                .unwrap_or_else(|| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: get("DB_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: get("DB_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            jwt_secret: get("JWT_SECRET")
                .ok_or_else(|| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            http_concurrency_limit: get("HTTP_CONCURRENCY_LIMIT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(HTTP_CONCURRENCY_LIMIT),
            environment,
            log_format,
        };

        let storage_backend = match get("STORAGE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => StorageBackend::S3,
        };

        let config = PortalConfig {
            base,
            database_url: get("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage_backend,
            storage_buckets: parse_list(
                &get("STORAGE_BUCKETS").unwrap_or_else(|| "documents".to_string()),
            ),
            s3_region: get("S3_REGION"),
            s3_endpoint: get("S3_ENDPOINT"),
            aws_region: get("AWS_REGION"),
            local_storage_path: get("LOCAL_STORAGE_PATH"),
            local_storage_base_url: get("LOCAL_STORAGE_BASE_URL"),
            max_file_size_bytes: get("MAX_FILE_SIZE_BYTES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_FILE_SIZE_BYTES),
            allowed_extensions: parse_list(
                &get("ALLOWED_EXTENSIONS").unwrap_or_else(|| DEFAULT_EXTENSIONS.to_string()),
            ),
            allowed_content_types: parse_list(
                &get("ALLOWED_CONTENT_TYPES").unwrap_or_else(|| DEFAULT_CONTENT_TYPES.to_string()),
            ),
            staging_ttl_secs: get("STAGING_TTL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(STAGING_TTL_SECS),
            staging_sweep_interval_secs: get("STAGING_SWEEP_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(STAGING_SWEEP_INTERVAL_SECS),
            reconcile_interval_secs: get("RECONCILE_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(RECONCILE_INTERVAL_SECS),
            intent_stale_after_secs: get("INTENT_STALE_AFTER_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(INTENT_STALE_AFTER_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.storage_buckets.is_empty() {
            return Err(anyhow::anyhow!("STORAGE_BUCKETS must name at least one bucket"));
        }

        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_BYTES must be greater than zero"));
        }

        if self.allowed_extensions.is_empty() || self.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!(
                "ALLOWED_EXTENSIONS and ALLOWED_CONTENT_TYPES must not be empty"
            ));
        }

        if self.staging_ttl_secs == 0 {
            return Err(anyhow::anyhow!("STAGING_TTL_SECS must be greater than zero"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}
