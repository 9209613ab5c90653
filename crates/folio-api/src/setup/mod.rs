//! Application setup and initialization
//!
//! Startup order: telemetry, database and migrations, storage, services and
//! background tasks, routes.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use folio_core::Config;
use std::sync::Arc;

pub use services::BackgroundTasks;

/// Everything `main` needs to serve and shut down
pub struct App {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    pub background: BackgroundTasks,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<App> {
    // Validate configuration first - fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.log_format())?;
    crate::error::configure_error_details(&config);

    tracing::info!(
        environment = %config.environment(),
        storage_backend = %config.storage_backend(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;

    let (state, background) = services::initialize_services(&config, pool, storage);
    let router = routes::setup_routes(&config, state.clone())?;

    Ok(App {
        state,
        router,
        background,
    })
}
