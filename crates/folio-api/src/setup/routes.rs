//! Route configuration and setup.

use crate::auth::middleware::auth_middleware;
use crate::auth::JwtVerifier;
use crate::constants::{API_BASE, API_PREFIX, MULTIPART_OVERHEAD_BYTES};
use crate::handlers;
use crate::middleware::request_id_middleware;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, put},
    Json, Router,
};
use folio_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;
    let verifier = Arc::new(JwtVerifier::new(config.jwt_secret()));

    let protected_routes = Router::new()
        .route(
            &format!("{}/files/{{id}}/content", API_PREFIX),
            put(handlers::file_replace::replace_file_content),
        )
        .layer(axum::middleware::from_fn_with_state(verifier, auth_middleware));

    let public_routes = Router::new()
        .route("/health", get(handlers::health::liveness_check))
        .route(
            &format!("{}/openapi.json", API_BASE),
            get(|| async { Json(crate::api_doc::ApiDoc::openapi()) }),
        );

    let http_concurrency_limit = config.http_concurrency_limit().max(1);
    let body_limit = config.max_file_size_bytes() + MULTIPART_OVERHEAD_BYTES;
    tracing::info!(
        http_concurrency_limit,
        body_limit_bytes = body_limit,
        "HTTP limits configured"
    );

    let app = public_routes
        .merge(protected_routes)
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::PUT, Method::OPTIONS];

    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
