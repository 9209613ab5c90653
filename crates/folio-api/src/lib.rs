//! Folio API Library
//!
//! HTTP surface of the file portal: routes, authentication, error rendering
//! and application setup. The replacement protocol itself lives in
//! folio-services.

mod api_doc;
pub mod constants;
mod handlers;
mod middleware;
pub mod setup;
pub mod telemetry;

// Public modules
pub mod auth;
pub mod error;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
