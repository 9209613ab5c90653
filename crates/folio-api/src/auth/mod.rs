pub mod jwt;
pub mod middleware;
pub mod models;

pub use jwt::JwtVerifier;
pub use models::{AuthenticatedActor, JwtClaims};
