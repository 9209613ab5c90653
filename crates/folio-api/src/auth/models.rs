use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use folio_core::models::Actor;
use folio_core::AppError;
use serde::{Deserialize, Serialize};

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,  // user_id
    pub role: String, // "admin", "editor" or "viewer"
    #[serde(default)]
    pub teams: Vec<String>,
    pub exp: i64, // expiration timestamp
    pub iat: i64, // issued at timestamp
}

/// Actor placed in request extensions by the auth middleware.
///
/// Implemented as an extractor over request parts so it can run before
/// `Multipart`, which consumes the body.
#[derive(Debug, Clone)]
pub struct AuthenticatedActor(pub Actor);

impl<S> FromRequestParts<S> for AuthenticatedActor
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .map(AuthenticatedActor)
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Missing actor context".to_string(),
                ))
            })
    }
}
