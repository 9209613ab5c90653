use crate::auth::jwt::JwtVerifier;
use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use folio_core::AppError;
use std::sync::Arc;

fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".to_string()))
}

/// Verify the bearer token and attach the resulting `Actor` to the request
pub async fn auth_middleware(
    State(verifier): State<Arc<JwtVerifier>>,
    mut request: Request,
    next: Next,
) -> Response {
    let actor = match bearer_token(request.headers()).and_then(|token| verifier.verify(&token)) {
        Ok(actor) => actor,
        Err(e) => return HttpAppError(e).into_response(),
    };

    tracing::debug!(user_id = %actor.user_id, role = %actor.role, "Authenticated request");

    request.extensions_mut().insert(actor);
    next.run(request).await
}
