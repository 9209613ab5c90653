//! HS256 bearer token verification

use crate::auth::models::JwtClaims;
use folio_core::models::{Actor, UserRole};
use folio_core::AppError;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

/// Verifies HS256 tokens signed with the shared `JWT_SECRET`
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 30;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Decode `token` into the acting user
    pub fn verify(&self, token: &str) -> Result<Actor, AppError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::ExpiredSignature => "Token expired",
                ErrorKind::InvalidSignature => "Invalid token signature",
                _ => "Invalid token",
            };
            tracing::debug!(error = %e, "JWT verification failed");
            AppError::Unauthorized(reason.to_string())
        })?;

        let claims = data.claims;
        let role: UserRole = claims
            .role
            .parse()
            .map_err(|_| AppError::Unauthorized(format!("Unknown role '{}'", claims.role)))?;

        Ok(Actor {
            user_id: claims.sub,
            role,
            team_ids: claims.teams,
        })
    }
}
