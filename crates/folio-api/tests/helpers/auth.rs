use chrono::Utc;
use folio_api::auth::JwtClaims;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";

/// Signed HS256 token valid for an hour
pub fn token_for(user_id: &str, role: &str, teams: &[&str]) -> String {
    let now = Utc::now().timestamp();
    let claims = JwtClaims {
        sub: user_id.to_string(),
        role: role.to_string(),
        teams: teams.iter().map(|t| t.to_string()).collect(),
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("sign test token")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
