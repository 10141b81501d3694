//! Bearer-token authentication for API routes.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::Caller;
use crate::startup::AppState;

/// Access token claims issued by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id.
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// HS256 access-token verifier.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &Secret<String>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Caller, AppError> {
        let claims = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)?.claims;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid token subject")))?;

        Ok(Caller::new(user_id, claims.role))
    }
}

/// Authenticated caller, extracted from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Caller);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!(
                "Missing or invalid Authorization header"
            ))
        })?;

        let caller = state.jwt.verify(token)?;

        tracing::Span::current().record("user_id", tracing::field::display(caller.user_id));

        Ok(AuthUser(caller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-jwt-secret";

    fn token(sub: &str, exp_offset: i64) -> String {
        let claims = AccessClaims {
            sub: sub.to_string(),
            role: "restaurant_admin".to_string(),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(&Secret::new(SECRET.to_string()))
    }

    #[test]
    fn verifies_valid_token() {
        let user_id = Uuid::new_v4();
        let caller = verifier().verify(&token(&user_id.to_string(), 600)).unwrap();
        assert_eq!(caller.user_id, user_id);
        assert_eq!(caller.role, "restaurant_admin");
    }

    #[test]
    fn rejects_expired_token() {
        let result = verifier().verify(&token(&Uuid::new_v4().to_string(), -3600));
        assert!(matches!(result, Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn rejects_non_uuid_subject() {
        let result = verifier().verify(&token("admin@example.com", 600));
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let other = JwtVerifier::new(&Secret::new("other".to_string()));
        assert!(other.verify(&token(&Uuid::new_v4().to_string(), 600)).is_err());
    }

    #[test]
    fn parses_bearer_scheme_case_insensitively() {
        let (parts, _) = Request::builder()
            .header(header::AUTHORIZATION, "bearer abc.def.ghi")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), Some("abc.def.ghi"));

        let (parts, _) = Request::builder()
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), None);
    }
}
