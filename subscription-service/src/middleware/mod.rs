pub mod auth;

pub use auth::{AccessClaims, AuthUser, JwtVerifier};
