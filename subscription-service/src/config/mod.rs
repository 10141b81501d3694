//! Subscription service configuration.
//!
//! Values come from an optional `configuration.*` file and
//! `SUBSCRIPTION__SECTION__KEY` environment variables, e.g.
//! `SUBSCRIPTION__DATABASE__URL` or `SUBSCRIPTION__RAZORPAY__KEY_SECRET`.

use ::config::{builder::DefaultState, ConfigBuilder};
use secrecy::Secret;
use serde::Deserialize;
use service_core::config::Config as CoreConfig;
use service_core::error::AppError;

pub const ENV_PREFIX: &str = "SUBSCRIPTION";

#[derive(Deserialize, Clone, Debug)]
pub struct PurchaseConfig {
    pub common: CoreConfig,
    pub service_name: String,
    pub database: DatabaseConfig,
    pub razorpay: RazorpayConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RazorpayConfig {
    pub key_id: String,
    /// API key secret; also the HMAC key for payment-link callbacks.
    pub key_secret: Secret<String>,
    pub api_base_url: String,
    pub callback_url: String,
    pub currency: String,
    pub timeout_seconds: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
}

impl PurchaseConfig {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let settings = with_defaults(service_core::config::layered(ENV_PREFIX))?.build()?;

        Ok(settings.try_deserialize()?)
    }
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, AppError> {
    Ok(builder
        .set_default("common.port", 8080)?
        .set_default("service_name", "subscription-service")?
        .set_default("database.max_connections", 10)?
        .set_default("database.min_connections", 1)?
        .set_default("razorpay.api_base_url", "https://api.razorpay.com/v1")?
        .set_default("razorpay.currency", "INR")?
        .set_default("razorpay.timeout_seconds", 10)?)
}
