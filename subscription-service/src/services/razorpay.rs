//! Razorpay gateway client.
//!
//! Implements the Payment Links API for plan checkout and the Contacts and
//! Fund Accounts APIs for restaurant payout accounts.

use crate::config::RazorpayConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retries after the first attempt when no connection could be made.
const CONNECT_RETRIES: u32 = 1;

/// Outbound capabilities of the payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_link(&self, request: &PaymentLinkRequest) -> Result<PaymentLink>;

    /// Returns the gateway's contact id.
    async fn create_contact(&self, request: &ContactRequest) -> Result<String>;

    /// Returns the gateway's fund account id.
    async fn create_fund_account(&self, request: &FundAccountRequest) -> Result<String>;
}

/// Request to create a hosted payment link.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentLinkRequest {
    /// Amount in smallest currency unit (paise for INR).
    pub amount: i64,
    pub currency: String,
    /// Echoed back on the callback as `razorpay_payment_link_reference_id`.
    pub reference_id: String,
    pub description: String,
    pub callback_url: String,
    pub callback_method: String,
}

/// Payment link as returned by Razorpay.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentLink {
    pub id: String,
    pub short_url: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub contact: String,
    #[serde(rename = "type")]
    pub contact_type: String,
    pub reference_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FundAccountRequest {
    pub contact_id: String,
    pub account_type: String,
    pub bank_account: BankAccountPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct BankAccountPayload {
    pub name: String,
    pub ifsc: String,
    pub account_number: String,
}

#[derive(Debug, Deserialize)]
struct EntityId {
    id: String,
}

/// Razorpay API error response.
#[derive(Debug, Deserialize)]
pub struct RazorpayError {
    pub error: RazorpayErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayErrorDetail {
    pub code: String,
    pub description: String,
    pub source: Option<String>,
    pub step: Option<String>,
    pub reason: Option<String>,
}

impl RazorpayError {
    fn from_body(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| RazorpayError {
            error: RazorpayErrorDetail {
                code: "UNKNOWN".to_string(),
                description: body.to_string(),
                source: None,
                step: None,
                reason: None,
            },
        })
    }
}

/// Fixed-interval policy for connect failures, capped at one retry.
pub fn connect_backoff(interval: Duration) -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: interval,
        initial_interval: interval,
        randomization_factor: 0.0,
        multiplier: 1.0,
        max_interval: interval,
        max_elapsed_time: Some(interval * (CONNECT_RETRIES + 1) + Duration::from_secs(5)),
        ..Default::default()
    }
}

/// Razorpay client for interacting with the Razorpay API.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    config: RazorpayConfig,
    backoff: ExponentialBackoff,
}

impl RazorpayClient {
    /// Create a client with a per-request timeout of `config.timeout_seconds`.
    pub fn new(config: RazorpayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| anyhow!("Failed to build Razorpay HTTP client: {}", e))?;

        Ok(Self {
            client,
            config,
            backoff: connect_backoff(Duration::from_millis(200)),
        })
    }

    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Check if Razorpay is configured (credentials are set).
    pub fn is_configured(&self) -> bool {
        !self.config.key_id.is_empty() && !self.config.key_secret.expose_secret().is_empty()
    }

    /// POST `body` to `path`, retrying only when no connection was made.
    /// Timeouts and error responses are returned as-is: the request may have
    /// been acted on.
    async fn post<B, R>(&self, path: &str, body: &B, operation: &'static str) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        if !self.is_configured() {
            return Err(anyhow!("Razorpay credentials not configured"));
        }

        let url = format!(
            "{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            path
        );

        let mut policy = self.backoff.clone();
        policy.reset();

        let mut attempt = 0;
        let response = retry(policy, || {
            attempt += 1;
            let current = attempt;
            let request = self
                .client
                .post(&url)
                .basic_auth(
                    &self.config.key_id,
                    Some(self.config.key_secret.expose_secret()),
                )
                .json(body);

            async move {
                request.send().await.map_err(|e| {
                    if e.is_connect() && current <= CONNECT_RETRIES {
                        tracing::warn!(
                            operation,
                            attempt = current,
                            error = %e,
                            "Razorpay connection failed, retrying"
                        );
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await
        .map_err(|e| {
            tracing::error!(operation, error = %e, "Razorpay request failed");
            anyhow!("Razorpay {} request failed: {}", operation, e)
        })?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(operation, status = %status, "Razorpay response received");

        if status.is_success() {
            serde_json::from_str(&body)
                .map_err(|e| anyhow!("Unexpected Razorpay {} response: {}", operation, e))
        } else {
            let error = RazorpayError::from_body(&body);
            tracing::error!(
                operation,
                status = %status,
                code = %error.error.code,
                description = %error.error.description,
                reason = ?error.error.reason,
                "Razorpay API error"
            );
            Err(anyhow!(
                "Razorpay {} failed ({}): {} - {}",
                operation,
                status,
                error.error.code,
                error.error.description
            ))
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_payment_link(&self, request: &PaymentLinkRequest) -> Result<PaymentLink> {
        let link: PaymentLink = self
            .post("payment_links", request, "create_payment_link")
            .await?;

        tracing::info!(
            link_id = %link.id,
            reference_id = %request.reference_id,
            amount = request.amount,
            currency = %request.currency,
            "Razorpay payment link created"
        );

        Ok(link)
    }

    async fn create_contact(&self, request: &ContactRequest) -> Result<String> {
        let contact: EntityId = self.post("contacts", request, "create_contact").await?;
        tracing::info!(contact_id = %contact.id, reference_id = %request.reference_id, "Razorpay contact created");
        Ok(contact.id)
    }

    async fn create_fund_account(&self, request: &FundAccountRequest) -> Result<String> {
        let account: EntityId = self
            .post("fund_accounts", request, "create_fund_account")
            .await?;
        tracing::info!(fund_account_id = %account.id, contact_id = %request.contact_id, "Razorpay fund account created");
        Ok(account.id)
    }
}
