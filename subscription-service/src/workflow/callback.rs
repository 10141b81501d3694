use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::utils::signature::{sign_fields, verify_fields};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::error::PurchaseError;
use crate::models::{Payment, PaymentStatus};
use crate::services::metrics::record_callback;
use crate::services::repository::{PaymentRepository, Settlement};

/// Status value Razorpay reports for a paid link.
pub const PAID_STATUS: &str = "paid";

/// Query parameters of the gateway's payment-link redirect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayCallback {
    #[serde(default)]
    pub razorpay_payment_id: String,
    #[serde(default)]
    pub razorpay_payment_link_id: String,
    #[serde(default)]
    pub razorpay_payment_link_reference_id: String,
    #[serde(default)]
    pub razorpay_payment_link_status: String,
    #[serde(default)]
    pub razorpay_signature: String,
}

impl GatewayCallback {
    /// Fields in signing order.
    fn signed_fields(&self) -> [&str; 4] {
        [
            self.razorpay_payment_link_id.as_str(),
            self.razorpay_payment_link_reference_id.as_str(),
            self.razorpay_payment_link_status.as_str(),
            self.razorpay_payment_id.as_str(),
        ]
    }
}

/// Lowercase hex HMAC-SHA256 of `link_id|reference_id|status|payment_id`.
pub fn callback_signature(
    secret: &str,
    link_id: &str,
    reference_id: &str,
    status: &str,
    payment_id: &str,
) -> Result<String, PurchaseError> {
    sign_fields(secret, &[link_id, reference_id, status, payment_id])
        .map_err(|e| PurchaseError::Validation(e.to_string()))
}

/// A payment confirmed by an authenticated callback.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub payment: Payment,
    /// The payment was already `successful` before this delivery.
    pub redelivered: bool,
}

pub struct CallbackVerifier {
    payments: Arc<dyn PaymentRepository>,
    secret: Secret<String>,
}

impl CallbackVerifier {
    pub fn new(payments: Arc<dyn PaymentRepository>, secret: Secret<String>) -> Self {
        Self { payments, secret }
    }

    /// Checks the signature without touching storage.
    pub fn authenticate(&self, callback: &GatewayCallback) -> Result<(), PurchaseError> {
        let valid = verify_fields(
            self.secret.expose_secret(),
            &callback.signed_fields(),
            &callback.razorpay_signature,
        )
        .map_err(|_| PurchaseError::SignatureInvalid)?;

        if valid {
            Ok(())
        } else {
            Err(PurchaseError::SignatureInvalid)
        }
    }

    /// Authenticates the callback and settles the matching payment.
    ///
    /// A delivery for a payment that is already terminal changes nothing:
    /// `successful` is reported as a redelivery, `failed` as `PaymentFailed`.
    #[instrument(
        skip(self, callback),
        fields(
            link_id = %callback.razorpay_payment_link_id,
            reference_id = %callback.razorpay_payment_link_reference_id
        )
    )]
    pub async fn verify(&self, callback: &GatewayCallback) -> Result<VerifiedPayment, PurchaseError> {
        if let Err(e) = self.authenticate(callback) {
            record_callback("signature_invalid");
            tracing::warn!(
                link_id = %callback.razorpay_payment_link_id,
                "Rejected payment callback with invalid signature"
            );
            return Err(e);
        }

        let order_id = Uuid::parse_str(&callback.razorpay_payment_link_reference_id).map_err(|_| {
            PurchaseError::Validation(format!(
                "invalid payment link reference id '{}'",
                callback.razorpay_payment_link_reference_id
            ))
        })?;

        let payment = self
            .payments
            .find_by_transaction(&callback.razorpay_payment_link_id, order_id)
            .await?
            .ok_or_else(|| {
                PurchaseError::NotFound(format!(
                    "payment for link {} and order {} not found",
                    callback.razorpay_payment_link_id, order_id
                ))
            })?;

        let reported = if callback.razorpay_payment_link_status == PAID_STATUS {
            PaymentStatus::Successful
        } else {
            PaymentStatus::Failed
        };

        match self.payments.settle_payment(payment.payment_id, reported).await? {
            Settlement::Applied(settled) if settled.status == PaymentStatus::Successful => {
                record_callback("paid");
                tracing::info!(
                    payment_id = %settled.payment_id,
                    order_id = %settled.order_id,
                    gateway_payment_id = %callback.razorpay_payment_id,
                    "Payment confirmed"
                );
                Ok(VerifiedPayment {
                    payment: settled,
                    redelivered: false,
                })
            }
            Settlement::Applied(settled) => {
                record_callback("failed");
                tracing::info!(
                    payment_id = %settled.payment_id,
                    order_id = %settled.order_id,
                    status = %callback.razorpay_payment_link_status,
                    "Payment reported unsuccessful"
                );
                Err(payment_failed(&callback.razorpay_payment_link_status))
            }
            Settlement::AlreadySettled(current) if current.status == PaymentStatus::Successful => {
                record_callback("redelivered");
                tracing::info!(
                    payment_id = %current.payment_id,
                    order_id = %current.order_id,
                    "Duplicate callback for settled payment"
                );
                Ok(VerifiedPayment {
                    payment: current,
                    redelivered: true,
                })
            }
            Settlement::AlreadySettled(_) => {
                record_callback("redelivered");
                Err(payment_failed(&callback.razorpay_payment_link_status))
            }
        }
    }
}

fn payment_failed(status: &str) -> PurchaseError {
    PurchaseError::PaymentFailed(format!("payment was not completed (status '{}')", status))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "rzp_test_secret";

    fn signed(status: &str) -> GatewayCallback {
        let mut callback = GatewayCallback {
            razorpay_payment_id: "pay_29QQoUBi66xm2f".into(),
            razorpay_payment_link_id: "plink_ExjpAUN3gVHrPJ".into(),
            razorpay_payment_link_reference_id: Uuid::new_v4().to_string(),
            razorpay_payment_link_status: status.into(),
            razorpay_signature: String::new(),
        };
        callback.razorpay_signature = callback_signature(
            SECRET,
            &callback.razorpay_payment_link_id,
            &callback.razorpay_payment_link_reference_id,
            &callback.razorpay_payment_link_status,
            &callback.razorpay_payment_id,
        )
        .unwrap();
        callback
    }

    fn verifier() -> CallbackVerifier {
        CallbackVerifier::new(
            Arc::new(crate::services::MemoryStore::new()),
            Secret::new(SECRET.to_string()),
        )
    }

    #[test]
    fn signature_is_deterministic() {
        let a = callback_signature(SECRET, "plink_1", "ref", "paid", "pay_1").unwrap();
        let b = callback_signature(SECRET, "plink_1", "ref", "paid", "pay_1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn each_field_changes_the_signature() {
        let base = callback_signature(SECRET, "plink_1", "ref", "paid", "pay_1").unwrap();
        let variants = [
            callback_signature(SECRET, "plink_2", "ref", "paid", "pay_1").unwrap(),
            callback_signature(SECRET, "plink_1", "reg", "paid", "pay_1").unwrap(),
            callback_signature(SECRET, "plink_1", "ref", "expired", "pay_1").unwrap(),
            callback_signature(SECRET, "plink_1", "ref", "paid", "pay_2").unwrap(),
        ];
        for variant in variants {
            assert_ne!(variant, base);
        }
    }

    #[test]
    fn field_boundaries_are_significant() {
        let a = callback_signature(SECRET, "ab", "c", "paid", "p").unwrap();
        let b = callback_signature(SECRET, "a", "bc", "paid", "p").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn authenticates_signed_callback() {
        assert!(verifier().authenticate(&signed("paid")).is_ok());
    }

    #[test]
    fn rejects_tampered_status() {
        let mut callback = signed("expired");
        callback.razorpay_payment_link_status = "paid".into();
        assert!(matches!(
            verifier().authenticate(&callback),
            Err(PurchaseError::SignatureInvalid)
        ));
    }

    #[test]
    fn rejects_uppercase_hex() {
        let mut callback = signed("paid");
        callback.razorpay_signature = callback.razorpay_signature.to_uppercase();
        assert!(verifier().authenticate(&callback).is_err());
    }

    #[tokio::test]
    async fn unknown_payment_is_not_found() {
        let err = verifier().verify(&signed("paid")).await.unwrap_err();
        assert!(matches!(err, PurchaseError::NotFound(_)));
    }

    #[tokio::test]
    async fn malformed_reference_is_validation_error() {
        let mut callback = signed("paid");
        callback.razorpay_payment_link_reference_id = "not-a-uuid".into();
        callback.razorpay_signature = callback_signature(
            SECRET,
            &callback.razorpay_payment_link_id,
            "not-a-uuid",
            "paid",
            &callback.razorpay_payment_id,
        )
        .unwrap();
        let err = verifier().verify(&callback).await.unwrap_err();
        assert!(matches!(err, PurchaseError::Validation(_)));
    }
}
