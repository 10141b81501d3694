use std::sync::Arc;
use tracing::instrument;

use crate::config::RazorpayConfig;
use crate::error::PurchaseError;
use crate::models::{OrderStatus, Payment, PlanOrder};
use crate::services::metrics::{record_error, record_payment_link};
use crate::services::razorpay::{PaymentGateway, PaymentLinkRequest};
use crate::services::repository::{OrderRepository, PaymentRepository};

/// Gateway settings stamped on every payment link.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub currency: String,
    pub callback_url: String,
}

impl From<&RazorpayConfig> for LinkSettings {
    fn from(config: &RazorpayConfig) -> Self {
        Self {
            currency: config.currency.clone(),
            callback_url: config.callback_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PaymentLinkOutcome {
    /// Net amount was zero; the order is already `successful`.
    NoPaymentRequired,
    Issued { payment: Payment, short_url: String },
}

pub struct PaymentLinkIssuer {
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    settings: LinkSettings,
}

impl PaymentLinkIssuer {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        settings: LinkSettings,
    ) -> Self {
        Self {
            gateway,
            orders,
            payments,
            settings,
        }
    }

    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub async fn issue(&self, order: &PlanOrder) -> Result<PaymentLinkOutcome, PurchaseError> {
        let amount = order.net_minor();

        if amount == 0 {
            if !self
                .orders
                .resolve_order(order.order_id, OrderStatus::Successful)
                .await?
            {
                return Err(PurchaseError::PreconditionFailed(format!(
                    "order {} is no longer pending",
                    order.order_id
                )));
            }
            record_payment_link("not_required");
            tracing::info!(order_id = %order.order_id, "Zero-cost order settled without payment");
            return Ok(PaymentLinkOutcome::NoPaymentRequired);
        }

        let request = PaymentLinkRequest {
            amount,
            currency: self.settings.currency.clone(),
            reference_id: order.order_id.to_string(),
            description: format!("Payment for Order {}", order.order_id),
            callback_url: self.settings.callback_url.clone(),
            callback_method: "get".to_string(),
        };

        let link = self.gateway.create_payment_link(&request).await.map_err(|e| {
            record_payment_link("gateway_error");
            record_error("gateway", "payment_link");
            tracing::error!(
                order_id = %order.order_id,
                amount_minor = amount,
                error = %e,
                "Payment link creation failed"
            );
            PurchaseError::Gateway(e.to_string())
        })?;

        let payment = self
            .payments
            .upsert_pending_payment(&Payment::pending(order.order_id, &link.id, amount))
            .await
            .map_err(|e| {
                record_error(e.kind(), "payment_link");
                tracing::error!(
                    order_id = %order.order_id,
                    link_id = %link.id,
                    error = %e,
                    "Payment link issued but payment could not be recorded"
                );
                e
            })?;

        record_payment_link("issued");
        tracing::info!(
            order_id = %order.order_id,
            payment_id = %payment.payment_id,
            link_id = %link.id,
            amount_minor = amount,
            "Payment link issued"
        );

        Ok(PaymentLinkOutcome::Issued {
            payment,
            short_url: link.short_url,
        })
    }
}
