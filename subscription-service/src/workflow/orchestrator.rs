use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;

use super::activation::SubscriptionActivator;
use super::callback::{CallbackVerifier, GatewayCallback};
use super::order::{BuiltOrder, OrderBuilder, PurchaseRequest};
use super::payment_link::{PaymentLinkIssuer, PaymentLinkOutcome};
use crate::error::PurchaseError;
use crate::models::{Caller, OrderStatus, Payment, PlanOrder, Subscription};
use crate::services::metrics::record_error;
use crate::services::repository::{OrderRepository, SubscriptionRepository};

/// Result of the forward flow.
#[derive(Debug, Clone)]
pub enum PurchaseStarted {
    AwaitingPayment {
        order: PlanOrder,
        payment: Payment,
        payment_link: String,
    },
    /// Zero-cost order, activated without a payment.
    Activated {
        order: PlanOrder,
        subscription: Subscription,
    },
}

/// Result of the callback flow.
#[derive(Debug, Clone)]
pub struct PaymentConfirmed {
    pub subscription: Subscription,
    /// False when this delivery found the subscription already active.
    pub newly_activated: bool,
}

/// Sequences the purchase steps. The forward and callback flows share state
/// only through persisted orders and payments.
pub struct PlanPurchaseWorkflow {
    builder: OrderBuilder,
    issuer: PaymentLinkIssuer,
    verifier: CallbackVerifier,
    activator: SubscriptionActivator,
    orders: Arc<dyn OrderRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl PlanPurchaseWorkflow {
    pub fn new(
        builder: OrderBuilder,
        issuer: PaymentLinkIssuer,
        verifier: CallbackVerifier,
        activator: SubscriptionActivator,
        orders: Arc<dyn OrderRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self {
            builder,
            issuer,
            verifier,
            activator,
            orders,
            subscriptions,
        }
    }

    /// Order, then payment link. A zero-cost order is activated right away.
    #[instrument(skip(self, caller, request), fields(user_id = %caller.user_id))]
    pub async fn start_purchase(
        &self,
        caller: &Caller,
        request: &PurchaseRequest,
    ) -> Result<PurchaseStarted, PurchaseError> {
        let built = self
            .builder
            .build(caller, request, Utc::now())
            .await
            .inspect_err(|e| record_error(e.kind(), "build_order"))?;

        match self.issuer.issue(&built.order).await {
            Ok(PaymentLinkOutcome::Issued { payment, short_url }) => {
                Ok(PurchaseStarted::AwaitingPayment {
                    order: built.order,
                    payment,
                    payment_link: short_url,
                })
            }
            Ok(PaymentLinkOutcome::NoPaymentRequired) => {
                let subscription = self
                    .activator
                    .activate_without_payment(caller, built.order.order_id)
                    .await
                    .inspect_err(|e| record_error(e.kind(), "activate"))?;
                let mut order = built.order;
                order.status = OrderStatus::Successful;
                Ok(PurchaseStarted::Activated {
                    order,
                    subscription,
                })
            }
            Err(e @ PurchaseError::Gateway(_)) => {
                self.compensate(&built).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Undo the forward flow's local effects after the gateway refused a link.
    async fn compensate(&self, built: &BuiltOrder) {
        self.builder.promo().release(&built.discount).await;

        match self
            .orders
            .resolve_order(built.order.order_id, OrderStatus::Failed)
            .await
        {
            Ok(_) => tracing::info!(
                order_id = %built.order.order_id,
                "Order marked failed after payment link error"
            ),
            Err(e) => tracing::error!(
                order_id = %built.order.order_id,
                error = %e,
                "Failed to mark order failed after payment link error"
            ),
        }
    }

    /// Authenticate the gateway callback, settle the payment, activate.
    ///
    /// Duplicate deliveries return the existing subscription.
    #[instrument(skip(self, caller, callback), fields(user_id = %caller.user_id))]
    pub async fn confirm_payment(
        &self,
        caller: &Caller,
        callback: &GatewayCallback,
    ) -> Result<PaymentConfirmed, PurchaseError> {
        let verified = self
            .verifier
            .verify(callback)
            .await
            .inspect_err(|e| record_error(e.kind(), "verify_callback"))?;

        let order_id = verified.payment.order_id;

        if verified.redelivered {
            if let Some(subscription) = self.subscriptions.find_by_order(order_id).await? {
                return Ok(PaymentConfirmed {
                    subscription,
                    newly_activated: false,
                });
            }
        }

        match self
            .activator
            .activate(caller, verified.payment.payment_id)
            .await
        {
            Ok(subscription) => Ok(PaymentConfirmed {
                subscription,
                newly_activated: true,
            }),
            // A concurrent delivery for the same order won the insert.
            Err(PurchaseError::Conflict(msg)) => {
                match self.subscriptions.find_by_order(order_id).await? {
                    Some(subscription) => Ok(PaymentConfirmed {
                        subscription,
                        newly_activated: false,
                    }),
                    None => Err(PurchaseError::Conflict(msg)),
                }
            }
            Err(e) => {
                record_error(e.kind(), "activate");
                if matches!(e, PurchaseError::Persistence(_)) {
                    tracing::error!(
                        order_id = %order_id,
                        payment_id = %verified.payment.payment_id,
                        error = %e,
                        "Payment settled but subscription activation failed"
                    );
                }
                Err(e)
            }
        }
    }
}
