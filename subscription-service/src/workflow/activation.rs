use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::error::PurchaseError;
use crate::models::{Caller, OrderStatus, PaymentStatus, PlanDuration, PlanOrder, Subscription};
use crate::services::metrics::record_subscription_activated;
use crate::services::repository::{
    OrderRepository, PaymentRepository, PlanRepository, SubscriptionRepository,
};

pub struct SubscriptionActivator {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    plans: Arc<dyn PlanRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl SubscriptionActivator {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        plans: Arc<dyn PlanRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self {
            orders,
            payments,
            plans,
            subscriptions,
        }
    }

    /// Activates the subscription paid for by `payment_id`.
    #[instrument(skip(self, caller), fields(payment_id = %payment_id))]
    pub async fn activate(
        &self,
        caller: &Caller,
        payment_id: Uuid,
    ) -> Result<Subscription, PurchaseError> {
        let payment = self
            .payments
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| PurchaseError::NotFound(format!("payment {} not found", payment_id)))?;

        let order = self.load_order(payment.order_id).await?;

        if payment.status != PaymentStatus::Successful {
            return Err(PurchaseError::PreconditionFailed(format!(
                "payment {} is {}, not successful",
                payment_id,
                payment.status.as_str()
            )));
        }

        self.create(caller, &order, Some(payment.payment_id)).await
    }

    /// Activates a zero-cost order that settled without a payment.
    #[instrument(skip(self, caller), fields(order_id = %order_id))]
    pub async fn activate_without_payment(
        &self,
        caller: &Caller,
        order_id: Uuid,
    ) -> Result<Subscription, PurchaseError> {
        let order = self.load_order(order_id).await?;

        if order.status != OrderStatus::Successful || order.net_minor() != 0 {
            return Err(PurchaseError::PreconditionFailed(format!(
                "order {} requires a successful payment",
                order_id
            )));
        }

        self.create(caller, &order, None).await
    }

    async fn load_order(&self, order_id: Uuid) -> Result<PlanOrder, PurchaseError> {
        self.orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| PurchaseError::NotFound(format!("order {} not found", order_id)))
    }

    async fn create(
        &self,
        caller: &Caller,
        order: &PlanOrder,
        payment_id: Option<Uuid>,
    ) -> Result<Subscription, PurchaseError> {
        // Authorize against the owner stamped on the order, not the restaurant's current owner.
        if !order.is_owned_by(caller.user_id) {
            return Err(PurchaseError::Forbidden(
                "caller does not own the order's restaurant".to_string(),
            ));
        }

        if self.subscriptions.find_by_order(order.order_id).await?.is_some() {
            return Err(PurchaseError::Conflict(format!(
                "subscription already exists for order {}",
                order.order_id
            )));
        }

        let plan = self
            .plans
            .get_plan(order.plan_id)
            .await?
            .ok_or_else(|| PurchaseError::NotFound(format!("plan {} not found", order.plan_id)))?;

        let start_date = Utc::now();
        let end_date = PlanDuration::from_code(&order.duration).end_date(start_date);

        let subscription = Subscription {
            subscription_id: Uuid::new_v4(),
            user_id: order.restaurant_admin_id,
            restaurant_id: order.restaurant_id,
            plan_id: plan.plan_id,
            order_id: order.order_id,
            payment_id,
            start_date,
            end_date,
            auto_renewal: false,
            canceled: false,
            canceled_at: None,
            cancellation_reason: None,
            in_grace_period: false,
            grace_end_date: None,
            created_utc: start_date,
        };

        // The unique order constraint settles races the lookup above cannot.
        self.subscriptions.activate_subscription(&subscription).await?;

        record_subscription_activated();
        tracing::info!(
            subscription_id = %subscription.subscription_id,
            order_id = %order.order_id,
            restaurant_id = %order.restaurant_id,
            plan_id = %plan.plan_id,
            end_date = %subscription.end_date,
            "Subscription activated"
        );

        Ok(subscription)
    }
}
