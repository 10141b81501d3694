use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use super::promo::{AppliedDiscount, PromoCodeEvaluator};
use crate::error::PurchaseError;
use crate::models::{Caller, OrderStatus, PlanOrder};
use crate::services::metrics::record_order_created;
use crate::services::repository::{OrderRepository, PlanRepository, RestaurantRepository};

/// Forward-flow input.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PurchaseRequest {
    pub restaurant_id: Uuid,
    pub plan_id: Uuid,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub promo_code: Option<String>,
    #[validate(length(min = 1, max = 8))]
    pub duration: String,
}

/// A persisted pending order plus the promo use it consumed.
#[derive(Debug, Clone)]
pub struct BuiltOrder {
    pub order: PlanOrder,
    pub discount: AppliedDiscount,
}

pub struct OrderBuilder {
    restaurants: Arc<dyn RestaurantRepository>,
    plans: Arc<dyn PlanRepository>,
    orders: Arc<dyn OrderRepository>,
    promo: Arc<PromoCodeEvaluator>,
}

impl OrderBuilder {
    pub fn new(
        restaurants: Arc<dyn RestaurantRepository>,
        plans: Arc<dyn PlanRepository>,
        orders: Arc<dyn OrderRepository>,
        promo: Arc<PromoCodeEvaluator>,
    ) -> Self {
        Self {
            restaurants,
            plans,
            orders,
            promo,
        }
    }

    pub fn promo(&self) -> &PromoCodeEvaluator {
        &self.promo
    }

    /// Prices the plan for the caller's restaurant and persists a pending order.
    #[instrument(
        skip(self, caller, request),
        fields(restaurant_id = %request.restaurant_id, plan_id = %request.plan_id)
    )]
    pub async fn build(
        &self,
        caller: &Caller,
        request: &PurchaseRequest,
        now: DateTime<Utc>,
    ) -> Result<BuiltOrder, PurchaseError> {
        let restaurant = self
            .restaurants
            .get_restaurant(request.restaurant_id)
            .await?
            .ok_or_else(|| {
                PurchaseError::NotFound(format!(
                    "restaurant {} not found",
                    request.restaurant_id
                ))
            })?;

        if !restaurant.is_owned_by(caller.user_id) {
            return Err(PurchaseError::Forbidden(
                "caller does not own this restaurant".to_string(),
            ));
        }

        let plan = self
            .plans
            .get_plan(request.plan_id)
            .await?
            .ok_or_else(|| PurchaseError::NotFound(format!("plan {} not found", request.plan_id)))?;

        let discount = self
            .promo
            .evaluate(request.promo_code.as_deref(), &plan, now)
            .await?;

        let order = PlanOrder {
            order_id: Uuid::new_v4(),
            restaurant_id: restaurant.restaurant_id,
            plan_id: plan.plan_id,
            restaurant_admin_id: restaurant.admin_id,
            promo_code: discount.code.clone(),
            duration: request.duration.clone(),
            base_minor: plan.price_minor,
            discount_minor: discount.discount_minor,
            status: OrderStatus::Pending,
            created_utc: now,
        };

        if let Err(e) = self.orders.insert_order(&order).await {
            tracing::error!(order_id = %order.order_id, error = %e, "Failed to persist order");
            self.promo.release(&discount).await;
            return Err(e);
        }

        record_order_created(discount.promo_code_id.is_some());
        tracing::info!(
            order_id = %order.order_id,
            restaurant_id = %order.restaurant_id,
            plan_id = %order.plan_id,
            base_minor = order.base_minor,
            discount_minor = order.discount_minor,
            "Plan order created"
        );

        Ok(BuiltOrder { order, discount })
    }
}
