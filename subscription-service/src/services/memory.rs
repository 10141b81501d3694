//! In-process store with the same atomicity guarantees as `PgStore`.
//!
//! All tables sit behind one async mutex, so every trait method is a single
//! critical section.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::PurchaseError;
use crate::models::{
    OrderStatus, Payment, PaymentStatus, Plan, PlanOrder, PromoCode, Restaurant,
    RestaurantBankAccount, Subscription,
};
use crate::services::repository::{
    OrderRepository, PaymentRepository, PlanRepository, PromoCodeRepository,
    RestaurantRepository, Settlement, Store, SubscriptionRepository,
};

#[derive(Default)]
struct Tables {
    plans: HashMap<Uuid, Plan>,
    restaurants: HashMap<Uuid, Restaurant>,
    promo_codes: HashMap<Uuid, PromoCode>,
    orders: HashMap<Uuid, PlanOrder>,
    payments: HashMap<Uuid, Payment>,
    subscriptions: HashMap<Uuid, Subscription>,
    bank_accounts: Vec<RestaurantBankAccount>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_plan(&self, plan: Plan) {
        self.tables.lock().await.plans.insert(plan.plan_id, plan);
    }

    pub async fn insert_restaurant(&self, restaurant: Restaurant) {
        self.tables
            .lock()
            .await
            .restaurants
            .insert(restaurant.restaurant_id, restaurant);
    }

    pub async fn restaurant(&self, restaurant_id: Uuid) -> Option<Restaurant> {
        self.tables
            .lock()
            .await
            .restaurants
            .get(&restaurant_id)
            .cloned()
    }

    pub async fn promo_code(&self, code: &str) -> Option<PromoCode> {
        self.tables
            .lock()
            .await
            .promo_codes
            .values()
            .find(|p| p.code == code)
            .cloned()
    }

    pub async fn payments_for_order(&self, order_id: Uuid) -> Vec<Payment> {
        self.tables
            .lock()
            .await
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect()
    }

    pub async fn subscriptions_for_order(&self, order_id: Uuid) -> Vec<Subscription> {
        self.tables
            .lock()
            .await
            .subscriptions
            .values()
            .filter(|s| s.order_id == order_id)
            .cloned()
            .collect()
    }

    pub async fn bank_accounts(&self, restaurant_id: Uuid) -> Vec<RestaurantBankAccount> {
        self.tables
            .lock()
            .await
            .bank_accounts
            .iter()
            .filter(|a| a.restaurant_id == restaurant_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PlanRepository for MemoryStore {
    async fn get_plan(&self, plan_id: Uuid) -> Result<Option<Plan>, PurchaseError> {
        Ok(self.tables.lock().await.plans.get(&plan_id).cloned())
    }
}

#[async_trait]
impl RestaurantRepository for MemoryStore {
    async fn get_restaurant(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Option<Restaurant>, PurchaseError> {
        Ok(self.restaurant(restaurant_id).await)
    }

    async fn save_bank_account(
        &self,
        account: &RestaurantBankAccount,
    ) -> Result<(), PurchaseError> {
        let mut tables = self.tables.lock().await;
        if !tables.restaurants.contains_key(&account.restaurant_id) {
            return Err(PurchaseError::NotFound(format!(
                "restaurant {} not found",
                account.restaurant_id
            )));
        }
        tables.bank_accounts.push(account.clone());
        Ok(())
    }
}

#[async_trait]
impl PromoCodeRepository for MemoryStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCode>, PurchaseError> {
        Ok(self.promo_code(code).await)
    }

    async fn create_promo_code(&self, promo: &PromoCode) -> Result<(), PurchaseError> {
        let mut tables = self.tables.lock().await;
        if tables.promo_codes.values().any(|p| p.code == promo.code) {
            return Err(PurchaseError::Conflict(format!(
                "promo code '{}' already exists",
                promo.code
            )));
        }
        tables
            .promo_codes
            .insert(promo.promo_code_id, promo.clone());
        Ok(())
    }

    async fn redeem(&self, promo_code_id: Uuid, now: DateTime<Utc>) -> Result<bool, PurchaseError> {
        let mut tables = self.tables.lock().await;
        match tables.promo_codes.get_mut(&promo_code_id) {
            Some(promo)
                if promo.remaining_uses > 0
                    && promo.is_active
                    && promo.valid_from <= now
                    && now <= promo.valid_to =>
            {
                promo.remaining_uses -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_use(&self, promo_code_id: Uuid) -> Result<(), PurchaseError> {
        if let Some(promo) = self.tables.lock().await.promo_codes.get_mut(&promo_code_id) {
            promo.remaining_uses += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert_order(&self, order: &PlanOrder) -> Result<(), PurchaseError> {
        let mut tables = self.tables.lock().await;
        if tables.orders.contains_key(&order.order_id) {
            return Err(PurchaseError::Persistence(format!(
                "duplicate order id {}",
                order.order_id
            )));
        }
        tables.orders.insert(order.order_id, order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<PlanOrder>, PurchaseError> {
        Ok(self.tables.lock().await.orders.get(&order_id).cloned())
    }

    async fn list_orders_for_admin(
        &self,
        admin_id: Uuid,
    ) -> Result<Vec<PlanOrder>, PurchaseError> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<PlanOrder> = tables
            .orders
            .values()
            .filter(|o| o.restaurant_admin_id == admin_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(orders)
    }

    async fn resolve_order(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<bool, PurchaseError> {
        let mut tables = self.tables.lock().await;
        match tables.orders.get_mut(&order_id) {
            Some(order) if order.status == OrderStatus::Pending => {
                order.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn upsert_pending_payment(&self, payment: &Payment) -> Result<Payment, PurchaseError> {
        let mut tables = self.tables.lock().await;
        if !tables.orders.contains_key(&payment.order_id) {
            return Err(PurchaseError::Persistence(format!(
                "order {} does not exist",
                payment.order_id
            )));
        }

        let existing = tables
            .payments
            .values_mut()
            .find(|p| p.order_id == payment.order_id);

        match existing {
            Some(current) if current.status == PaymentStatus::Pending => {
                current.transaction_id = payment.transaction_id.clone();
                current.amount_minor = payment.amount_minor;
                current.updated_utc = payment.created_utc;
                Ok(current.clone())
            }
            Some(_) => Err(PurchaseError::Conflict(format!(
                "payment for order {} is already settled",
                payment.order_id
            ))),
            None => {
                let mut stored = payment.clone();
                stored.status = PaymentStatus::Pending;
                tables.payments.insert(stored.payment_id, stored.clone());
                Ok(stored)
            }
        }
    }

    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, PurchaseError> {
        Ok(self.tables.lock().await.payments.get(&payment_id).cloned())
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
        order_id: Uuid,
    ) -> Result<Option<Payment>, PurchaseError> {
        Ok(self
            .tables
            .lock()
            .await
            .payments
            .values()
            .find(|p| p.transaction_id == transaction_id && p.order_id == order_id)
            .cloned())
    }

    async fn settle_payment(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> Result<Settlement, PurchaseError> {
        let mut guard = self.tables.lock().await;
        let tables = &mut *guard;

        let payment = tables
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| PurchaseError::NotFound(format!("payment {} not found", payment_id)))?;

        if payment.status != PaymentStatus::Pending {
            return Ok(Settlement::AlreadySettled(payment.clone()));
        }

        payment.status = status;
        payment.updated_utc = Utc::now();
        let settled = payment.clone();

        if let Some(order) = tables.orders.get_mut(&settled.order_id) {
            if order.status == OrderStatus::Pending {
                order.status = status.order_status();
            }
        }

        Ok(Settlement::Applied(settled))
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<Subscription>, PurchaseError> {
        Ok(self
            .tables
            .lock()
            .await
            .subscriptions
            .values()
            .find(|s| s.order_id == order_id)
            .cloned())
    }

    async fn get_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, PurchaseError> {
        Ok(self
            .tables
            .lock()
            .await
            .subscriptions
            .get(&subscription_id)
            .cloned())
    }

    async fn list_for_admin(&self, user_id: Uuid) -> Result<Vec<Subscription>, PurchaseError> {
        let tables = self.tables.lock().await;
        let mut subscriptions: Vec<Subscription> = tables
            .subscriptions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        subscriptions.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(subscriptions)
    }

    async fn activate_subscription(
        &self,
        subscription: &Subscription,
    ) -> Result<(), PurchaseError> {
        let mut guard = self.tables.lock().await;
        let tables = &mut *guard;

        if tables
            .subscriptions
            .values()
            .any(|s| s.order_id == subscription.order_id)
        {
            return Err(PurchaseError::Conflict(format!(
                "subscription already exists for order {}",
                subscription.order_id
            )));
        }

        let restaurant = tables
            .restaurants
            .get_mut(&subscription.restaurant_id)
            .ok_or_else(|| {
                PurchaseError::NotFound(format!(
                    "restaurant {} not found",
                    subscription.restaurant_id
                ))
            })?;

        restaurant.subscription_id = Some(subscription.subscription_id);
        tables
            .subscriptions
            .insert(subscription.subscription_id, subscription.clone());
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), PurchaseError> {
        Ok(())
    }
}
