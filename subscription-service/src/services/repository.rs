//! Storage seams for the purchase workflow.
//!
//! Every component receives the repositories it needs at construction time.
//! Implementations must honor the atomicity noted on each method.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::PurchaseError;
use crate::models::{
    OrderStatus, Payment, PaymentStatus, Plan, PlanOrder, PromoCode, Restaurant,
    RestaurantBankAccount, Subscription,
};

#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn get_plan(&self, plan_id: Uuid) -> Result<Option<Plan>, PurchaseError>;
}

#[async_trait]
pub trait RestaurantRepository: Send + Sync {
    async fn get_restaurant(&self, restaurant_id: Uuid)
        -> Result<Option<Restaurant>, PurchaseError>;

    async fn save_bank_account(&self, account: &RestaurantBankAccount)
        -> Result<(), PurchaseError>;
}

#[async_trait]
pub trait PromoCodeRepository: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCode>, PurchaseError>;

    /// Fails with `Conflict` when the code already exists.
    async fn create_promo_code(&self, promo: &PromoCode) -> Result<(), PurchaseError>;

    /// Compare-and-decrement of `remaining_uses`, conditional on the code
    /// still being applicable at `now`. Returns `false` when nothing was
    /// consumed.
    async fn redeem(&self, promo_code_id: Uuid, now: DateTime<Utc>)
        -> Result<bool, PurchaseError>;

    /// Gives back one use consumed by `redeem`.
    async fn restore_use(&self, promo_code_id: Uuid) -> Result<(), PurchaseError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(&self, order: &PlanOrder) -> Result<(), PurchaseError>;

    async fn get_order(&self, order_id: Uuid) -> Result<Option<PlanOrder>, PurchaseError>;

    /// Newest first.
    async fn list_orders_for_admin(&self, admin_id: Uuid)
        -> Result<Vec<PlanOrder>, PurchaseError>;

    /// Moves a `pending` order to `status`. Returns `false` if the order had
    /// already left `pending`.
    async fn resolve_order(&self, order_id: Uuid, status: OrderStatus)
        -> Result<bool, PurchaseError>;
}

/// Result of settling a payment.
#[derive(Debug, Clone)]
pub enum Settlement {
    /// The payment moved out of `pending` on this call.
    Applied(Payment),
    /// The payment was already terminal; nothing changed.
    AlreadySettled(Payment),
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Inserts the pending payment for its order, or refreshes the link on an
    /// existing pending payment for the same order. Fails with `Conflict` if
    /// the order's payment is already terminal.
    async fn upsert_pending_payment(&self, payment: &Payment) -> Result<Payment, PurchaseError>;

    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, PurchaseError>;

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
        order_id: Uuid,
    ) -> Result<Option<Payment>, PurchaseError>;

    /// Moves a `pending` payment and its order to the terminal `status` in
    /// one atomic step.
    async fn settle_payment(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> Result<Settlement, PurchaseError>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<Subscription>, PurchaseError>;

    async fn get_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, PurchaseError>;

    /// Subscriptions bought by `user_id`, newest first.
    async fn list_for_admin(&self, user_id: Uuid) -> Result<Vec<Subscription>, PurchaseError>;

    /// Inserts the subscription and points its restaurant at it, atomically.
    /// A second subscription for the same order fails with `Conflict`; an
    /// unknown restaurant fails with `NotFound` and leaves nothing behind.
    async fn activate_subscription(&self, subscription: &Subscription)
        -> Result<(), PurchaseError>;
}

/// Full storage backend, as wired at startup.
#[async_trait]
pub trait Store:
    PlanRepository
    + RestaurantRepository
    + PromoCodeRepository
    + OrderRepository
    + PaymentRepository
    + SubscriptionRepository
{
    async fn health_check(&self) -> Result<(), PurchaseError>;
}
