use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time-bounded entitlement created from a settled order.
///
/// Renewal, cancellation and grace-period fields are stored but not mutated
/// by the purchase flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub plan_id: Uuid,
    pub order_id: Uuid,
    /// Empty for zero-cost orders, which never reach the gateway.
    pub payment_id: Option<Uuid>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub auto_renewal: bool,
    pub canceled: bool,
    pub canceled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub in_grace_period: bool,
    pub grace_end_date: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}
