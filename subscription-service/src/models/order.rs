use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Successful,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Successful => "successful",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "successful" => OrderStatus::Successful,
            "failed" => OrderStatus::Failed,
            _ => OrderStatus::Pending,
        }
    }
}

/// A purchase intent for one plan on behalf of one restaurant.
///
/// Only `status` changes after creation, and only away from `Pending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanOrder {
    pub order_id: Uuid,
    pub restaurant_id: Uuid,
    pub plan_id: Uuid,
    /// Restaurant owner at order time; activation authorizes against this value.
    pub restaurant_admin_id: Uuid,
    pub promo_code: Option<String>,
    pub duration: String,
    pub base_minor: i64,
    pub discount_minor: i64,
    pub status: OrderStatus,
    pub created_utc: DateTime<Utc>,
}

impl PlanOrder {
    pub fn net_minor(&self) -> i64 {
        self.base_minor - self.discount_minor
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.restaurant_admin_id == user_id
    }
}
