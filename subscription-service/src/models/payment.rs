use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::OrderStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Successful,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Successful => "successful",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "successful" => PaymentStatus::Successful,
            "failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }

    /// Order status that settles alongside this payment status.
    pub fn order_status(&self) -> OrderStatus {
        match self {
            PaymentStatus::Pending => OrderStatus::Pending,
            PaymentStatus::Successful => OrderStatus::Successful,
            PaymentStatus::Failed => OrderStatus::Failed,
        }
    }
}

/// One charge attempt for an order, keyed by the gateway's payment-link id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: Uuid,
    pub order_id: Uuid,
    pub transaction_id: String,
    pub amount_minor: i64,
    pub status: PaymentStatus,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Payment {
    pub fn pending(order_id: Uuid, transaction_id: impl Into<String>, amount_minor: i64) -> Self {
        let now = Utc::now();
        Self {
            payment_id: Uuid::new_v4(),
            order_id,
            transaction_id: transaction_id.into(),
            amount_minor,
            status: PaymentStatus::Pending,
            created_utc: now,
            updated_utc: now,
        }
    }
}
