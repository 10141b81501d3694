use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchasable subscription plan. Prices are in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: Uuid,
    pub name: String,
    pub description: String,
    pub price_minor: i64,
    pub duration: String,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

impl Plan {
    pub fn new(name: impl Into<String>, price_minor: i64, duration: impl Into<String>) -> Self {
        Self {
            plan_id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            price_minor,
            duration: duration.into(),
            is_active: true,
            created_utc: Utc::now(),
        }
    }
}

/// Subscription length selected by an order's duration code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanDuration {
    OneMonth,
    SixMonths,
    OneYear,
}

impl PlanDuration {
    /// Unknown codes fall back to one month.
    pub fn from_code(code: &str) -> Self {
        match code {
            "1M" => PlanDuration::OneMonth,
            "6M" => PlanDuration::SixMonths,
            "1Y" => PlanDuration::OneYear,
            _ => PlanDuration::OneMonth,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanDuration::OneMonth => "1M",
            PlanDuration::SixMonths => "6M",
            PlanDuration::OneYear => "1Y",
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            PlanDuration::OneMonth => 1,
            PlanDuration::SixMonths => 6,
            PlanDuration::OneYear => 12,
        }
    }

    /// Calendar-month arithmetic; day-of-month is clamped to the target month's length.
    pub fn end_date(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start + Months::new(self.months())
    }
}
