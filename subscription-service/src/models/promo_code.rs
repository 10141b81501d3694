use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_value` is a percentage of the plan price.
    Percentage,
    /// `discount_value` is a flat amount in minor units.
    Amount,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Amount => "amount",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(DiscountType::Percentage),
            "amount" => Some(DiscountType::Amount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCode {
    pub promo_code_id: Uuid,
    pub code: String,
    pub discount_value: Decimal,
    pub discount_type: DiscountType,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub remaining_uses: i32,
    pub is_active: bool,
    pub eligible_plan_ids: Vec<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl PromoCode {
    /// A code valid from `now` for `days` days.
    pub fn new(
        code: impl Into<String>,
        discount_type: DiscountType,
        discount_value: Decimal,
        days: i64,
        max_uses: i32,
        eligible_plan_ids: Vec<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            promo_code_id: Uuid::new_v4(),
            code: code.into(),
            discount_value,
            discount_type,
            valid_from: now,
            valid_to: now + Duration::days(days),
            remaining_uses: max_uses,
            is_active: true,
            eligible_plan_ids,
            created_utc: now,
        }
    }

    /// Reason the code cannot be applied to `plan_id` at `now`, if any.
    pub fn rejection_reason(&self, plan_id: Uuid, now: DateTime<Utc>) -> Option<&'static str> {
        if !self.eligible_plan_ids.contains(&plan_id) {
            Some("promo code is not valid for this plan")
        } else if !self.is_active {
            Some("promo code is inactive")
        } else if now < self.valid_from {
            Some("promo code is not yet valid")
        } else if now > self.valid_to {
            Some("promo code has expired")
        } else if self.remaining_uses <= 0 {
            Some("promo code has no remaining uses")
        } else {
            None
        }
    }

    /// Discount in minor units for a plan priced at `price_minor`.
    ///
    /// Percentages round half away from zero to whole minor units. The result
    /// never exceeds the price.
    pub fn discount_for(&self, price_minor: i64) -> i64 {
        let raw = match self.discount_type {
            DiscountType::Percentage => {
                Decimal::from(price_minor) * self.discount_value / Decimal::ONE_HUNDRED
            }
            DiscountType::Amount => self.discount_value,
        };

        let rounded = raw
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(i64::MAX);

        rounded.clamp(0, price_minor.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn promo(discount_type: DiscountType, value: i64, plan_id: Uuid) -> PromoCode {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        PromoCode::new("SAVE", discount_type, Decimal::from(value), 30, 5, vec![plan_id], now)
    }

    #[test]
    fn percentage_of_price() {
        let plan_id = Uuid::new_v4();
        let code = promo(DiscountType::Percentage, 20, plan_id);
        assert_eq!(code.discount_for(1000), 200);
        assert_eq!(code.discount_for(99_900), 19_980);
    }

    #[test]
    fn percentage_discount_never_exceeds_price() {
        let plan_id = Uuid::new_v4();
        for pct in [0, 1, 33, 50, 99, 100, 150, 1000] {
            let code = promo(DiscountType::Percentage, pct, plan_id);
            for price in [0_i64, 1, 3, 999, 1000, 12_345, 1_000_000] {
                let discount = code.discount_for(price);
                assert!(discount <= price, "pct {} price {}", pct, price);
                assert!(discount >= 0);
                if pct <= 100 {
                    let exact = Decimal::from(price) * Decimal::from(pct) / Decimal::ONE_HUNDRED;
                    assert!((Decimal::from(discount) - exact).abs() <= Decimal::new(5, 1));
                }
            }
        }
    }

    #[test]
    fn percentage_rounds_half_away_from_zero() {
        let plan_id = Uuid::new_v4();
        let mut code = promo(DiscountType::Percentage, 0, plan_id);
        code.discount_value = Decimal::new(125, 1);
        // 12.5% of 1004 = 125.5
        assert_eq!(code.discount_for(1004), 126);
        // 12.5% of 1003 = 125.375
        assert_eq!(code.discount_for(1003), 125);
    }

    #[test]
    fn flat_amount_capped_at_price() {
        let plan_id = Uuid::new_v4();
        let code = promo(DiscountType::Amount, 1500, plan_id);
        assert_eq!(code.discount_for(5000), 1500);
        assert_eq!(code.discount_for(1000), 1000);
    }

    #[test]
    fn rejects_outside_window_and_ineligible_plans() {
        let plan_id = Uuid::new_v4();
        let code = promo(DiscountType::Amount, 100, plan_id);
        let inside = code.valid_from + Duration::days(1);

        assert_eq!(code.rejection_reason(plan_id, inside), None);
        assert_eq!(code.rejection_reason(plan_id, code.valid_from), None);
        assert_eq!(code.rejection_reason(plan_id, code.valid_to), None);
        assert_eq!(
            code.rejection_reason(plan_id, code.valid_from - Duration::seconds(1)),
            Some("promo code is not yet valid")
        );
        assert_eq!(
            code.rejection_reason(plan_id, code.valid_to + Duration::seconds(1)),
            Some("promo code has expired")
        );
        assert_eq!(
            code.rejection_reason(Uuid::new_v4(), inside),
            Some("promo code is not valid for this plan")
        );
    }

    #[test]
    fn rejects_inactive_and_exhausted_codes() {
        let plan_id = Uuid::new_v4();
        let mut code = promo(DiscountType::Amount, 100, plan_id);
        let inside = code.valid_from + Duration::days(1);

        code.remaining_uses = 0;
        assert_eq!(
            code.rejection_reason(plan_id, inside),
            Some("promo code has no remaining uses")
        );

        code.remaining_uses = 3;
        code.is_active = false;
        assert_eq!(code.rejection_reason(plan_id, inside), Some("promo code is inactive"));
    }

    #[test]
    fn discount_type_round_trips_through_strings() {
        assert_eq!(DiscountType::from_string("percentage"), Some(DiscountType::Percentage));
        assert_eq!(DiscountType::from_string(DiscountType::Amount.as_str()), Some(DiscountType::Amount));
        assert_eq!(DiscountType::from_string("fixed"), None);
    }
}
