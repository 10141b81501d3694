//! Request and response bodies for the HTTP API.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    BankAccountDetails, DiscountType, OrderStatus, PlanOrder, PromoCode, RestaurantBankAccount,
    Subscription,
};

// =========================================================================
// Workflow
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StartPurchaseResponse {
    pub order_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentConfirmedResponse {
    pub message: String,
    pub subscription: SubscriptionResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub plan_id: Uuid,
    pub order_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub auto_renewal: bool,
    pub canceled: bool,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(s: Subscription) -> Self {
        Self {
            subscription_id: s.subscription_id,
            user_id: s.user_id,
            restaurant_id: s.restaurant_id,
            plan_id: s.plan_id,
            order_id: s.order_id,
            payment_id: s.payment_id,
            start_date: s.start_date,
            end_date: s.end_date,
            auto_renewal: s.auto_renewal,
            canceled: s.canceled,
        }
    }
}

// =========================================================================
// Orders
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub restaurant_id: Uuid,
    pub plan_id: Uuid,
    pub promo_code: Option<String>,
    pub duration: String,
    pub base_minor: i64,
    pub discount_minor: i64,
    pub net_minor: i64,
    pub status: OrderStatus,
    pub created_utc: DateTime<Utc>,
}

impl From<PlanOrder> for OrderResponse {
    fn from(o: PlanOrder) -> Self {
        Self {
            net_minor: o.net_minor(),
            order_id: o.order_id,
            restaurant_id: o.restaurant_id,
            plan_id: o.plan_id,
            promo_code: o.promo_code,
            duration: o.duration,
            base_minor: o.base_minor,
            discount_minor: o.discount_minor,
            status: o.status,
            created_utc: o.created_utc,
        }
    }
}

// =========================================================================
// Promo codes
// =========================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePromoCodeRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    /// Percent for `percentage`, minor units for `amount`.
    pub discount_value: Decimal,
    pub discount_type: DiscountType,
    #[validate(range(min = 1, max = 3650))]
    pub days: i64,
    #[validate(range(min = 0))]
    pub max_uses: i32,
    #[validate(length(min = 1))]
    pub plan_ids: Vec<Uuid>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl CreatePromoCodeRequest {
    /// Range checks `validator` cannot express on decimals.
    pub fn discount_error(&self) -> Option<&'static str> {
        if self.discount_value.is_sign_negative() {
            Some("discount_value must not be negative")
        } else if self.discount_type == DiscountType::Percentage
            && self.discount_value > Decimal::ONE_HUNDRED
        {
            Some("percentage discount must not exceed 100")
        } else {
            None
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromoCodeResponse {
    pub promo_code_id: Uuid,
    pub code: String,
    pub discount_value: Decimal,
    pub discount_type: DiscountType,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub remaining_uses: i32,
    pub is_active: bool,
    pub plan_ids: Vec<Uuid>,
}

impl From<PromoCode> for PromoCodeResponse {
    fn from(p: PromoCode) -> Self {
        Self {
            promo_code_id: p.promo_code_id,
            code: p.code,
            discount_value: p.discount_value,
            discount_type: p.discount_type,
            valid_from: p.valid_from,
            valid_to: p.valid_to,
            remaining_uses: p.remaining_uses,
            is_active: p.is_active,
            plan_ids: p.eligible_plan_ids,
        }
    }
}

// =========================================================================
// Bank accounts
// =========================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct LinkBankAccountRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 20))]
    pub phone: String,
    #[validate(length(min = 1, max = 100))]
    pub bank_name: String,
    #[validate(length(min = 6, max = 34))]
    pub account_number: String,
    #[validate(length(min = 1, max = 100))]
    pub account_holder: String,
    #[validate(length(equal = 11))]
    pub ifsc_code: String,
    #[validate(length(min = 1, max = 100))]
    pub branch: String,
}

impl From<LinkBankAccountRequest> for BankAccountDetails {
    fn from(r: LinkBankAccountRequest) -> Self {
        Self {
            email: r.email,
            phone: r.phone,
            bank_name: r.bank_name,
            account_number: r.account_number,
            account_holder: r.account_holder,
            ifsc_code: r.ifsc_code,
            branch: r.branch,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BankAccountResponse {
    pub bank_account_id: Uuid,
    pub restaurant_id: Uuid,
    pub contact_id: String,
    pub fund_account_id: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub ifsc_code: String,
}

impl From<RestaurantBankAccount> for BankAccountResponse {
    fn from(a: RestaurantBankAccount) -> Self {
        Self {
            account_number: a.masked_account_number(),
            bank_account_id: a.bank_account_id,
            restaurant_id: a.restaurant_id,
            contact_id: a.contact_id,
            fund_account_id: a.fund_account_id,
            bank_name: a.bank_name,
            account_holder: a.account_holder,
            ifsc_code: a.ifsc_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn promo_request(discount_type: DiscountType, value: Decimal) -> CreatePromoCodeRequest {
        CreatePromoCodeRequest {
            code: "WELCOME".into(),
            discount_value: value,
            discount_type,
            days: 30,
            max_uses: 10,
            plan_ids: vec![Uuid::new_v4()],
            is_active: true,
        }
    }

    #[test]
    fn percentage_above_hundred_is_rejected() {
        let request = promo_request(DiscountType::Percentage, Decimal::from(120));
        assert!(request.discount_error().is_some());
        let request = promo_request(DiscountType::Amount, Decimal::from(120_000));
        assert!(request.discount_error().is_none());
    }

    #[test]
    fn negative_discount_is_rejected() {
        let request = promo_request(DiscountType::Amount, Decimal::from(-1));
        assert!(request.discount_error().is_some());
    }

    #[test]
    fn empty_plan_list_fails_validation() {
        let mut request = promo_request(DiscountType::Amount, Decimal::from(100));
        request.plan_ids.clear();
        assert!(request.validate().is_err());
    }
}
