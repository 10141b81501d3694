use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::error::PurchaseError;
use crate::models::Plan;
use crate::services::metrics::record_promo_redemption;
use crate::services::repository::PromoCodeRepository;

/// Discount granted to an order. `promo_code_id` is set when a use was consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedDiscount {
    pub promo_code_id: Option<Uuid>,
    pub code: Option<String>,
    pub discount_minor: i64,
}

impl AppliedDiscount {
    pub fn none() -> Self {
        Self {
            promo_code_id: None,
            code: None,
            discount_minor: 0,
        }
    }
}

pub struct PromoCodeEvaluator {
    promo_codes: Arc<dyn PromoCodeRepository>,
}

impl PromoCodeEvaluator {
    pub fn new(promo_codes: Arc<dyn PromoCodeRepository>) -> Self {
        Self { promo_codes }
    }

    /// Validates `code` against `plan` and consumes one use.
    ///
    /// A missing or blank code yields a zero discount.
    #[instrument(skip(self, plan), fields(plan_id = %plan.plan_id))]
    pub async fn evaluate(
        &self,
        code: Option<&str>,
        plan: &Plan,
        now: DateTime<Utc>,
    ) -> Result<AppliedDiscount, PurchaseError> {
        let code = match code.map(str::trim) {
            Some(code) if !code.is_empty() => code,
            _ => return Ok(AppliedDiscount::none()),
        };

        let promo = self
            .promo_codes
            .find_by_code(code)
            .await?
            .ok_or_else(|| PurchaseError::NotFound(format!("promo code '{}' not found", code)))?;

        if let Some(reason) = promo.rejection_reason(plan.plan_id, now) {
            record_promo_redemption("rejected");
            return Err(PurchaseError::NotApplicable(reason.to_string()));
        }

        let discount_minor = promo.discount_for(plan.price_minor);

        // Another redemption may have taken the last use since the read.
        if !self.promo_codes.redeem(promo.promo_code_id, now).await? {
            record_promo_redemption("exhausted");
            return Err(PurchaseError::NotApplicable(
                "promo code has no remaining uses".to_string(),
            ));
        }

        record_promo_redemption("redeemed");
        tracing::info!(
            promo_code = %promo.code,
            discount_minor,
            "Promo code redeemed"
        );

        Ok(AppliedDiscount {
            promo_code_id: Some(promo.promo_code_id),
            code: Some(promo.code),
            discount_minor,
        })
    }

    /// Returns a use consumed by `evaluate`. Failures are logged, not raised.
    pub async fn release(&self, discount: &AppliedDiscount) {
        let Some(promo_code_id) = discount.promo_code_id else {
            return;
        };

        match self.promo_codes.restore_use(promo_code_id).await {
            Ok(()) => {
                record_promo_redemption("restored");
                tracing::info!(promo_code_id = %promo_code_id, "Promo code use restored");
            }
            Err(e) => tracing::error!(
                promo_code_id = %promo_code_id,
                error = %e,
                "Failed to restore promo code use"
            ),
        }
    }
}
