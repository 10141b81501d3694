use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{CreatePromoCodeRequest, PromoCodeResponse};
use crate::middleware::AuthUser;
use crate::models::{PromoCode, ADMIN_ROLE};
use crate::startup::AppState;

/// Create a promo code. Platform admins only.
pub async fn create_promo_code(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(request): Json<CreatePromoCodeRequest>,
) -> Result<(StatusCode, Json<PromoCodeResponse>), AppError> {
    caller.require_role(ADMIN_ROLE)?;
    request.validate()?;
    if let Some(reason) = request.discount_error() {
        return Err(AppError::BadRequest(anyhow::anyhow!(reason)));
    }

    let mut promo = PromoCode::new(
        request.code.trim(),
        request.discount_type,
        request.discount_value,
        request.days,
        request.max_uses,
        request.plan_ids,
        Utc::now(),
    );
    promo.is_active = request.is_active;

    state.promo_codes.create_promo_code(&promo).await?;

    tracing::info!(
        promo_code_id = %promo.promo_code_id,
        code = %promo.code,
        discount_type = promo.discount_type.as_str(),
        remaining_uses = promo.remaining_uses,
        "Promo code created"
    );

    Ok((StatusCode::CREATED, Json(promo.into())))
}
