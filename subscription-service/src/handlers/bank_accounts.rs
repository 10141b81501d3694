use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{BankAccountResponse, LinkBankAccountRequest};
use crate::middleware::AuthUser;
use crate::startup::AppState;

/// Register the restaurant's payout bank account with the gateway.
pub async fn link_bank_account(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(restaurant_id): Path<Uuid>,
    Json(request): Json<LinkBankAccountRequest>,
) -> Result<(StatusCode, Json<BankAccountResponse>), AppError> {
    request.validate()?;

    let account = state
        .bank_accounts
        .link(&caller, restaurant_id, request.into())
        .await?;

    Ok((StatusCode::CREATED, Json(account.into())))
}
