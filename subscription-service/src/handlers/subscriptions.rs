//! Subscription read endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::SubscriptionResponse;
use crate::error::PurchaseError;
use crate::middleware::AuthUser;
use crate::models::ADMIN_ROLE;
use crate::startup::AppState;

/// Subscriptions bought by the caller, newest first.
pub async fn list_subscriptions(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<SubscriptionResponse>>, AppError> {
    let subscriptions = state.subscriptions.list_for_admin(caller.user_id).await?;

    Ok(Json(
        subscriptions
            .into_iter()
            .map(SubscriptionResponse::from)
            .collect(),
    ))
}

/// A single subscription, readable by its buyer or a platform admin.
pub async fn get_subscription(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(subscription_id): Path<Uuid>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    let subscription = state
        .subscriptions
        .get_subscription(subscription_id)
        .await?
        .ok_or_else(|| {
            PurchaseError::NotFound(format!("subscription {} not found", subscription_id))
        })?;

    if subscription.user_id != caller.user_id && caller.role != ADMIN_ROLE {
        return Err(
            PurchaseError::Forbidden("subscription belongs to another user".to_string()).into(),
        );
    }

    Ok(Json(subscription.into()))
}
