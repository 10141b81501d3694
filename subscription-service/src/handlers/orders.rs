//! Plan order read endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::OrderResponse;
use crate::error::PurchaseError;
use crate::middleware::AuthUser;
use crate::models::ADMIN_ROLE;
use crate::startup::AppState;

/// Orders placed by the caller, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = state.orders.list_orders_for_admin(caller.user_id).await?;

    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// A single order. Only its placer or a platform admin may read it.
pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state
        .orders
        .get_order(order_id)
        .await?
        .ok_or_else(|| PurchaseError::NotFound(format!("order {} not found", order_id)))?;

    if !order.is_owned_by(caller.user_id) && caller.role != ADMIN_ROLE {
        return Err(PurchaseError::Forbidden("order belongs to another user".to_string()).into());
    }

    Ok(Json(order.into()))
}
