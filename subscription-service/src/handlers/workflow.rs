//! Plan purchase workflow endpoints.
//!
//! `POST /workflow/plan/order-payment` starts a purchase and returns the
//! hosted payment link. `GET /workflow/plan/payment-subscription` is the
//! gateway's redirect target once the customer has paid.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{PaymentConfirmedResponse, StartPurchaseResponse};
use crate::middleware::AuthUser;
use crate::models::RESTAURANT_ADMIN_ROLE;
use crate::startup::AppState;
use crate::workflow::{GatewayCallback, PurchaseRequest, PurchaseStarted};

pub async fn start_purchase(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(request): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<StartPurchaseResponse>), AppError> {
    caller.require_role(RESTAURANT_ADMIN_ROLE)?;
    request.validate()?;

    tracing::info!(
        restaurant_id = %request.restaurant_id,
        plan_id = %request.plan_id,
        promo_code = ?request.promo_code,
        "Starting plan purchase"
    );

    let response = match state.workflow.start_purchase(&caller, &request).await? {
        PurchaseStarted::AwaitingPayment {
            order,
            payment_link,
            ..
        } => StartPurchaseResponse {
            order_id: order.order_id,
            payment_link: Some(payment_link),
            message: None,
            subscription: None,
        },
        PurchaseStarted::Activated {
            order,
            subscription,
        } => StartPurchaseResponse {
            order_id: order.order_id,
            payment_link: None,
            message: Some("No payment required, subscription activated".to_string()),
            subscription: Some(subscription.into()),
        },
    };

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(callback): Query<GatewayCallback>,
) -> Result<(StatusCode, Json<PaymentConfirmedResponse>), AppError> {
    caller.require_role(RESTAURANT_ADMIN_ROLE)?;

    tracing::info!(
        payment_link_id = %callback.razorpay_payment_link_id,
        reference_id = %callback.razorpay_payment_link_reference_id,
        status = %callback.razorpay_payment_link_status,
        "Payment callback received"
    );

    let confirmed = state.workflow.confirm_payment(&caller, &callback).await?;

    let (status, message) = if confirmed.newly_activated {
        (StatusCode::CREATED, "Subscription activated")
    } else {
        (StatusCode::OK, "Subscription already active")
    };

    Ok((
        status,
        Json(PaymentConfirmedResponse {
            message: message.to_string(),
            subscription: confirmed.subscription.into(),
        }),
    ))
}
