//! Application startup and lifecycle management.

use crate::config::PurchaseConfig;
use crate::handlers;
use crate::middleware::JwtVerifier;
use crate::services::{
    get_metrics, init_metrics, BankAccountLinker, OrderRepository, PaymentGateway, PgStore,
    PromoCodeRepository, RazorpayClient, Store, SubscriptionRepository,
};
use crate::workflow::{
    CallbackVerifier, LinkSettings, OrderBuilder, PaymentLinkIssuer, PlanPurchaseWorkflow,
    PromoCodeEvaluator, SubscriptionActivator,
};
use axum::{
    extract::State,
    http::{Request, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use secrecy::ExposeSecret;
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: PurchaseConfig,
    pub workflow: Arc<PlanPurchaseWorkflow>,
    pub orders: Arc<dyn OrderRepository>,
    pub promo_codes: Arc<dyn PromoCodeRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub bank_accounts: Arc<BankAccountLinker>,
    pub store: Arc<dyn Store>,
    pub jwt: JwtVerifier,
}

impl AppState {
    /// Wire every workflow component to one storage backend and gateway.
    pub fn new<S>(config: PurchaseConfig, store: Arc<S>, gateway: Arc<dyn PaymentGateway>) -> Self
    where
        S: Store + 'static,
    {
        let promo = Arc::new(PromoCodeEvaluator::new(store.clone()));

        let builder = OrderBuilder::new(store.clone(), store.clone(), store.clone(), promo);
        let issuer = PaymentLinkIssuer::new(
            gateway.clone(),
            store.clone(),
            store.clone(),
            LinkSettings::from(&config.razorpay),
        );
        let verifier = CallbackVerifier::new(store.clone(), config.razorpay.key_secret.clone());
        let activator =
            SubscriptionActivator::new(store.clone(), store.clone(), store.clone(), store.clone());

        let workflow = PlanPurchaseWorkflow::new(
            builder,
            issuer,
            verifier,
            activator,
            store.clone(),
            store.clone(),
        );

        Self {
            jwt: JwtVerifier::new(&config.auth.jwt_secret),
            workflow: Arc::new(workflow),
            orders: store.clone(),
            promo_codes: store.clone(),
            subscriptions: store.clone(),
            bank_accounts: Arc::new(BankAccountLinker::new(store.clone(), gateway)),
            store,
            config,
        }
    }
}

/// Liveness endpoint for Docker/K8s.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => {
            tracing::debug!("Health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": state.config.service_name,
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": state.config.service_name,
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness endpoint for K8s.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Build the HTTP router over `state`.
pub fn router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
                user_id = tracing::field::Empty,
            )
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let api = Router::new()
        .route(
            "/workflow/plan/order-payment",
            post(handlers::workflow::start_purchase),
        )
        .route(
            "/workflow/plan/payment-subscription",
            get(handlers::workflow::confirm_payment),
        )
        .route("/orders/plan", get(handlers::orders::list_orders))
        .route("/orders/plan/:order_id", get(handlers::orders::get_order))
        .route(
            "/subscriptions",
            get(handlers::subscriptions::list_subscriptions),
        )
        .route(
            "/subscriptions/:subscription_id",
            get(handlers::subscriptions::get_subscription),
        )
        .route("/promo-codes", post(handlers::promo_codes::create_promo_code))
        .route(
            "/restaurants/:restaurant_id/bank-account",
            post(handlers::bank_accounts::link_bank_account),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", api)
        .layer(trace_layer)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application against PostgreSQL and the live Razorpay API.
    pub async fn build(config: PurchaseConfig) -> Result<Self, AppError> {
        let store = PgStore::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        store.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        let razorpay = RazorpayClient::new(config.razorpay.clone())?;
        if !razorpay.is_configured() {
            tracing::warn!("Razorpay credentials missing, payment links will fail");
        }

        Self::build_with(config, Arc::new(store), Arc::new(razorpay)).await
    }

    /// Build the application over an explicit store and gateway.
    pub async fn build_with<S>(
        config: PurchaseConfig,
        store: Arc<S>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Result<Self, AppError>
    where
        S: Store + 'static,
    {
        init_metrics();

        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %http_addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        let router = router(AppState::new(config, store, gateway));

        Ok(Self {
            http_port,
            http_listener,
            router,
        })
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Run the HTTP server until it fails or the task is dropped.
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        tracing::info!(
            service = "subscription-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.http_port,
            "Service ready to accept connections"
        );

        axum::serve(self.http_listener, self.router)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "HTTP server error");
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}
