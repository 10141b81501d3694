//! Prometheus metrics for the purchase workflow.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter,
    register_int_counter_vec, Encoder, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Recorder behind the `metrics` macros used by the HTTP middleware.
static METRICS_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "subscription_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Plan orders created, split by whether a promo code was applied
pub static ORDERS_CREATED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("subscription_orders_created_total", "Total plan orders created"),
        &["promo"]
    )
    .expect("Failed to register ORDERS_CREATED_TOTAL")
});

pub static PROMO_REDEMPTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "subscription_promo_redemptions_total",
            "Promo code redemptions by outcome"
        ),
        &["outcome"]
    )
    .expect("Failed to register PROMO_REDEMPTIONS_TOTAL")
});

pub static PAYMENT_LINKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "subscription_payment_links_total",
            "Payment link issuance by outcome"
        ),
        &["outcome"]
    )
    .expect("Failed to register PAYMENT_LINKS_TOTAL")
});

pub static CALLBACKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "subscription_payment_callbacks_total",
            "Gateway callbacks by outcome"
        ),
        &["outcome"]
    )
    .expect("Failed to register CALLBACKS_TOTAL")
});

pub static SUBSCRIPTIONS_ACTIVATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "subscription_activations_total",
        "Subscriptions activated"
    )
    .expect("Failed to register SUBSCRIPTIONS_ACTIVATED_TOTAL")
});

/// Error counter for alerting
pub static ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("subscription_errors_total", "Workflow errors by kind and step"),
        &["kind", "step"]
    )
    .expect("Failed to register ERRORS_TOTAL")
});

/// Initialize all metrics. Safe to call more than once.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder already installed");
            None
        }
    });

    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&ORDERS_CREATED_TOTAL);
    Lazy::force(&PROMO_REDEMPTIONS_TOTAL);
    Lazy::force(&PAYMENT_LINKS_TOTAL);
    Lazy::force(&CALLBACKS_TOTAL);
    Lazy::force(&SUBSCRIPTIONS_ACTIVATED_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
}

/// Render the HTTP metrics and the domain metrics in text exposition format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .and_then(|handle| handle.as_ref())
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        output.push_str(&String::from_utf8_lossy(&buffer));
    }

    output
}

pub fn record_order_created(with_promo: bool) {
    let promo = if with_promo { "yes" } else { "no" };
    ORDERS_CREATED_TOTAL.with_label_values(&[promo]).inc();
}

pub fn record_promo_redemption(outcome: &str) {
    PROMO_REDEMPTIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_payment_link(outcome: &str) {
    PAYMENT_LINKS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_callback(outcome: &str) {
    CALLBACKS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_subscription_activated() {
    SUBSCRIPTIONS_ACTIVATED_TOTAL.inc();
}

pub fn record_error(kind: &str, step: &str) {
    ERRORS_TOTAL.with_label_values(&[kind, step]).inc();
}
