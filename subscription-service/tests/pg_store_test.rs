//! `PgStore` against a real PostgreSQL, one schema per test.

mod common;

use chrono::{DateTime, Duration, Utc};
use common::pg_store;
use rust_decimal::Decimal;
use std::sync::Arc;
use subscription_service::error::PurchaseError;
use subscription_service::models::{
    DiscountType, OrderStatus, Payment, PaymentStatus, Plan, PlanDuration, PlanOrder, PromoCode,
    Restaurant, Subscription,
};
use subscription_service::services::{
    OrderRepository, PaymentRepository, PgStore, PromoCodeRepository, RestaurantRepository,
    Settlement, SubscriptionRepository,
};
use uuid::Uuid;

async fn seed_plan(store: &PgStore, price_minor: i64) -> Plan {
    let plan = Plan::new("Growth", price_minor, "1M");
    sqlx::query(
        "INSERT INTO plans (plan_id, name, price_minor, duration) VALUES ($1, $2, $3, $4)",
    )
    .bind(plan.plan_id)
    .bind(&plan.name)
    .bind(plan.price_minor)
    .bind(&plan.duration)
    .execute(store.pool())
    .await
    .expect("Failed to seed plan");
    plan
}

async fn seed_restaurant(store: &PgStore, admin_id: Uuid) -> Restaurant {
    let restaurant = Restaurant::new("Spice Route", admin_id);
    sqlx::query("INSERT INTO restaurants (restaurant_id, name, admin_id) VALUES ($1, $2, $3)")
        .bind(restaurant.restaurant_id)
        .bind(&restaurant.name)
        .bind(restaurant.admin_id)
        .execute(store.pool())
        .await
        .expect("Failed to seed restaurant");
    restaurant
}

/// Pending order for a fresh plan and restaurant.
async fn seed_order(store: &PgStore) -> PlanOrder {
    let admin_id = Uuid::new_v4();
    let plan = seed_plan(store, 1000).await;
    let restaurant = seed_restaurant(store, admin_id).await;
    let order = PlanOrder {
        order_id: Uuid::new_v4(),
        restaurant_id: restaurant.restaurant_id,
        plan_id: plan.plan_id,
        restaurant_admin_id: admin_id,
        promo_code: None,
        duration: "1M".to_string(),
        base_minor: plan.price_minor,
        discount_minor: 0,
        status: OrderStatus::Pending,
        created_utc: Utc::now(),
    };
    store.insert_order(&order).await.expect("Failed to insert order");
    order
}

fn subscription_for(order: &PlanOrder) -> Subscription {
    let now = Utc::now();
    Subscription {
        subscription_id: Uuid::new_v4(),
        user_id: order.restaurant_admin_id,
        restaurant_id: order.restaurant_id,
        plan_id: order.plan_id,
        order_id: order.order_id,
        payment_id: None,
        start_date: now,
        end_date: PlanDuration::OneMonth.end_date(now),
        auto_renewal: false,
        canceled: false,
        canceled_at: None,
        cancellation_reason: None,
        in_grace_period: false,
        grace_end_date: None,
        created_utc: now,
    }
}

async fn seed_promo(
    store: &PgStore,
    code: &str,
    max_uses: i32,
    issued: DateTime<Utc>,
) -> PromoCode {
    let promo = PromoCode::new(
        code,
        DiscountType::Percentage,
        Decimal::from(20),
        30,
        max_uses,
        vec![Uuid::new_v4()],
        issued,
    );
    store
        .create_promo_code(&promo)
        .await
        .expect("Failed to seed promo code");
    promo
}

async fn remaining_uses(store: &PgStore, code: &str) -> i32 {
    store
        .find_by_code(code)
        .await
        .unwrap()
        .expect("promo code missing")
        .remaining_uses
}

// =========================================================================
// Promo codes
// =========================================================================

#[tokio::test]
async fn redeem_decrements_until_exhausted() {
    let store = pg_store().await;
    let promo = seed_promo(&store, "SAVE20", 2, Utc::now() - Duration::minutes(1)).await;

    assert!(store.redeem(promo.promo_code_id, Utc::now()).await.unwrap());
    assert!(store.redeem(promo.promo_code_id, Utc::now()).await.unwrap());
    assert!(!store.redeem(promo.promo_code_id, Utc::now()).await.unwrap());
    assert_eq!(remaining_uses(&store, "SAVE20").await, 0);

    store.restore_use(promo.promo_code_id).await.unwrap();
    assert_eq!(remaining_uses(&store, "SAVE20").await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redeem_consumes_last_use_once() {
    let store = Arc::new(pg_store().await);
    let promo_id = seed_promo(&store, "LASTONE", 1, Utc::now() - Duration::minutes(1))
        .await
        .promo_code_id;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.redeem(promo_id, Utc::now()).await })
        })
        .collect();

    let mut redeemed = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            redeemed += 1;
        }
    }

    assert_eq!(redeemed, 1);
    assert_eq!(remaining_uses(&store, "LASTONE").await, 0);
}

#[tokio::test]
async fn redeem_skips_expired_code() {
    let store = pg_store().await;
    let promo = seed_promo(&store, "OLD", 5, Utc::now() - Duration::days(40)).await;

    assert!(!store.redeem(promo.promo_code_id, Utc::now()).await.unwrap());
    assert_eq!(remaining_uses(&store, "OLD").await, 5);
}

#[tokio::test]
async fn duplicate_promo_code_conflicts() {
    let store = pg_store().await;
    seed_promo(&store, "SAVE20", 1, Utc::now()).await;

    let duplicate = PromoCode::new(
        "SAVE20",
        DiscountType::Amount,
        Decimal::from(100),
        10,
        1,
        vec![],
        Utc::now(),
    );
    let err = store.create_promo_code(&duplicate).await.unwrap_err();
    assert!(matches!(err, PurchaseError::Conflict(_)));
}

// =========================================================================
// Payments
// =========================================================================

#[tokio::test]
async fn upsert_refreshes_link_on_pending_payment() {
    let store = pg_store().await;
    let order = seed_order(&store).await;

    let first = store
        .upsert_pending_payment(&Payment::pending(order.order_id, "plink_first", 1000))
        .await
        .unwrap();
    let second = store
        .upsert_pending_payment(&Payment::pending(order.order_id, "plink_second", 1000))
        .await
        .unwrap();

    assert_eq!(second.payment_id, first.payment_id);
    assert_eq!(second.transaction_id, "plink_second");
    assert_eq!(second.status, PaymentStatus::Pending);
    assert!(store
        .find_by_transaction("plink_first", order.order_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn settle_applies_once_then_reports_already_settled() {
    let store = pg_store().await;
    let order = seed_order(&store).await;
    let payment = store
        .upsert_pending_payment(&Payment::pending(order.order_id, "plink_1", 1000))
        .await
        .unwrap();

    match store
        .settle_payment(payment.payment_id, PaymentStatus::Successful)
        .await
        .unwrap()
    {
        Settlement::Applied(settled) => assert_eq!(settled.status, PaymentStatus::Successful),
        other => panic!("expected Applied, got {:?}", other),
    }

    let order_after = store.get_order(order.order_id).await.unwrap().unwrap();
    assert_eq!(order_after.status, OrderStatus::Successful);

    // A late failure report must not overwrite the settled payment.
    match store
        .settle_payment(payment.payment_id, PaymentStatus::Failed)
        .await
        .unwrap()
    {
        Settlement::AlreadySettled(existing) => {
            assert_eq!(existing.status, PaymentStatus::Successful)
        }
        other => panic!("expected AlreadySettled, got {:?}", other),
    }

    let err = store
        .upsert_pending_payment(&Payment::pending(order.order_id, "plink_2", 1000))
        .await
        .unwrap_err();
    assert!(matches!(err, PurchaseError::Conflict(_)));

    let stored = store.get_payment(payment.payment_id).await.unwrap().unwrap();
    assert_eq!(stored.transaction_id, "plink_1");
}

// =========================================================================
// Subscriptions
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_activation_for_one_order_has_one_winner() {
    let store = Arc::new(pg_store().await);
    let order = seed_order(&store).await;

    let first = subscription_for(&order);
    let second = subscription_for(&order);

    let a = {
        let store = store.clone();
        let subscription = first.clone();
        tokio::spawn(async move { store.activate_subscription(&subscription).await })
    };
    let b = {
        let store = store.clone();
        let subscription = second.clone();
        tokio::spawn(async move { store.activate_subscription(&subscription).await })
    };
    let results = [a.await.unwrap(), b.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(PurchaseError::Conflict(_)))));

    let winner = store.find_by_order(order.order_id).await.unwrap().unwrap();
    let restaurant = store
        .get_restaurant(order.restaurant_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restaurant.subscription_id, Some(winner.subscription_id));
}

#[tokio::test]
async fn activation_for_missing_restaurant_leaves_nothing_behind() {
    let store = pg_store().await;
    let order = seed_order(&store).await;

    let mut subscription = subscription_for(&order);
    subscription.restaurant_id = Uuid::new_v4();

    let err = store.activate_subscription(&subscription).await.unwrap_err();
    assert!(matches!(err, PurchaseError::NotFound(_)));

    assert!(store.find_by_order(order.order_id).await.unwrap().is_none());
    let restaurant = store
        .get_restaurant(order.restaurant_id)
        .await
        .unwrap()
        .unwrap();
    assert!(restaurant.subscription_id.is_none());
}

#[tokio::test]
async fn subscriptions_are_read_back_by_id_and_buyer() {
    let store = pg_store().await;
    let order = seed_order(&store).await;
    let subscription = subscription_for(&order);
    store.activate_subscription(&subscription).await.unwrap();

    let fetched = store
        .get_subscription(subscription.subscription_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.order_id, order.order_id);
    assert!(fetched.payment_id.is_none());

    let listed = store.list_for_admin(order.restaurant_admin_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(store.list_for_admin(Uuid::new_v4()).await.unwrap().is_empty());
    assert!(store
        .get_subscription(Uuid::new_v4())
        .await
        .unwrap()
        .is_none());
}
