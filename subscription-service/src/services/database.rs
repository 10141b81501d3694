//! Postgres-backed store for subscription-service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::PurchaseError;
use crate::models::{
    DiscountType, OrderStatus, Payment, PaymentStatus, Plan, PlanOrder, PromoCode, Restaurant,
    RestaurantBankAccount, Subscription,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::repository::{
    OrderRepository, PaymentRepository, PlanRepository, PromoCodeRepository,
    RestaurantRepository, Settlement, Store, SubscriptionRepository,
};

const UNIQUE_VIOLATION: &str = "23505";
const SUBSCRIPTION_RESTAURANT_FK: &str = "subscriptions_restaurant_id_fkey";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

fn violates_constraint(err: &sqlx::Error, constraint: &str) -> bool {
    err.as_database_error()
        .and_then(|db| db.constraint())
        .is_some_and(|name| name == constraint)
}

fn persistence(context: &str, err: sqlx::Error) -> PurchaseError {
    PurchaseError::Persistence(format!("{}: {}", context, err))
}

// Row shapes; status and type columns are stored as text.

#[derive(FromRow)]
struct PlanRow {
    plan_id: Uuid,
    name: String,
    description: String,
    price_minor: i64,
    duration: String,
    is_active: bool,
    created_utc: DateTime<Utc>,
}

impl From<PlanRow> for Plan {
    fn from(row: PlanRow) -> Self {
        Plan {
            plan_id: row.plan_id,
            name: row.name,
            description: row.description,
            price_minor: row.price_minor,
            duration: row.duration,
            is_active: row.is_active,
            created_utc: row.created_utc,
        }
    }
}

#[derive(FromRow)]
struct RestaurantRow {
    restaurant_id: Uuid,
    name: String,
    admin_id: Uuid,
    subscription_id: Option<Uuid>,
    created_utc: DateTime<Utc>,
}

impl From<RestaurantRow> for Restaurant {
    fn from(row: RestaurantRow) -> Self {
        Restaurant {
            restaurant_id: row.restaurant_id,
            name: row.name,
            admin_id: row.admin_id,
            subscription_id: row.subscription_id,
            created_utc: row.created_utc,
        }
    }
}

#[derive(FromRow)]
struct PromoCodeRow {
    promo_code_id: Uuid,
    code: String,
    discount_value: Decimal,
    discount_type: String,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
    remaining_uses: i32,
    is_active: bool,
    eligible_plan_ids: Vec<Uuid>,
    created_utc: DateTime<Utc>,
}

impl TryFrom<PromoCodeRow> for PromoCode {
    type Error = PurchaseError;

    fn try_from(row: PromoCodeRow) -> Result<Self, Self::Error> {
        let discount_type = DiscountType::from_string(&row.discount_type).ok_or_else(|| {
            PurchaseError::Persistence(format!(
                "unknown discount type '{}' on promo code {}",
                row.discount_type, row.promo_code_id
            ))
        })?;

        Ok(PromoCode {
            promo_code_id: row.promo_code_id,
            code: row.code,
            discount_value: row.discount_value,
            discount_type,
            valid_from: row.valid_from,
            valid_to: row.valid_to,
            remaining_uses: row.remaining_uses,
            is_active: row.is_active,
            eligible_plan_ids: row.eligible_plan_ids,
            created_utc: row.created_utc,
        })
    }
}

#[derive(FromRow)]
struct OrderRow {
    order_id: Uuid,
    restaurant_id: Uuid,
    plan_id: Uuid,
    restaurant_admin_id: Uuid,
    promo_code: Option<String>,
    duration: String,
    base_minor: i64,
    discount_minor: i64,
    status: String,
    created_utc: DateTime<Utc>,
}

impl From<OrderRow> for PlanOrder {
    fn from(row: OrderRow) -> Self {
        PlanOrder {
            order_id: row.order_id,
            restaurant_id: row.restaurant_id,
            plan_id: row.plan_id,
            restaurant_admin_id: row.restaurant_admin_id,
            promo_code: row.promo_code,
            duration: row.duration,
            base_minor: row.base_minor,
            discount_minor: row.discount_minor,
            status: OrderStatus::from_string(&row.status),
            created_utc: row.created_utc,
        }
    }
}

#[derive(FromRow)]
struct PaymentRow {
    payment_id: Uuid,
    order_id: Uuid,
    transaction_id: String,
    amount_minor: i64,
    status: String,
    created_utc: DateTime<Utc>,
    updated_utc: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            payment_id: row.payment_id,
            order_id: row.order_id,
            transaction_id: row.transaction_id,
            amount_minor: row.amount_minor,
            status: PaymentStatus::from_string(&row.status),
            created_utc: row.created_utc,
            updated_utc: row.updated_utc,
        }
    }
}

#[derive(FromRow)]
struct SubscriptionRow {
    subscription_id: Uuid,
    user_id: Uuid,
    restaurant_id: Uuid,
    plan_id: Uuid,
    order_id: Uuid,
    payment_id: Option<Uuid>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    auto_renewal: bool,
    canceled: bool,
    canceled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    in_grace_period: bool,
    grace_end_date: Option<DateTime<Utc>>,
    created_utc: DateTime<Utc>,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Subscription {
            subscription_id: row.subscription_id,
            user_id: row.user_id,
            restaurant_id: row.restaurant_id,
            plan_id: row.plan_id,
            order_id: row.order_id,
            payment_id: row.payment_id,
            start_date: row.start_date,
            end_date: row.end_date,
            auto_renewal: row.auto_renewal,
            canceled: row.canceled,
            canceled_at: row.canceled_at,
            cancellation_reason: row.cancellation_reason,
            in_grace_period: row.in_grace_period,
            grace_end_date: row.grace_end_date,
            created_utc: row.created_utc,
        }
    }
}

const PROMO_COLUMNS: &str = "promo_code_id, code, discount_value, discount_type, valid_from, \
     valid_to, remaining_uses, is_active, eligible_plan_ids, created_utc";
const ORDER_COLUMNS: &str = "order_id, restaurant_id, plan_id, restaurant_admin_id, promo_code, \
     duration, base_minor, discount_minor, status, created_utc";
const PAYMENT_COLUMNS: &str =
    "payment_id, order_id, transaction_id, amount_minor, status, created_utc, updated_utc";
const SUBSCRIPTION_COLUMNS: &str = "subscription_id, user_id, restaurant_id, plan_id, order_id, \
     payment_id, start_date, end_date, auto_renewal, canceled, canceled_at, cancellation_reason, \
     in_grace_period, grace_end_date, created_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "subscription-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn fetch_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, PurchaseError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE payment_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to get payment", e))?;

        Ok(row.map(Payment::from))
    }
}

// =========================================================================
// Plan and Restaurant Operations
// =========================================================================

#[async_trait]
impl PlanRepository for PgStore {
    #[instrument(skip(self), fields(plan_id = %plan_id))]
    async fn get_plan(&self, plan_id: Uuid) -> Result<Option<Plan>, PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_plan"])
            .start_timer();

        let row = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT plan_id, name, description, price_minor, duration, is_active, created_utc
            FROM plans
            WHERE plan_id = $1
            "#,
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to get plan", e))?;

        timer.observe_duration();
        Ok(row.map(Plan::from))
    }
}

#[async_trait]
impl RestaurantRepository for PgStore {
    #[instrument(skip(self), fields(restaurant_id = %restaurant_id))]
    async fn get_restaurant(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Option<Restaurant>, PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_restaurant"])
            .start_timer();

        let row = sqlx::query_as::<_, RestaurantRow>(
            r#"
            SELECT restaurant_id, name, admin_id, subscription_id, created_utc
            FROM restaurants
            WHERE restaurant_id = $1
            "#,
        )
        .bind(restaurant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to get restaurant", e))?;

        timer.observe_duration();
        Ok(row.map(Restaurant::from))
    }

    #[instrument(skip(self, account), fields(restaurant_id = %account.restaurant_id))]
    async fn save_bank_account(
        &self,
        account: &RestaurantBankAccount,
    ) -> Result<(), PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["save_bank_account"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO restaurant_bank_accounts (
                bank_account_id, restaurant_id, contact_id, fund_account_id, email, phone,
                bank_name, account_number, account_holder, ifsc_code, branch, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(account.bank_account_id)
        .bind(account.restaurant_id)
        .bind(&account.contact_id)
        .bind(&account.fund_account_id)
        .bind(&account.email)
        .bind(&account.phone)
        .bind(&account.bank_name)
        .bind(&account.account_number)
        .bind(&account.account_holder)
        .bind(&account.ifsc_code)
        .bind(&account.branch)
        .bind(account.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| persistence("Failed to save bank account", e))?;

        timer.observe_duration();
        info!(restaurant_id = %account.restaurant_id, "Bank account linked");
        Ok(())
    }
}

// =========================================================================
// Promo Code Operations
// =========================================================================

#[async_trait]
impl PromoCodeRepository for PgStore {
    #[instrument(skip(self))]
    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCode>, PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_promo_code"])
            .start_timer();

        let row = sqlx::query_as::<_, PromoCodeRow>(&format!(
            "SELECT {} FROM promo_codes WHERE code = $1",
            PROMO_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to find promo code", e))?;

        timer.observe_duration();
        row.map(PromoCode::try_from).transpose()
    }

    #[instrument(skip(self, promo), fields(code = %promo.code))]
    async fn create_promo_code(&self, promo: &PromoCode) -> Result<(), PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_promo_code"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO promo_codes (
                promo_code_id, code, discount_value, discount_type, valid_from, valid_to,
                remaining_uses, is_active, eligible_plan_ids, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(promo.promo_code_id)
        .bind(&promo.code)
        .bind(promo.discount_value)
        .bind(promo.discount_type.as_str())
        .bind(promo.valid_from)
        .bind(promo.valid_to)
        .bind(promo.remaining_uses)
        .bind(promo.is_active)
        .bind(&promo.eligible_plan_ids)
        .bind(promo.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PurchaseError::Conflict(format!("promo code '{}' already exists", promo.code))
            } else {
                persistence("Failed to create promo code", e)
            }
        })?;

        timer.observe_duration();
        info!(promo_code_id = %promo.promo_code_id, code = %promo.code, "Promo code created");
        Ok(())
    }

    #[instrument(skip(self), fields(promo_code_id = %promo_code_id))]
    async fn redeem(&self, promo_code_id: Uuid, now: DateTime<Utc>) -> Result<bool, PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["redeem_promo_code"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE promo_codes
            SET remaining_uses = remaining_uses - 1, updated_utc = NOW()
            WHERE promo_code_id = $1
              AND remaining_uses > 0
              AND is_active
              AND valid_from <= $2
              AND valid_to >= $2
            "#,
        )
        .bind(promo_code_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| persistence("Failed to redeem promo code", e))?;

        timer.observe_duration();
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(promo_code_id = %promo_code_id))]
    async fn restore_use(&self, promo_code_id: Uuid) -> Result<(), PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["restore_promo_use"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE promo_codes
            SET remaining_uses = remaining_uses + 1, updated_utc = NOW()
            WHERE promo_code_id = $1
            "#,
        )
        .bind(promo_code_id)
        .execute(&self.pool)
        .await
        .map_err(|e| persistence("Failed to restore promo code use", e))?;

        timer.observe_duration();
        Ok(())
    }
}

// =========================================================================
// Order Operations
// =========================================================================

#[async_trait]
impl OrderRepository for PgStore {
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    async fn insert_order(&self, order: &PlanOrder) -> Result<(), PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_order"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO plan_orders (
                order_id, restaurant_id, plan_id, restaurant_admin_id, promo_code, duration,
                base_minor, discount_minor, status, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.order_id)
        .bind(order.restaurant_id)
        .bind(order.plan_id)
        .bind(order.restaurant_admin_id)
        .bind(&order.promo_code)
        .bind(&order.duration)
        .bind(order.base_minor)
        .bind(order.discount_minor)
        .bind(order.status.as_str())
        .bind(order.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| persistence("Failed to insert order", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn get_order(&self, order_id: Uuid) -> Result<Option<PlanOrder>, PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order"])
            .start_timer();

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM plan_orders WHERE order_id = $1",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to get order", e))?;

        timer.observe_duration();
        Ok(row.map(PlanOrder::from))
    }

    #[instrument(skip(self), fields(admin_id = %admin_id))]
    async fn list_orders_for_admin(
        &self,
        admin_id: Uuid,
    ) -> Result<Vec<PlanOrder>, PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_orders"])
            .start_timer();

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM plan_orders WHERE restaurant_admin_id = $1 ORDER BY created_utc DESC",
            ORDER_COLUMNS
        ))
        .bind(admin_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| persistence("Failed to list orders", e))?;

        timer.observe_duration();
        Ok(rows.into_iter().map(PlanOrder::from).collect())
    }

    #[instrument(skip(self), fields(order_id = %order_id, status = %status.as_str()))]
    async fn resolve_order(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<bool, PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["resolve_order"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE plan_orders
            SET status = $2
            WHERE order_id = $1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| persistence("Failed to resolve order", e))?;

        timer.observe_duration();
        Ok(result.rows_affected() == 1)
    }
}

// =========================================================================
// Payment Operations
// =========================================================================

#[async_trait]
impl PaymentRepository for PgStore {
    #[instrument(skip(self, payment), fields(order_id = %payment.order_id, transaction_id = %payment.transaction_id))]
    async fn upsert_pending_payment(&self, payment: &Payment) -> Result<Payment, PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_payment"])
            .start_timer();

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            INSERT INTO payments (payment_id, order_id, transaction_id, amount_minor, status, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, 'pending', $5, $5)
            ON CONFLICT (order_id) DO UPDATE
            SET transaction_id = EXCLUDED.transaction_id,
                amount_minor = EXCLUDED.amount_minor,
                updated_utc = EXCLUDED.updated_utc
            WHERE payments.status = 'pending'
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(payment.payment_id)
        .bind(payment.order_id)
        .bind(&payment.transaction_id)
        .bind(payment.amount_minor)
        .bind(payment.created_utc)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to upsert payment", e))?;

        timer.observe_duration();
        row.map(Payment::from).ok_or_else(|| {
            PurchaseError::Conflict(format!(
                "payment for order {} is already settled",
                payment.order_id
            ))
        })
    }

    #[instrument(skip(self), fields(payment_id = %payment_id))]
    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_payment"])
            .start_timer();
        let payment = self.fetch_payment(payment_id).await?;
        timer.observe_duration();
        Ok(payment)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn find_by_transaction(
        &self,
        transaction_id: &str,
        order_id: Uuid,
    ) -> Result<Option<Payment>, PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_payment_by_transaction"])
            .start_timer();

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE transaction_id = $1 AND order_id = $2",
            PAYMENT_COLUMNS
        ))
        .bind(transaction_id)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to find payment", e))?;

        timer.observe_duration();
        Ok(row.map(Payment::from))
    }

    #[instrument(skip(self), fields(payment_id = %payment_id, status = %status.as_str()))]
    async fn settle_payment(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> Result<Settlement, PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["settle_payment"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| persistence("Failed to begin transaction", e))?;

        let updated = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            UPDATE payments
            SET status = $2, updated_utc = NOW()
            WHERE payment_id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(payment_id)
        .bind(status.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| persistence("Failed to settle payment", e))?;

        let Some(row) = updated else {
            tx.rollback()
                .await
                .map_err(|e| persistence("Failed to roll back", e))?;
            timer.observe_duration();

            return match self.fetch_payment(payment_id).await? {
                Some(current) => Ok(Settlement::AlreadySettled(current)),
                None => Err(PurchaseError::NotFound(format!(
                    "payment {} not found",
                    payment_id
                ))),
            };
        };

        let order_update = sqlx::query(
            r#"
            UPDATE plan_orders
            SET status = $2
            WHERE order_id = $1 AND status = 'pending'
            "#,
        )
        .bind(row.order_id)
        .bind(status.order_status().as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| persistence("Failed to settle order", e))?;

        if order_update.rows_affected() == 0 {
            warn!(order_id = %row.order_id, "Order was no longer pending while settling payment");
        }

        tx.commit()
            .await
            .map_err(|e| persistence("Failed to commit settlement", e))?;

        timer.observe_duration();
        Ok(Settlement::Applied(Payment::from(row)))
    }
}

// =========================================================================
// Subscription Operations
// =========================================================================

#[async_trait]
impl SubscriptionRepository for PgStore {
    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<Subscription>, PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_subscription"])
            .start_timer();

        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE order_id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to find subscription", e))?;

        timer.observe_duration();
        Ok(row.map(Subscription::from))
    }

    #[instrument(skip(self), fields(subscription_id = %subscription_id))]
    async fn get_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_subscription"])
            .start_timer();

        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE subscription_id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| persistence("Failed to get subscription", e))?;

        timer.observe_duration();
        Ok(row.map(Subscription::from))
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_for_admin(&self, user_id: Uuid) -> Result<Vec<Subscription>, PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_subscriptions"])
            .start_timer();

        let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 ORDER BY created_utc DESC",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| persistence("Failed to list subscriptions", e))?;

        timer.observe_duration();
        Ok(rows.into_iter().map(Subscription::from).collect())
    }

    #[instrument(skip(self, subscription), fields(order_id = %subscription.order_id, restaurant_id = %subscription.restaurant_id))]
    async fn activate_subscription(
        &self,
        subscription: &Subscription,
    ) -> Result<(), PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["activate_subscription"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| persistence("Failed to begin transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                subscription_id, user_id, restaurant_id, plan_id, order_id, payment_id,
                start_date, end_date, auto_renewal, canceled, canceled_at, cancellation_reason,
                in_grace_period, grace_end_date, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(subscription.subscription_id)
        .bind(subscription.user_id)
        .bind(subscription.restaurant_id)
        .bind(subscription.plan_id)
        .bind(subscription.order_id)
        .bind(subscription.payment_id)
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.auto_renewal)
        .bind(subscription.canceled)
        .bind(subscription.canceled_at)
        .bind(&subscription.cancellation_reason)
        .bind(subscription.in_grace_period)
        .bind(subscription.grace_end_date)
        .bind(subscription.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PurchaseError::Conflict(format!(
                    "subscription already exists for order {}",
                    subscription.order_id
                ))
            } else if violates_constraint(&e, SUBSCRIPTION_RESTAURANT_FK) {
                PurchaseError::NotFound(format!(
                    "restaurant {} not found",
                    subscription.restaurant_id
                ))
            } else {
                persistence("Failed to insert subscription", e)
            }
        })?;

        let linked = sqlx::query(
            r#"
            UPDATE restaurants
            SET subscription_id = $2, updated_utc = NOW()
            WHERE restaurant_id = $1
            "#,
        )
        .bind(subscription.restaurant_id)
        .bind(subscription.subscription_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| persistence("Failed to link subscription to restaurant", e))?;

        if linked.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| persistence("Failed to roll back", e))?;
            return Err(PurchaseError::NotFound(format!(
                "restaurant {} not found",
                subscription.restaurant_id
            )));
        }

        tx.commit()
            .await
            .map_err(|e| persistence("Failed to commit subscription", e))?;

        timer.observe_duration();
        info!(
            subscription_id = %subscription.subscription_id,
            order_id = %subscription.order_id,
            "Subscription activated"
        );
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), PurchaseError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| persistence("Health check failed", e))?;

        timer.observe_duration();
        Ok(())
    }
}
