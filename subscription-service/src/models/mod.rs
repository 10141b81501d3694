//! Domain models for the plan purchase flow.

pub mod bank_account;
pub mod caller;
pub mod order;
pub mod payment;
pub mod plan;
pub mod promo_code;
pub mod restaurant;
pub mod subscription;

pub use bank_account::{BankAccountDetails, RestaurantBankAccount};
pub use caller::{Caller, ADMIN_ROLE, RESTAURANT_ADMIN_ROLE};
pub use order::{OrderStatus, PlanOrder};
pub use payment::{Payment, PaymentStatus};
pub use plan::{Plan, PlanDuration};
pub use promo_code::{DiscountType, PromoCode};
pub use restaurant::Restaurant;
pub use subscription::Subscription;
