pub mod bank_accounts;
pub mod database;
pub mod memory;
pub mod metrics;
pub mod razorpay;
pub mod repository;

pub use bank_accounts::BankAccountLinker;
pub use database::PgStore;
pub use memory::MemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use razorpay::{PaymentGateway, RazorpayClient};
pub use repository::{
    OrderRepository, PaymentRepository, PlanRepository, PromoCodeRepository,
    RestaurantRepository, Settlement, Store, SubscriptionRepository,
};
