pub mod bank_accounts;
pub mod orders;
pub mod promo_codes;
pub mod subscriptions;
pub mod workflow;
