//! Plan purchase workflow: promo evaluation, order creation, payment link
//! issuance, callback verification and subscription activation.

pub mod activation;
pub mod callback;
pub mod order;
pub mod orchestrator;
pub mod payment_link;
pub mod promo;

pub use activation::SubscriptionActivator;
pub use callback::{callback_signature, CallbackVerifier, GatewayCallback, PAID_STATUS};
pub use order::{BuiltOrder, OrderBuilder, PurchaseRequest};
pub use orchestrator::{PaymentConfirmed, PlanPurchaseWorkflow, PurchaseStarted};
pub use payment_link::{LinkSettings, PaymentLinkIssuer, PaymentLinkOutcome};
pub use promo::{AppliedDiscount, PromoCodeEvaluator};
