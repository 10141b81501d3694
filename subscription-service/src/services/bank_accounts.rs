//! Payout bank-account linking for restaurants.

use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::error::PurchaseError;
use crate::models::{BankAccountDetails, Caller, RestaurantBankAccount};
use crate::services::metrics::record_error;
use crate::services::razorpay::{
    BankAccountPayload, ContactRequest, FundAccountRequest, PaymentGateway,
};
use crate::services::repository::RestaurantRepository;

/// Registers the restaurant with the gateway as a contact, attaches a bank
/// fund account to it, then stores both references.
pub struct BankAccountLinker {
    restaurants: Arc<dyn RestaurantRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl BankAccountLinker {
    pub fn new(
        restaurants: Arc<dyn RestaurantRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            restaurants,
            gateway,
        }
    }

    #[instrument(skip(self, caller, details), fields(restaurant_id = %restaurant_id))]
    pub async fn link(
        &self,
        caller: &Caller,
        restaurant_id: Uuid,
        details: BankAccountDetails,
    ) -> Result<RestaurantBankAccount, PurchaseError> {
        let restaurant = self
            .restaurants
            .get_restaurant(restaurant_id)
            .await?
            .ok_or_else(|| {
                PurchaseError::NotFound(format!("restaurant {} not found", restaurant_id))
            })?;

        if !restaurant.is_owned_by(caller.user_id) {
            return Err(PurchaseError::Forbidden(
                "only the restaurant owner can link a bank account".to_string(),
            ));
        }

        let contact_id = self
            .gateway
            .create_contact(&ContactRequest {
                name: restaurant.name.clone(),
                email: details.email.clone(),
                contact: details.phone.clone(),
                contact_type: "customer".to_string(),
                reference_id: restaurant_id.to_string(),
            })
            .await
            .map_err(|e| {
                record_error("gateway", "create_contact");
                PurchaseError::Gateway(e.to_string())
            })?;

        let fund_account_id = self
            .gateway
            .create_fund_account(&FundAccountRequest {
                contact_id: contact_id.clone(),
                account_type: "bank_account".to_string(),
                bank_account: BankAccountPayload {
                    name: details.account_holder.clone(),
                    ifsc: details.ifsc_code.clone(),
                    account_number: details.account_number.clone(),
                },
            })
            .await
            .map_err(|e| {
                record_error("gateway", "create_fund_account");
                tracing::error!(
                    restaurant_id = %restaurant_id,
                    contact_id = %contact_id,
                    error = %e,
                    "Fund account creation failed after contact was created"
                );
                PurchaseError::Gateway(e.to_string())
            })?;

        let account = RestaurantBankAccount {
            bank_account_id: Uuid::new_v4(),
            restaurant_id,
            contact_id,
            fund_account_id,
            email: details.email,
            phone: details.phone,
            bank_name: details.bank_name,
            account_number: details.account_number,
            account_holder: details.account_holder,
            ifsc_code: details.ifsc_code,
            branch: details.branch,
            created_utc: Utc::now(),
        };

        self.restaurants.save_bank_account(&account).await?;

        Ok(account)
    }
}
