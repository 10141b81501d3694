use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bank details submitted when a restaurant links a payout account.
#[derive(Debug, Clone, Deserialize)]
pub struct BankAccountDetails {
    pub email: String,
    pub phone: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub ifsc_code: String,
    pub branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantBankAccount {
    pub bank_account_id: Uuid,
    pub restaurant_id: Uuid,
    /// Gateway contact and fund-account references.
    pub contact_id: String,
    pub fund_account_id: String,
    pub email: String,
    pub phone: String,
    pub bank_name: String,
    #[serde(skip_serializing)]
    pub account_number: String,
    pub account_holder: String,
    pub ifsc_code: String,
    pub branch: String,
    pub created_utc: DateTime<Utc>,
}

impl RestaurantBankAccount {
    /// Account number with all but the last four digits masked.
    pub fn masked_account_number(&self) -> String {
        let hidden = self.account_number.chars().count().saturating_sub(4);
        let tail: String = self.account_number.chars().skip(hidden).collect();
        format!("{}{}", "*".repeat(hidden), tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(number: &str) -> RestaurantBankAccount {
        RestaurantBankAccount {
            bank_account_id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            contact_id: "cont_00000000000001".into(),
            fund_account_id: "fa_00000000000001".into(),
            email: "owner@example.com".into(),
            phone: "9000090000".into(),
            bank_name: "HDFC".into(),
            account_number: number.into(),
            account_holder: "Gaurav Kumar".into(),
            ifsc_code: "HDFC0000053".into(),
            branch: "Andheri".into(),
            created_utc: Utc::now(),
        }
    }

    #[test]
    fn masks_all_but_last_four() {
        assert_eq!(account("765432123456789").masked_account_number(), "***********6789");
        assert_eq!(account("123").masked_account_number(), "123");
    }

    #[test]
    fn masks_by_character_not_byte() {
        // Devanagari digits are three bytes each.
        assert_eq!(account("१२३४५६७८").masked_account_number(), "****५६७८");
        assert_eq!(account("१२३").masked_account_number(), "१२३");
    }

    #[test]
    fn never_serializes_full_account_number() {
        let json = serde_json::to_value(account("765432123456789")).unwrap();
        assert!(json.get("account_number").is_none());
    }
}
