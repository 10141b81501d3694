use uuid::Uuid;

use crate::error::PurchaseError;

pub const RESTAURANT_ADMIN_ROLE: &str = "restaurant_admin";
pub const ADMIN_ROLE: &str = "admin";

/// Authenticated identity of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: String,
}

impl Caller {
    pub fn new(user_id: Uuid, role: impl Into<String>) -> Self {
        Self {
            user_id,
            role: role.into(),
        }
    }

    pub fn require_role(&self, role: &str) -> Result<(), PurchaseError> {
        if self.role == role {
            Ok(())
        } else {
            Err(PurchaseError::Forbidden(format!("requires role '{}'", role)))
        }
    }
}
