use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub restaurant_id: Uuid,
    pub name: String,
    /// Owning restaurant administrator.
    pub admin_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl Restaurant {
    pub fn new(name: impl Into<String>, admin_id: Uuid) -> Self {
        Self {
            restaurant_id: Uuid::new_v4(),
            name: name.into(),
            admin_id,
            subscription_id: None,
            created_utc: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.admin_id == user_id
    }
}
