//! Restaurant Profile Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Restaurant account profile
///
/// `id` doubles as the account id all other rows are scoped by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub restaurant_name: String,
    pub email: String,
    /// "demo" | "starter" | "pro"
    pub plan_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_demo(&self) -> bool {
        self.plan_type == "demo"
    }
}
