//! Dining Table Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dining table entity (桌台)
///
/// `qr_code_data` is the deep link encoded in the printed QR code that
/// opens the guest menu for this table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiningTable {
    pub id: Uuid,
    pub table_number: String,
    pub table_name: String,
    pub qr_code_data: String,
    pub is_active: bool,
    pub capacity: Option<i32>,
    pub location: Option<String>,
    pub account_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create dining table payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiningTableCreate {
    pub table_number: String,
    pub table_name: String,
    pub qr_code_data: String,
    pub capacity: Option<i32>,
    pub location: Option<String>,
}

/// Update dining table payload
///
/// `None` fields are left untouched by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiningTableUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}
