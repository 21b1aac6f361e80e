//! Call Model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Call status lifecycle (呼叫状态)
///
/// `Pending` is the initial state. `Attended` and `Cancelled` are
/// terminal: once reached, the status never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Pending,
    Attended,
    Cancelled,
}

impl CallStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, CallStatus::Pending)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// Only pending → attended and pending → cancelled are legal.
    pub fn can_transition_to(self, next: CallStatus) -> bool {
        matches!(
            (self, next),
            (CallStatus::Pending, CallStatus::Attended)
                | (CallStatus::Pending, CallStatus::Cancelled)
        )
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Pending => write!(f, "pending"),
            CallStatus::Attended => write!(f, "attended"),
            CallStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Waiter call entity (呼叫) — a table's request for staff attention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: Uuid,
    /// Dining table reference
    pub table_id: Uuid,
    /// Denormalized table number for display
    pub table_number: String,
    pub status: CallStatus,
    /// Set at creation, immutable
    pub created_at: DateTime<Utc>,
    /// Null until the call transitions to attended
    pub attended_at: Option<DateTime<Utc>>,
    /// Owning restaurant account
    pub account_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Call {
    pub fn is_pending(&self) -> bool {
        self.status == CallStatus::Pending
    }
}

/// Create call payload (guest menu action)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallCreate {
    pub table_id: Uuid,
    pub table_number: String,
    pub notes: Option<String>,
}

/// Update call payload (staff dashboard action)
///
/// `None` fields are left untouched by the store, so they must not
/// serialize as nulls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CallUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CallStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
