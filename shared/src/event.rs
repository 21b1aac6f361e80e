//! 变更事件类型定义
//!
//! 这些类型在 store 实现和 call feed 之间共享。推送事件逐条
//! 投递，至少一次 (at-least-once)，同一记录 id 内保序。

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Call;

/// Change action against the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    /// 新增记录
    Insert,
    /// 更新记录
    Update,
    /// 删除记录
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Insert => write!(f, "insert"),
            ChangeAction::Update => write!(f, "update"),
            ChangeAction::Delete => write!(f, "delete"),
        }
    }
}

/// A single change to the calls table, scoped to one account
///
/// For `Insert`/`Update` the full row travels in `record`. For `Delete`
/// the row is gone; only `id` is reliable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallChange {
    pub action: ChangeAction,
    /// Owning account — subscriptions only ever deliver their own
    pub account_id: Uuid,
    /// Affected record id
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Call>,
}

impl CallChange {
    /// 创建新增事件
    pub fn insert(record: Call) -> Self {
        Self {
            action: ChangeAction::Insert,
            account_id: record.account_id,
            id: record.id,
            record: Some(record),
        }
    }

    /// 创建更新事件
    pub fn update(record: Call) -> Self {
        Self {
            action: ChangeAction::Update,
            account_id: record.account_id,
            id: record.id,
            record: Some(record),
        }
    }

    /// 创建删除事件
    pub fn delete(account_id: Uuid, id: Uuid) -> Self {
        Self {
            action: ChangeAction::Delete,
            account_id,
            id,
            record: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CallStatus;
    use chrono::Utc;

    fn sample_call(account_id: Uuid) -> Call {
        Call {
            id: Uuid::new_v4(),
            table_id: Uuid::new_v4(),
            table_number: "7".to_string(),
            status: CallStatus::Pending,
            created_at: Utc::now(),
            attended_at: None,
            account_id,
            notes: None,
        }
    }

    #[test]
    fn test_insert_carries_record_and_id() {
        let account = Uuid::new_v4();
        let call = sample_call(account);
        let id = call.id;

        let change = CallChange::insert(call);
        assert_eq!(change.action, ChangeAction::Insert);
        assert_eq!(change.account_id, account);
        assert_eq!(change.id, id);
        assert!(change.record.is_some());
    }

    #[test]
    fn test_delete_has_no_record() {
        let change = CallChange::delete(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(change.action, ChangeAction::Delete);
        assert!(change.record.is_none());
    }

    #[test]
    fn test_wire_roundtrip() {
        let change = CallChange::update(sample_call(Uuid::new_v4()));
        let json = serde_json::to_string(&change).unwrap();
        assert!(json.contains("\"update\""));

        let parsed: CallChange = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, change.id);
        assert_eq!(parsed.action, ChangeAction::Update);
    }
}
