//! 内存 store 实现 (同进程)
//!
//! 测试和演示用的参考实现：DashMap 保存 calls 表，broadcast 通道
//! 扇出变更事件，每个订阅一个过滤转发任务（只投递本账户的事件）。
//!
//! 与远程 store 一致地执行状态机约束：终态呼叫拒绝再次变更。

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use shared::event::CallChange;
use shared::models::{Call, CallCreate, CallStatus};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{CallStore, CallSubscription};
use crate::error::{ClientError, ClientResult};

/// Event fan-out capacity; lagging subscribers drop the oldest events.
const CHANNEL_CAPACITY: usize = 256;

/// In-process call store
#[derive(Debug)]
pub struct MemoryStore {
    calls: DashMap<Uuid, Call>,
    events: broadcast::Sender<CallChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            calls: DashMap::new(),
            events,
        }
    }

    /// Insert a call without emitting a change event.
    ///
    /// Simulates data that reached the store while push delivery was
    /// not working — only a re-fetch can observe it.
    pub fn seed(&self, call: Call) {
        self.calls.insert(call.id, call);
    }

    /// Delete a call, emitting a delete event.
    ///
    /// Not part of [`CallStore`]: the feed only ever observes deletes
    /// as change events (admin cleanup happens elsewhere).
    pub fn remove_call(&self, account_id: Uuid, call_id: Uuid) {
        if self.calls.remove(&call_id).is_some() {
            self.emit(CallChange::delete(account_id, call_id));
        }
    }

    /// Number of calls currently stored across all accounts.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn emit(&self, change: CallChange) {
        // A send error only means no subscriber is listening.
        let _ = self.events.send(change);
    }

    fn transition(
        &self,
        account_id: Uuid,
        call_id: Uuid,
        next: CallStatus,
    ) -> ClientResult<Call> {
        let mut entry = self
            .calls
            .get_mut(&call_id)
            .filter(|c| c.account_id == account_id)
            .ok_or_else(|| ClientError::NotFound(format!("call {call_id}")))?;

        if !entry.status.can_transition_to(next) {
            return Err(ClientError::Validation(format!(
                "illegal call transition {} -> {}",
                entry.status, next
            )));
        }

        entry.status = next;
        if next == CallStatus::Attended {
            entry.attended_at = Some(Utc::now());
        }
        let updated = entry.value().clone();
        drop(entry);

        self.emit(CallChange::update(updated.clone()));
        Ok(updated)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallStore for MemoryStore {
    async fn fetch_calls(&self, account_id: Uuid) -> ClientResult<Vec<Call>> {
        let mut calls: Vec<Call> = self
            .calls
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .map(|entry| entry.value().clone())
            .collect();
        calls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(calls)
    }

    async fn subscribe_calls(&self, account_id: Uuid) -> ClientResult<CallSubscription> {
        let mut events = self.events.subscribe();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let closer = CancellationToken::new();
        let guard = closer.clone();

        // 过滤转发任务：只投递本账户的事件
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = guard.cancelled() => break,

                    event = events.recv() => match event {
                        Ok(change) if change.account_id == account_id => {
                            if tx.send(change).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(account = %account_id, "Call subscription lagged {n} events");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });

        Ok(CallSubscription::new(rx, closer))
    }

    async fn create_call(&self, account_id: Uuid, payload: CallCreate) -> ClientResult<Call> {
        let call = Call {
            id: Uuid::new_v4(),
            table_id: payload.table_id,
            table_number: payload.table_number,
            status: CallStatus::Pending,
            created_at: Utc::now(),
            attended_at: None,
            account_id,
            notes: payload.notes,
        };

        self.calls.insert(call.id, call.clone());
        self.emit(CallChange::insert(call.clone()));
        tracing::debug!(call = %call.id, table = %call.table_number, "Call created");
        Ok(call)
    }

    async fn mark_attended(&self, account_id: Uuid, call_id: Uuid) -> ClientResult<Call> {
        self.transition(account_id, call_id, CallStatus::Attended)
    }

    async fn cancel_call(&self, account_id: Uuid, call_id: Uuid) -> ClientResult<Call> {
        self.transition(account_id, call_id, CallStatus::Cancelled)
    }
}
