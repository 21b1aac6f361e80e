//! Store access layer
//!
//! The remote store is the single source of truth for calls, menu items
//! and tables. This module defines the seam the call feed synchronizes
//! through: a [`CallStore`] trait with a network implementation
//! ([`HttpStore`]) and an in-process one ([`MemoryStore`]) for tests and
//! demos.

use async_trait::async_trait;
use shared::event::CallChange;
use shared::models::{Call, CallCreate};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::ClientResult;

pub mod http;
pub mod memory;

pub use http::HttpStore;
pub use memory::MemoryStore;

/// 呼叫存储 trait
///
/// Fetch results are ordered by creation time descending. Change-event
/// delivery is at-least-once, may interleave with fetch results, and is
/// ordered per record id.
#[async_trait]
pub trait CallStore: Send + Sync {
    /// Current calls for the account, newest first.
    async fn fetch_calls(&self, account_id: Uuid) -> ClientResult<Vec<Call>>;

    /// Open a change feed scoped to the account.
    ///
    /// The feed stays open until the returned handle is dropped or
    /// closed, or the store ends it.
    async fn subscribe_calls(&self, account_id: Uuid) -> ClientResult<CallSubscription>;

    /// Guest action: create a new pending call for a table.
    async fn create_call(&self, account_id: Uuid, payload: CallCreate) -> ClientResult<Call>;

    /// Staff action: pending → attended, stamping `attended_at`.
    async fn mark_attended(&self, account_id: Uuid, call_id: Uuid) -> ClientResult<Call>;

    /// Staff action: pending → cancelled.
    async fn cancel_call(&self, account_id: Uuid, call_id: Uuid) -> ClientResult<Call>;
}

/// An open change feed for one account
///
/// Wraps the receiving end of the event channel plus a close token.
/// Dropping the handle cancels the producer side, so no events are
/// forwarded after the consumer goes away.
#[derive(Debug)]
pub struct CallSubscription {
    rx: mpsc::Receiver<CallChange>,
    closer: CancellationToken,
}

impl CallSubscription {
    pub fn new(rx: mpsc::Receiver<CallChange>, closer: CancellationToken) -> Self {
        Self { rx, closer }
    }

    /// Next change event, in delivery order. `None` means the feed
    /// ended (store closed it or the subscription was cancelled).
    pub async fn recv(&mut self) -> Option<CallChange> {
        self.rx.recv().await
    }

    /// Close the feed explicitly. Also happens on drop.
    pub fn close(&mut self) {
        self.closer.cancel();
        self.rx.close();
    }
}

impl Drop for CallSubscription {
    fn drop(&mut self) {
        self.closer.cancel();
    }
}
