//! Feed worker — the synchronizer's single control loop
//!
//! 单任务循环：select! 等待 shutdown / 降级截止时间 / 轮询 tick /
//! push 事件。本地列表只在这个任务里变更；push 和轮询是两个独立的
//! 生产者，汇入同一个按 id 合并的 reconcile 路径。

use std::collections::HashSet;
use std::sync::Arc;

use shared::event::{CallChange, ChangeAction};
use shared::models::Call;
use tokio::time::{Duration, Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{FeedConfig, FeedSnapshot, FeedState, Publisher};
use crate::notify::NotificationSink;
use crate::store::{CallStore, CallSubscription};

/// Placeholder deadline for disabled timer arms; the select guards keep
/// them unpolled.
const FAR_FUTURE: Duration = Duration::from_secs(86_400);

pub(crate) struct FeedWorker {
    store: Arc<dyn CallStore>,
    notifier: Arc<dyn NotificationSink>,
    config: FeedConfig,
    account_id: Uuid,
    publisher: Publisher,
    shutdown: CancellationToken,

    state: FeedState,
    calls: Vec<Call>,
    /// Ids ever observed this run; a re-observed id never re-notifies.
    seen: HashSet<Uuid>,
}

impl FeedWorker {
    pub(crate) fn new(
        store: Arc<dyn CallStore>,
        notifier: Arc<dyn NotificationSink>,
        config: FeedConfig,
        account_id: Uuid,
        publisher: Publisher,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
            account_id,
            publisher,
            shutdown,
            state: FeedState::Loading,
            calls: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Run the feed worker
    ///
    /// 1. One full fetch (the only blind list replacement)
    /// 2. Open the push subscription, enter Live
    /// 3. Degrade to polling when the list stays empty past the
    ///    threshold, back to push-only once data flows again
    pub(crate) async fn run(mut self) {
        tracing::debug!(account = %self.account_id, "Call feed worker started");

        // Initial load. A failure leaves the list empty; the degrade
        // watchdog is the recovery path.
        match self.store.fetch_calls(self.account_id).await {
            Ok(calls) => self.adopt_initial(calls),
            Err(e) => {
                tracing::error!(account = %self.account_id, "Initial call fetch failed: {e}");
            }
        }
        if self.shutdown.is_cancelled() {
            return;
        }

        // No retry on a failed subscribe: the watchdog degrades the
        // feed and polling carries it from there.
        let mut subscription = match self.store.subscribe_calls(self.account_id).await {
            Ok(sub) => Some(sub),
            Err(e) => {
                tracing::warn!(
                    account = %self.account_id,
                    "Call subscription failed, polling is the only recovery: {e}"
                );
                None
            }
        };

        if subscription.is_some() {
            self.set_state(FeedState::Live);
        }

        let shutdown = self.shutdown.clone();
        let mut degrade_deadline: Option<Instant> = None;
        let mut next_poll: Option<Instant> = None;
        self.rearm_watchdog(&mut degrade_deadline, &next_poll, subscription.is_some());

        loop {
            let degrade_at = degrade_deadline.unwrap_or_else(|| Instant::now() + FAR_FUTURE);
            let poll_at = next_poll.unwrap_or_else(|| Instant::now() + FAR_FUTURE);

            tokio::select! {
                _ = shutdown.cancelled() => break,

                _ = sleep_until(degrade_at), if degrade_deadline.is_some() => {
                    degrade_deadline = None;
                    tracing::warn!(
                        account = %self.account_id,
                        "No call data within threshold, falling back to polling"
                    );
                    self.set_state(FeedState::Degraded);
                    next_poll = Some(Instant::now() + self.config.poll_interval);
                }

                _ = sleep_until(poll_at), if next_poll.is_some() => {
                    next_poll = Some(Instant::now() + self.config.poll_interval);
                    // Push events arriving during this fetch sit in the
                    // subscription channel and are applied right after;
                    // both paths reconcile by id, so order is harmless.
                    match self.store.fetch_calls(self.account_id).await {
                        Ok(fetched) => {
                            self.merge_fetched(fetched);
                            if !self.calls.is_empty() && subscription.is_some() {
                                tracing::info!(
                                    account = %self.account_id,
                                    "Call data flowing again, back to push-only"
                                );
                                next_poll = None;
                                self.set_state(FeedState::Live);
                            } else {
                                self.publish();
                            }
                        }
                        // List unchanged; the next tick retries.
                        Err(e) => {
                            tracing::warn!(account = %self.account_id, "Fallback poll failed: {e}");
                        }
                    }
                }

                event = next_change(&mut subscription) => match event {
                    Some(change) => {
                        self.apply_change(change);
                        // Either producer can end the degraded window.
                        if self.state == FeedState::Degraded && !self.calls.is_empty() {
                            tracing::info!(
                                account = %self.account_id,
                                "Call data flowing again, back to push-only"
                            );
                            next_poll = None;
                            self.set_state(FeedState::Live);
                        } else {
                            self.publish();
                        }
                    }
                    None => {
                        tracing::warn!(account = %self.account_id, "Call subscription closed");
                        subscription = None;
                    }
                }
            }

            // Re-evaluate the degrade watchdog after every turn.
            self.rearm_watchdog(&mut degrade_deadline, &next_poll, subscription.is_some());
        }

        tracing::debug!(account = %self.account_id, "Call feed worker stopped");
    }

    /// Arm or disarm the degrade watchdog.
    ///
    /// Armed while the list is empty (or push is down) and fallback
    /// polling is not yet active. A non-empty list under healthy push
    /// disarms it.
    fn rearm_watchdog(
        &self,
        degrade_deadline: &mut Option<Instant>,
        next_poll: &Option<Instant>,
        push_ok: bool,
    ) {
        if self.state == FeedState::Degraded || next_poll.is_some() {
            *degrade_deadline = None;
            return;
        }

        let wants_watchdog = self.calls.is_empty() || !push_ok;
        match (wants_watchdog, degrade_deadline.is_some()) {
            (true, false) => {
                *degrade_deadline = Some(Instant::now() + self.config.degrade_after);
            }
            (false, true) => *degrade_deadline = None,
            _ => {}
        }
    }

    /// Apply one push event in delivery order.
    fn apply_change(&mut self, change: CallChange) {
        match change.action {
            ChangeAction::Insert | ChangeAction::Update => {
                let Some(record) = change.record else {
                    tracing::warn!(
                        action = %change.action,
                        id = %change.id,
                        "Change event without record, ignoring"
                    );
                    return;
                };
                self.observe(record);
            }
            ChangeAction::Delete => {
                // Unknown ids are a no-op; delivery is at-least-once.
                self.calls.retain(|c| c.id != change.id);
            }
        }
    }

    /// Upsert one record; fire the notification for a first-seen
    /// pending call. Shared by the push path and the fallback fetch.
    fn observe(&mut self, record: Call) {
        let first_seen = self.seen.insert(record.id);
        let heads_up = (first_seen && record.is_pending()).then(|| record.clone());

        match self.calls.iter_mut().find(|c| c.id == record.id) {
            // Last write wins by id
            Some(existing) => *existing = record,
            None => {
                self.calls.push(record);
                self.calls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            }
        }

        if let Some(call) = heads_up {
            self.notifier.notify_new_call(&call);
        }
    }

    /// Full replacement — only legal during the initial load. Seeds the
    /// seen-set without notifying: pre-existing calls are the baseline,
    /// not news.
    fn adopt_initial(&mut self, mut calls: Vec<Call>) {
        calls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.seen.extend(calls.iter().map(|c| c.id));
        self.calls = calls;
        self.publish();
    }

    /// Merge a fallback fetch by id: upsert only. Local records missing
    /// from the response stay — a push insert the fetch has not
    /// observed yet must not be dropped; deletes only ever arrive as
    /// push events.
    fn merge_fetched(&mut self, fetched: Vec<Call>) {
        for record in fetched {
            self.observe(record);
        }
    }

    fn set_state(&mut self, state: FeedState) {
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        let snapshot = FeedSnapshot {
            state: self.state,
            calls: Arc::new(self.calls.clone()),
        };
        if !self.publisher.publish(snapshot) {
            tracing::trace!(account = %self.account_id, "Snapshot superseded, discarding");
        }
    }
}

/// Next push event, or pending forever while the subscription is down
/// (the degrade watchdog handles recovery).
async fn next_change(subscription: &mut Option<CallSubscription>) -> Option<CallChange> {
    match subscription {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}
