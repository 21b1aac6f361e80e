//! Call Feed Synchronizer
//!
//! Keeps a local list of waiter calls synchronized with the remote
//! store: one full fetch on start, then change events applied in
//! delivery order, with a time-bounded fallback to periodic re-fetch
//! when no data arrives.
//!
//! # 架构
//!
//! ```text
//! CallFeed::start(account)
//!        │ spawn
//!        ▼
//!   FeedWorker ──select!──┬── shutdown token
//!        │                ├── degrade deadline (空列表 / push 断开)
//!        │                ├── poll tick (仅降级模式)
//!        │                └── push events (CallSubscription)
//!        ▼ generation-guarded publish
//!   watch::Sender<FeedSnapshot> ──► consumers (只读快照)
//! ```
//!
//! The worker is the only writer of the local list. Consumers receive
//! copy-on-write snapshots through a watch channel, so a push event
//! arriving mid-render never invalidates an iterator on their side.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use shared::models::Call;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::notify::NotificationSink;
use crate::store::CallStore;

mod worker;

use worker::FeedWorker;

/// Synchronizer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    /// No account bound
    Idle,
    /// Initial fetch in flight (or push never confirmed)
    Loading,
    /// Subscribed, receiving push events
    Live,
    /// No data within the degrade threshold; periodic re-fetch active
    Degraded,
}

/// Consumer-facing connection indicator, derived from the feed state
///
/// There is exactly one subscription per account per process — the
/// worker's — so this indicator and the notification sound can never
/// disagree or double up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Feed timing configuration
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | FEED_DEGRADE_AFTER_MS | 10000 | 降级阈值(毫秒) |
/// | FEED_POLL_INTERVAL_MS | 5000 | 降级后轮询间隔(毫秒) |
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// How long the list may stay empty before assuming push delivery
    /// is not working
    pub degrade_after: Duration,
    /// Re-fetch cadence while degraded
    pub poll_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            degrade_after: Duration::from_secs(10),
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl FeedConfig {
    /// 从环境变量加载配置，未设置时使用默认值
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            degrade_after: std::env::var("FEED_DEGRADE_AFTER_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.degrade_after),
            poll_interval: std::env::var("FEED_POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
        }
    }
}

/// Read-only view of the synchronized call list
///
/// `calls` is a copy-on-write snapshot ordered newest first: every
/// publish allocates a fresh list, so a consumer may keep iterating an
/// old snapshot while the worker moves on.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub state: FeedState,
    pub calls: Arc<Vec<Call>>,
}

impl FeedSnapshot {
    fn idle() -> Self {
        Self {
            state: FeedState::Idle,
            calls: Arc::new(Vec::new()),
        }
    }

    fn loading() -> Self {
        Self {
            state: FeedState::Loading,
            calls: Arc::new(Vec::new()),
        }
    }

    /// True while the periodic re-fetch fallback is active
    pub fn using_fallback(&self) -> bool {
        self.state == FeedState::Degraded
    }

    pub fn connection(&self) -> ConnectionStatus {
        match self.state {
            FeedState::Loading => ConnectionStatus::Connecting,
            FeedState::Live => ConnectionStatus::Connected,
            FeedState::Idle | FeedState::Degraded => ConnectionStatus::Disconnected,
        }
    }

    /// Calls still waiting for staff
    pub fn pending_count(&self) -> usize {
        self.calls.iter().filter(|c| c.is_pending()).count()
    }
}

struct FeedShared {
    /// Epoch token; bumped on every start/stop
    generation: AtomicU64,
    snapshot_tx: watch::Sender<FeedSnapshot>,
}

/// Generation-guarded snapshot publisher
///
/// The underlying timers and fetches may complete after `stop()` asked
/// for cancellation. Every publish compares its epoch under the watch
/// lock; a stale worker's snapshot is discarded, never observed.
#[derive(Clone)]
pub(crate) struct Publisher {
    generation: u64,
    shared: Arc<FeedShared>,
}

impl Publisher {
    /// Publish a snapshot; returns false when this worker is stale.
    pub(crate) fn publish(&self, snapshot: FeedSnapshot) -> bool {
        let mut fresh = false;
        self.shared.snapshot_tx.send_if_modified(|current| {
            if self.shared.generation.load(Ordering::SeqCst) != self.generation {
                return false;
            }
            *current = snapshot;
            fresh = true;
            true
        });
        fresh
    }
}

/// Call Feed Synchronizer handle
///
/// Explicitly constructed around an injected store client; no ambient
/// singletons. `start`/`stop` are cheap and idempotent; the actual
/// work runs on a spawned worker task.
pub struct CallFeed {
    store: Arc<dyn CallStore>,
    notifier: Arc<dyn NotificationSink>,
    config: FeedConfig,
    shared: Arc<FeedShared>,
    worker_token: Mutex<Option<CancellationToken>>,
}

impl CallFeed {
    pub fn new(
        store: Arc<dyn CallStore>,
        notifier: Arc<dyn NotificationSink>,
        config: FeedConfig,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(FeedSnapshot::idle());
        Self {
            store,
            notifier,
            config,
            shared: Arc::new(FeedShared {
                generation: AtomicU64::new(0),
                snapshot_tx,
            }),
            worker_token: Mutex::new(None),
        }
    }

    /// Subscribe to feed snapshots
    pub fn watch(&self) -> watch::Receiver<FeedSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Current snapshot
    pub fn snapshot(&self) -> FeedSnapshot {
        self.shared.snapshot_tx.borrow().clone()
    }

    /// Begin tracking calls for the account
    ///
    /// `None` (signed out) silently yields an empty idle feed. Calling
    /// `start` again replaces any previous tracking: the epoch bump
    /// turns the old worker's publishes into no-ops before it notices
    /// the cancellation.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, account_id: Option<Uuid>) {
        let Some(account_id) = account_id else {
            tracing::debug!("Feed started without an account, staying idle");
            self.stop();
            return;
        };

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        let previous = self
            .worker_token
            .lock()
            .expect("feed worker lock poisoned")
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let publisher = Publisher {
            generation,
            shared: self.shared.clone(),
        };
        publisher.publish(FeedSnapshot::loading());

        tracing::info!(account = %account_id, "Call feed starting");
        let worker = FeedWorker::new(
            self.store.clone(),
            self.notifier.clone(),
            self.config.clone(),
            account_id,
            publisher,
            token,
        );
        tokio::spawn(worker.run());
    }

    /// Stop tracking, release all subscriptions and timers; idempotent
    ///
    /// Also the account-loss path: sign-out calls this and the local
    /// list is gone immediately.
    pub fn stop(&self) {
        // Epoch first: any in-flight publish is stale from here on.
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        let token = self
            .worker_token
            .lock()
            .expect("feed worker lock poisoned")
            .take();
        if let Some(token) = token {
            token.cancel();
            tracing::info!("Call feed stopped");
        }
        self.shared.snapshot_tx.send_replace(FeedSnapshot::idle());
    }
}

impl Drop for CallFeed {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.worker_token.lock() {
            if let Some(token) = guard.take() {
                token.cancel();
            }
        }
    }
}
