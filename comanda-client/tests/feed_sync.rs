//! Call feed scenario tests against the in-memory store
//!
//! Timing-sensitive paths run with shortened thresholds injected via
//! FeedConfig; every wait has a hard timeout well above them.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use comanda_client::error::{ClientError, ClientResult};
use comanda_client::store::{CallStore, CallSubscription};
use comanda_client::{CallFeed, FeedConfig, FeedSnapshot, FeedState, MemoryStore, NotificationSink};
use shared::models::{Call, CallCreate};
use tokio::sync::watch;
use uuid::Uuid;

fn fast_config() -> FeedConfig {
    FeedConfig {
        degrade_after: Duration::from_millis(200),
        poll_interval: Duration::from_millis(100),
    }
}

fn payload(table: &str) -> CallCreate {
    CallCreate {
        table_id: Uuid::new_v4(),
        table_number: table.to_string(),
        notes: None,
    }
}

fn pending_call(account: Uuid, table: &str) -> Call {
    Call {
        id: Uuid::new_v4(),
        table_id: Uuid::new_v4(),
        table_number: table.to_string(),
        status: shared::models::CallStatus::Pending,
        created_at: chrono::Utc::now(),
        attended_at: None,
        account_id: account,
        notes: None,
    }
}

/// Counting sink for notification assertions
#[derive(Default)]
struct CountingSink {
    fired: Mutex<Vec<Uuid>>,
}

impl CountingSink {
    fn count(&self) -> usize {
        self.fired.lock().unwrap().len()
    }
}

impl NotificationSink for CountingSink {
    fn notify_new_call(&self, call: &Call) {
        self.fired.lock().unwrap().push(call.id);
    }
}

/// Store wrapper that counts fetches (to observe the poll timer)
struct CountingStore {
    inner: MemoryStore,
    fetches: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CallStore for CountingStore {
    async fn fetch_calls(&self, account_id: Uuid) -> ClientResult<Vec<Call>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_calls(account_id).await
    }

    async fn subscribe_calls(&self, account_id: Uuid) -> ClientResult<CallSubscription> {
        self.inner.subscribe_calls(account_id).await
    }

    async fn create_call(&self, account_id: Uuid, payload: CallCreate) -> ClientResult<Call> {
        self.inner.create_call(account_id, payload).await
    }

    async fn mark_attended(&self, account_id: Uuid, call_id: Uuid) -> ClientResult<Call> {
        self.inner.mark_attended(account_id, call_id).await
    }

    async fn cancel_call(&self, account_id: Uuid, call_id: Uuid) -> ClientResult<Call> {
        self.inner.cancel_call(account_id, call_id).await
    }
}

/// Store whose realtime layer is down: subscribe always fails
struct NoPushStore {
    inner: MemoryStore,
}

#[async_trait]
impl CallStore for NoPushStore {
    async fn fetch_calls(&self, account_id: Uuid) -> ClientResult<Vec<Call>> {
        self.inner.fetch_calls(account_id).await
    }

    async fn subscribe_calls(&self, _account_id: Uuid) -> ClientResult<CallSubscription> {
        Err(ClientError::Stream("realtime unavailable".to_string()))
    }

    async fn create_call(&self, account_id: Uuid, payload: CallCreate) -> ClientResult<Call> {
        self.inner.create_call(account_id, payload).await
    }

    async fn mark_attended(&self, account_id: Uuid, call_id: Uuid) -> ClientResult<Call> {
        self.inner.mark_attended(account_id, call_id).await
    }

    async fn cancel_call(&self, account_id: Uuid, call_id: Uuid) -> ClientResult<Call> {
        self.inner.cancel_call(account_id, call_id).await
    }
}

/// Wait until the feed publishes a snapshot matching the predicate.
async fn wait_for<F>(
    rx: &mut watch::Receiver<FeedSnapshot>,
    within: Duration,
    mut pred: F,
) -> FeedSnapshot
where
    F: FnMut(&FeedSnapshot) -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        {
            let snapshot = rx.borrow_and_update().clone();
            if pred(&snapshot) {
                return snapshot;
            }
        }
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        assert!(
            !remaining.is_zero(),
            "feed did not reach the expected snapshot within {within:?}"
        );
        match tokio::time::timeout(remaining, rx.changed()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => panic!("feed watch channel closed"),
            Err(_) => panic!("feed did not reach the expected snapshot within {within:?}"),
        }
    }
}

#[tokio::test]
async fn test_empty_feed_degrades_then_recovers_via_poll() {
    let store = Arc::new(CountingStore::new());
    let sink = Arc::new(CountingSink::default());
    let account = Uuid::new_v4();

    let feed = CallFeed::new(store.clone(), sink.clone(), fast_config());
    let mut rx = feed.watch();
    feed.start(Some(account));

    // Loading → Live with an empty list
    let live = wait_for(&mut rx, Duration::from_secs(2), |s| {
        s.state == FeedState::Live
    })
    .await;
    assert!(live.calls.is_empty());
    assert!(!live.using_fallback());

    // Degrade threshold passes with no data
    let degraded = wait_for(&mut rx, Duration::from_secs(2), |s| s.using_fallback()).await;
    assert_eq!(degraded.state, FeedState::Degraded);

    // A call reaches the store without a push event; only the poll can
    // see it.
    let c1 = pending_call(account, "3");
    store.inner.seed(c1.clone());

    let recovered = wait_for(&mut rx, Duration::from_secs(2), |s| {
        s.state == FeedState::Live && s.calls.len() == 1
    })
    .await;
    assert_eq!(recovered.calls[0].id, c1.id);
    assert_eq!(sink.fired.lock().unwrap().as_slice(), &[c1.id]);

    // Back on push-only: the poll timer must be gone.
    let fetches_after_recovery = store.fetches.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(store.fetches.load(Ordering::SeqCst), fetches_after_recovery);
    assert_eq!(sink.count(), 1);

    feed.stop();
}

#[tokio::test]
async fn test_push_insert_then_update_keeps_one_record() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(CountingSink::default());
    let account = Uuid::new_v4();

    let feed = CallFeed::new(store.clone(), sink.clone(), fast_config());
    let mut rx = feed.watch();
    feed.start(Some(account));

    wait_for(&mut rx, Duration::from_secs(2), |s| {
        s.state == FeedState::Live
    })
    .await;

    let c2 = store.create_call(account, payload("2")).await.unwrap();
    wait_for(&mut rx, Duration::from_secs(2), |s| s.calls.len() == 1).await;

    store.mark_attended(account, c2.id).await.unwrap();
    let snapshot = wait_for(&mut rx, Duration::from_secs(2), |s| {
        s.calls.len() == 1 && s.calls[0].status == shared::models::CallStatus::Attended
    })
    .await;

    assert_eq!(snapshot.calls[0].id, c2.id);
    assert!(snapshot.calls[0].attended_at.is_some());
    // Notified on the insert, not the update
    assert_eq!(sink.fired.lock().unwrap().as_slice(), &[c2.id]);

    feed.stop();
}

#[tokio::test]
async fn test_delete_event_removes_record() {
    let store = Arc::new(MemoryStore::new());
    let account = Uuid::new_v4();

    let feed = CallFeed::new(
        store.clone(),
        Arc::new(comanda_client::SilentNotifier),
        fast_config(),
    );
    let mut rx = feed.watch();
    feed.start(Some(account));

    let call = store.create_call(account, payload("8")).await.unwrap();
    wait_for(&mut rx, Duration::from_secs(2), |s| s.calls.len() == 1).await;

    store.remove_call(account, call.id);
    wait_for(&mut rx, Duration::from_secs(2), |s| s.calls.is_empty()).await;

    feed.stop();
}

#[tokio::test]
async fn test_stop_right_after_start_freezes_the_feed() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(CountingSink::default());
    let account = Uuid::new_v4();

    let feed = CallFeed::new(store.clone(), sink.clone(), fast_config());
    let rx = feed.watch();

    feed.start(Some(account));
    feed.stop();

    let snapshot = feed.snapshot();
    assert_eq!(snapshot.state, FeedState::Idle);
    assert!(snapshot.calls.is_empty());

    // Data keeps arriving at the store; the stopped feed must not move
    // across a full degrade-threshold wait.
    store.create_call(account, payload("1")).await.unwrap();
    tokio::time::sleep(fast_config().degrade_after + Duration::from_millis(300)).await;

    let snapshot = rx.borrow().clone();
    assert_eq!(snapshot.state, FeedState::Idle);
    assert!(snapshot.calls.is_empty());
    assert_eq!(sink.count(), 0);
}

#[tokio::test]
async fn test_start_without_account_stays_idle() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(CountingSink::default());

    let feed = CallFeed::new(store.clone(), sink.clone(), fast_config());
    feed.start(None);

    store
        .create_call(Uuid::new_v4(), payload("1"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(feed.snapshot().state, FeedState::Idle);
    assert!(feed.snapshot().calls.is_empty());
    assert_eq!(sink.count(), 0);
}

#[tokio::test]
async fn test_subscribe_failure_recovers_by_polling_only() {
    let store = Arc::new(NoPushStore {
        inner: MemoryStore::new(),
    });
    let sink = Arc::new(CountingSink::default());
    let account = Uuid::new_v4();

    // One call exists before the feed starts: the initial load is the
    // silent baseline.
    let baseline = pending_call(account, "5");
    store.inner.seed(baseline.clone());

    let feed = CallFeed::new(store.clone(), sink.clone(), fast_config());
    let mut rx = feed.watch();
    feed.start(Some(account));

    // Push is down, so the feed degrades even with data present.
    let degraded = wait_for(&mut rx, Duration::from_secs(2), |s| s.using_fallback()).await;
    assert_eq!(degraded.calls.len(), 1);

    // New call reaches the store; the poll is the only way to see it.
    let late = store.create_call(account, payload("6")).await.unwrap();
    let snapshot = wait_for(&mut rx, Duration::from_secs(2), |s| s.calls.len() == 2).await;

    // Still degraded: there is no push source to go back to.
    assert!(snapshot.using_fallback());
    assert_eq!(sink.fired.lock().unwrap().as_slice(), &[late.id]);

    feed.stop();
    assert_eq!(feed.snapshot().state, FeedState::Idle);
}

#[tokio::test]
async fn test_restart_rebinds_to_the_new_account() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(CountingSink::default());
    let acct_a = Uuid::new_v4();
    let acct_b = Uuid::new_v4();

    let feed = CallFeed::new(store.clone(), sink.clone(), fast_config());
    let mut rx = feed.watch();

    feed.start(Some(acct_a));
    wait_for(&mut rx, Duration::from_secs(2), |s| {
        s.state == FeedState::Live
    })
    .await;

    // Account switch: the old worker's publishes are stale from here.
    feed.start(Some(acct_b));
    wait_for(&mut rx, Duration::from_secs(2), |s| {
        s.state == FeedState::Live
    })
    .await;

    // Activity on the old account must never surface.
    store.create_call(acct_a, payload("1")).await.unwrap();
    let b_call = store.create_call(acct_b, payload("2")).await.unwrap();

    let snapshot = wait_for(&mut rx, Duration::from_secs(2), |s| s.calls.len() == 1).await;
    assert_eq!(snapshot.calls[0].id, b_call.id);
    assert_eq!(snapshot.calls[0].account_id, acct_b);

    feed.stop();
}
