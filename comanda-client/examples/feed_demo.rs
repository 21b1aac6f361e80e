//! Call feed walkthrough against the in-memory store
//!
//! Starts a feed, creates calls from a pretend guest table, marks one
//! attended from a pretend dashboard, and prints each snapshot as the
//! feed publishes it.
//!
//! Run: cargo run --example feed_demo

use std::sync::Arc;
use std::time::Duration;

use comanda_client::store::CallStore;
use comanda_client::{BellNotifier, CallFeed, FeedConfig, MemoryStore};
use shared::models::CallCreate;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store = Arc::new(MemoryStore::new());
    let account = Uuid::new_v4();

    let feed = CallFeed::new(
        store.clone(),
        Arc::new(BellNotifier),
        FeedConfig::from_env(),
    );
    let mut snapshots = feed.watch();
    feed.start(Some(account));

    // Guest at table 7 calls the waiter
    let call = store
        .create_call(
            account,
            CallCreate {
                table_id: Uuid::new_v4(),
                table_number: "7".to_string(),
                notes: Some("Conta, por favor".to_string()),
            },
        )
        .await?;

    // Staff marks it attended a moment later
    let store_for_staff = store.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        let _ = store_for_staff.mark_attended(account, call.id).await;
    });

    // Watch the feed for a few seconds
    let deadline = tokio::time::Instant::now() + Duration::from_secs(4);
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                println!(
                    "[{}] state={:?} connection={:?} fallback={} pending={} total={}",
                    shared::util::now_rfc3339(),
                    snapshot.state,
                    snapshot.connection(),
                    snapshot.using_fallback(),
                    snapshot.pending_count(),
                    snapshot.calls.len(),
                );
            }
            _ = tokio::time::sleep_until(deadline) => break,
        }
    }

    feed.stop();
    println!("final state={:?}", feed.snapshot().state);
    Ok(())
}
