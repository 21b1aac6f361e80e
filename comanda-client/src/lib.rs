//! Comanda Client - store access and live call feed
//!
//! Talks to the hosted store's REST surface and keeps a local list of
//! waiter calls synchronized through its change feed, with a polling
//! fallback when push delivery stalls.

pub mod config;
pub mod demo;
pub mod error;
pub mod feed;
pub mod notify;
pub mod store;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use feed::{CallFeed, ConnectionStatus, FeedConfig, FeedSnapshot, FeedState};
pub use notify::{BellNotifier, NotificationSink, SilentNotifier};
pub use store::{CallStore, CallSubscription, HttpStore, MemoryStore};

// Re-export shared types for convenience
pub use shared::{Call, CallChange, CallCreate, CallStatus, ChangeAction};
