//! New-call notification sink
//!
//! The feed fires the sink once per newly observed pending call. Sinks
//! must never fail the caller: an unavailable audio device degrades to a
//! log line, nothing more.

use shared::models::Call;

/// 新呼叫通知 trait
pub trait NotificationSink: Send + Sync {
    /// Called once per newly observed pending call.
    ///
    /// Must not block. Failures stay inside the implementation.
    fn notify_new_call(&self, call: &Call);
}

/// Terminal bell notifier
///
/// Writes BEL to stderr as the audible cue. When stderr is not a
/// terminal that rings, the log line is still the visible trace.
#[derive(Debug, Default)]
pub struct BellNotifier;

impl NotificationSink for BellNotifier {
    fn notify_new_call(&self, call: &Call) {
        use std::io::Write;

        let mut err = std::io::stderr();
        if let Err(e) = err.write_all(b"\x07").and_then(|_| err.flush()) {
            tracing::debug!("Bell unavailable: {e}");
        }
        tracing::info!(table = %call.table_number, call = %call.id, "New waiter call");
    }
}

/// Log-only notifier for environments without audio capability
#[derive(Debug, Default)]
pub struct SilentNotifier;

impl NotificationSink for SilentNotifier {
    fn notify_new_call(&self, call: &Call) {
        tracing::info!(table = %call.table_number, call = %call.id, "New waiter call (silent)");
    }
}
