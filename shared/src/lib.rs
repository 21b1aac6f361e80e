//! Shared types for the comanda waiter-call service
//!
//! Store row models, change-feed event types, and small utilities
//! used across the workspace. This crate does no I/O.

pub mod event;
pub mod models;
pub mod util;

// Re-exports
pub use event::{CallChange, ChangeAction};
pub use models::*;
pub use serde::{Deserialize, Serialize};
