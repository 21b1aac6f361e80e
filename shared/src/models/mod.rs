//! Data models
//!
//! Rows of the hosted store, shared between the client crate and its
//! consumers. Every row is scoped by the owning restaurant account.
//! IDs are UUIDs minted by the store.

pub mod call;
pub mod dining_table;
pub mod menu_item;
pub mod profile;

// Re-exports
pub use call::*;
pub use dining_table::*;
pub use menu_item::*;
pub use profile::*;
