//! Durable local cache for offline access.
//!
//! This module provides the `LocalStore` key-value boundary (with file and
//! in-memory implementations) and `LocalCache`, the typed layer the sync
//! cache writes through. Two keys are used:
//! - `ems_data`: the full snapshot
//! - `ems_current_user`: the authenticated identity

pub mod manager;
pub mod store;

pub use manager::{CachedData, LocalCache, CURRENT_USER_KEY, SNAPSHOT_KEY};
pub use store::{FileStore, LocalStore, MemoryStore};
