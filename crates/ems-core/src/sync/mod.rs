//! Local-first optimistic sync cache.

pub mod integrity;
pub mod ops;
pub mod state;
pub mod store;

pub use state::{CacheView, LoadMode, SyncSettings, SyncStatus};
pub use store::{Command, SyncCache};
