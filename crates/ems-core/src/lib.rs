//! Core library for the EMS local-first sync cache.
//!
//! The remote data store (a spreadsheet-backed web endpoint) is the system of
//! record. This crate keeps a full snapshot of it in memory and on disk,
//! serves reads from that snapshot, and applies writes optimistically before
//! confirming them remotely.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod sanitize;
pub mod sync;

pub use api::{ApiClient, ApiError, RemoteAction, RemoteCommand, RemoteReply, RemoteStore};
pub use auth::Session;
pub use cache::{CachedData, FileStore, LocalCache, LocalStore, MemoryStore};
pub use config::Config;
pub use error::{AuthError, SyncError};
pub use models::{AppData, Entity, EntityKind};
pub use sync::{CacheView, LoadMode, SyncCache, SyncSettings, SyncStatus};
