use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::AppData;

/// Default timeout for snapshot reads.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for command writes.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(90);

/// Default period between background refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Banner shown when a load fails.
pub const LOAD_FAILURE_BANNER: &str =
    "Could not reach the data store. Check your connection and the configured endpoint";

/// Sync state shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Error(String),
}

impl SyncStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, SyncStatus::Error(_))
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Error(message) => write!(f, "error: {}", message),
        }
    }
}

/// Who asked for a load. Only foreground loads raise the `loading` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Foreground,
    Background,
}

/// Everything observers see, replaced as a whole on each transition.
#[derive(Debug, Clone, Default)]
pub struct CacheView {
    pub snapshot: Arc<AppData>,
    pub status: SyncStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub loading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub refresh_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}
