use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::LocalStore;
use crate::models::{AppData, User};

/// Key holding the full serialized snapshot.
pub const SNAPSHOT_KEY: &str = "ems_data";

/// Key holding the authenticated identity.
pub const CURRENT_USER_KEY: &str = "ems_current_user";

/// Consider the cached snapshot stale after one background refresh period.
const CACHE_STALE_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            let remaining_mins = minutes % 60;
            if remaining_mins >= 30 {
                // Round up: 1h 30m+ becomes 2h
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            let remaining_hours = (minutes % 1440) / 60;
            if remaining_hours >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > CACHE_STALE_MINUTES
    }
}

/// Typed access to the durable local cache.
pub struct LocalCache<S> {
    store: S,
}

impl<S: LocalStore> LocalCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<CachedData<T>>> {
        let Some(contents) = self.store.get(key)? else {
            return Ok(None);
        };

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache entry: {}", key))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, key: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let contents = serde_json::to_string(&cached)?;
        self.store.set(key, &contents)
    }

    // ===== Snapshot =====

    pub fn load_snapshot(&self) -> Result<Option<CachedData<AppData>>> {
        self.load(SNAPSHOT_KEY)
    }

    pub fn save_snapshot(&self, data: &AppData) -> Result<()> {
        self.save(SNAPSHOT_KEY, data)
    }

    // ===== Current User =====

    pub fn load_current_user(&self) -> Result<Option<CachedData<User>>> {
        self.load(CURRENT_USER_KEY)
    }

    /// Persist the signed-in identity. The password is never written.
    pub fn save_current_user(&self, user: &User) -> Result<()> {
        self.save(CURRENT_USER_KEY, &user.without_password())
    }

    pub fn clear_current_user(&self) -> Result<()> {
        self.store.remove(CURRENT_USER_KEY)
    }

    // ===== Cache Age Information =====

    /// Age of the persisted snapshot, `None` when absent or unreadable.
    pub fn snapshot_age(&self) -> Option<String> {
        match self.load_snapshot() {
            Ok(Some(cached)) => Some(cached.age_display()),
            Ok(None) => None,
            Err(e) => {
                debug!(error = %e, "Failed to load snapshot for age display");
                None
            }
        }
    }

    /// Missing or unreadable counts as stale.
    pub fn is_snapshot_stale(&self) -> bool {
        match self.load_snapshot() {
            Ok(Some(cached)) => cached.is_stale(),
            Ok(None) => true,
            Err(e) => {
                debug!(error = %e, "Failed to load snapshot for staleness check");
                true
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
