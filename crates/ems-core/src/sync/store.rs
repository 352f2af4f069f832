use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::integrity;
use super::ops::{adopt_id, apply_delete, apply_upsert, toggle_selection, UpsertOutcome};
use super::state::{CacheView, LoadMode, SyncSettings, SyncStatus, LOAD_FAILURE_BANNER};
use crate::api::{RemoteAction, RemoteCommand, RemoteReply, RemoteStore};
use crate::cache::{LocalCache, LocalStore};
use crate::error::SyncError;
use crate::ids::IdGenerator;
use crate::models::{
    AppData, Bank, BankBranch, Department, Employee, Entity, EntityKind, Office, Payscale, Post,
    User,
};
use crate::sanitize::{coerce_id_value, decode_record, decode_snapshot};

/// A mutation ready to send: the remote verb, its payload and the snapshot
/// that applies it locally.
#[derive(Debug, Clone)]
pub struct Command {
    pub action: RemoteAction,
    pub payload: Value,
    pub snapshot: AppData,
}

/// Held for the lifetime of one mutation.
struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Local-first cache in front of the remote data store.
///
/// Reads are served from the in-memory snapshot. Writes are applied
/// optimistically, persisted to the local cache, then sent to the remote
/// store; a failed write is reconciled by reloading the remote snapshot.
/// At most one write is outstanding at a time.
pub struct SyncCache<R, S> {
    remote: R,
    cache: LocalCache<S>,
    settings: SyncSettings,
    ids: IdGenerator,
    state: watch::Sender<CacheView>,
    in_flight: AtomicBool,
    /// Bumped when a mutation starts, so loads can detect they raced one.
    mutation_epoch: AtomicU64,
}

impl<R: RemoteStore, S: LocalStore> SyncCache<R, S> {
    /// Build a cache, hydrating the snapshot from local storage.
    pub fn new(remote: R, store: S, settings: SyncSettings) -> Self {
        let cache = LocalCache::new(store);
        let snapshot = match cache.load_snapshot() {
            Ok(Some(cached)) => {
                debug!(age = %cached.age_display(), "Hydrated snapshot from local cache");
                cached.data
            }
            Ok(None) => {
                debug!("No cached snapshot found");
                AppData::default()
            }
            Err(e) => {
                warn!(error = %e, "Cached snapshot unreadable, starting empty");
                AppData::default()
            }
        };

        let (state, _) = watch::channel(CacheView {
            snapshot: Arc::new(snapshot),
            ..CacheView::default()
        });

        Self {
            remote,
            cache,
            settings,
            ids: IdGenerator::new(),
            state,
            in_flight: AtomicBool::new(false),
            mutation_epoch: AtomicU64::new(0),
        }
    }

    // ===== Accessors =====

    pub fn snapshot(&self) -> Arc<AppData> {
        Arc::clone(&self.state.borrow().snapshot)
    }

    pub fn status(&self) -> SyncStatus {
        self.state.borrow().status.clone()
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.state.borrow().last_synced_at
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn is_mutating(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn view(&self) -> CacheView {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<CacheView> {
        self.state.subscribe()
    }

    /// Current user collection, for credential checks.
    pub fn users(&self) -> Vec<User> {
        self.snapshot().users.clone()
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn local_cache(&self) -> &LocalCache<S> {
        &self.cache
    }

    pub fn dismiss_error(&self) {
        self.state.send_if_modified(|view| {
            if view.status.is_error() {
                view.status = SyncStatus::Idle;
                true
            } else {
                false
            }
        });
    }

    // ===== Load =====

    /// Replace the snapshot with the remote one.
    ///
    /// Refused while a mutation is in flight; a load that finishes after a
    /// mutation started discards its result rather than overwrite the
    /// optimistic snapshot.
    pub async fn load(&self, mode: LoadMode) -> Result<Arc<AppData>, SyncError> {
        // Epoch before the flight check, so a write that starts in between
        // still invalidates this load
        let epoch = self.mutation_epoch.load(Ordering::Acquire);
        if self.is_mutating() {
            debug!(?mode, "Skipping load while a mutation is in flight");
            return Err(SyncError::ConcurrentMutationInProgress);
        }

        let foreground = mode == LoadMode::Foreground;
        if foreground {
            self.state.send_modify(|view| view.loading = true);
        }

        info!(?mode, "Loading snapshot from data store");
        let result = self.fetch().await;

        if self.is_mutating() || self.mutation_epoch.load(Ordering::Acquire) != epoch {
            debug!("Discarding load that raced a mutation");
            if foreground {
                self.state.send_modify(|view| view.loading = false);
            }
            return Err(SyncError::ConcurrentMutationInProgress);
        }

        match result {
            Ok(data) => {
                self.persist(&data);
                let snapshot = Arc::new(data);
                self.state.send_modify(|view| {
                    view.snapshot = Arc::clone(&snapshot);
                    view.status = SyncStatus::Idle;
                    view.last_synced_at = Some(Utc::now());
                    if foreground {
                        view.loading = false;
                    }
                });
                info!("Snapshot loaded");
                Ok(snapshot)
            }
            Err(e) => {
                warn!(error = %e, ?mode, "Load failed, keeping previous snapshot");
                let banner = format!("{}: {}", LOAD_FAILURE_BANNER, e);
                self.state.send_modify(|view| {
                    view.status = SyncStatus::Error(banner);
                    if foreground {
                        view.loading = false;
                    }
                });
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> Result<AppData, SyncError> {
        let raw = timeout(self.settings.read_timeout, self.remote.fetch_snapshot())
            .await
            .map_err(|_| SyncError::NetworkTimeout)??;
        decode_snapshot(raw).map_err(|e| SyncError::MalformedResponse(e.to_string()))
    }

    /// Best-effort write to the local cache.
    fn persist(&self, data: &AppData) {
        if let Err(e) = self.cache.save_snapshot(data) {
            let error = SyncError::LocalPersistenceFailure(format!("{:#}", e));
            warn!(error = %error, "Ignoring local cache write failure");
        }
    }

    // ===== Background Refresh =====

    /// Start the foreground load, then keep refreshing in the background.
    pub async fn start(self: &Arc<Self>) -> JoinHandle<()>
    where
        R: 'static,
        S: 'static,
    {
        // Failure is already reflected in the status banner
        let _ = self.load(LoadMode::Foreground).await;
        self.spawn_background_refresh()
    }

    /// Reload every `refresh_interval`, first tick one interval from now.
    pub fn spawn_background_refresh(self: &Arc<Self>) -> JoinHandle<()>
    where
        R: 'static,
        S: 'static,
    {
        let cache = Arc::clone(self);
        let period = self.settings.refresh_interval;
        tokio::spawn(async move {
            info!(period_secs = period.as_secs(), "Background refresh task started");
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = cache.load(LoadMode::Background).await {
                    debug!(error = %e, "Background refresh did not apply");
                }
            }
        })
    }

    // ===== Mutations =====

    fn try_begin(&self) -> Result<FlightGuard<'_>, SyncError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                debug!("Rejecting mutation while another is in flight");
                SyncError::ConcurrentMutationInProgress
            })?;
        self.mutation_epoch.fetch_add(1, Ordering::AcqRel);
        Ok(FlightGuard {
            flag: &self.in_flight,
        })
    }

    /// Apply `command.snapshot` optimistically and send the command.
    pub async fn mutate(&self, command: Command) -> Result<RemoteReply, SyncError> {
        let flight = self.try_begin()?;
        self.dispatch(&flight, command).await
    }

    async fn dispatch(
        &self,
        _flight: &FlightGuard<'_>,
        command: Command,
    ) -> Result<RemoteReply, SyncError> {
        let previous = self.snapshot();
        let snapshot = Arc::new(command.snapshot);
        self.state.send_modify(|view| {
            view.status = SyncStatus::Syncing;
            view.snapshot = Arc::clone(&snapshot);
        });
        self.persist(&snapshot);

        let remote_command = RemoteCommand {
            action: command.action,
            payload: command.payload,
        };
        info!(action = %remote_command.action, "Sending command");

        let result = match timeout(
            self.settings.write_timeout,
            self.remote.send_command(&remote_command),
        )
        .await
        {
            Ok(Ok(reply)) => reply.into_result().map_err(SyncError::from),
            Ok(Err(e)) => Err(SyncError::from(e)),
            Err(_) => Err(SyncError::NetworkTimeout),
        };

        match result {
            Ok(reply) => {
                self.state.send_modify(|view| {
                    view.status = SyncStatus::Idle;
                    view.last_synced_at = Some(Utc::now());
                });
                debug!(action = %remote_command.action, "Command acknowledged");
                Ok(reply)
            }
            Err(e) => {
                warn!(action = %remote_command.action, error = %e, "Command failed, reconciling");
                self.state
                    .send_modify(|view| view.status = SyncStatus::Error(e.to_string()));
                self.reconcile(previous).await;
                Err(e)
            }
        }
    }

    /// Drop the optimistic snapshot in favour of the remote one. The error
    /// status set by the failed command stays up.
    async fn reconcile(&self, previous: Arc<AppData>) {
        match self.fetch().await {
            Ok(data) => {
                self.persist(&data);
                let snapshot = Arc::new(data);
                self.state.send_modify(|view| {
                    view.snapshot = snapshot;
                    view.last_synced_at = Some(Utc::now());
                });
                info!("Reconciled snapshot with data store");
            }
            Err(e) => {
                error!(error = %e, "Reconciliation failed, restoring previous snapshot");
                self.persist(&previous);
                self.state.send_modify(|view| view.snapshot = previous);
            }
        }
    }

    /// Create or update a record. Returns the record as stored, with its
    /// final id and timestamps.
    pub async fn upsert<E: Entity>(&self, record: E) -> Result<E, SyncError> {
        let flight = self.try_begin()?;

        let mut data = AppData::clone(&self.snapshot());
        let (mut record, outcome) = apply_upsert(&mut data, record, &self.ids, Utc::now());
        let payload = serde_json::to_value(&record)?;

        let reply = self
            .dispatch(
                &flight,
                Command {
                    action: RemoteAction::Upsert(E::KIND),
                    payload,
                    snapshot: data,
                },
            )
            .await?;

        if outcome == UpsertOutcome::Created {
            if let Some(remote_id) = server_id(&reply, E::KIND) {
                let local_id = record.id();
                let mut data = AppData::clone(&self.snapshot());
                if adopt_id::<E>(&mut data, local_id, remote_id) {
                    debug!(kind = %E::KIND, local_id, remote_id, "Adopted server-assigned id");
                    self.persist(&data);
                    self.state.send_modify(|view| view.snapshot = Arc::new(data));
                    record.set_id(remote_id);
                }
            }
        }

        Ok(record)
    }

    /// Upsert a loosely typed record, e.g. one typed on the command line.
    pub async fn upsert_json(&self, kind: EntityKind, raw: Value) -> Result<Value, SyncError> {
        match kind {
            EntityKind::User => self.upsert_raw::<User>(raw).await,
            EntityKind::Department => self.upsert_raw::<Department>(raw).await,
            EntityKind::Office => self.upsert_raw::<Office>(raw).await,
            EntityKind::Bank => self.upsert_raw::<Bank>(raw).await,
            EntityKind::Branch => self.upsert_raw::<BankBranch>(raw).await,
            EntityKind::Post => self.upsert_raw::<Post>(raw).await,
            EntityKind::Payscale => self.upsert_raw::<Payscale>(raw).await,
            EntityKind::Employee => self.upsert_raw::<Employee>(raw).await,
        }
    }

    async fn upsert_raw<E: Entity>(&self, raw: Value) -> Result<Value, SyncError> {
        let record: E = decode_record(raw).map_err(|e| SyncError::InvalidRecord {
            kind: E::KIND,
            message: e.to_string(),
        })?;
        let saved = self.upsert(record).await?;
        Ok(serde_json::to_value(saved)?)
    }

    /// Create or update several branches in one command.
    pub async fn upsert_branches(
        &self,
        branches: Vec<BankBranch>,
    ) -> Result<Vec<BankBranch>, SyncError> {
        if branches.is_empty() {
            return Ok(Vec::new());
        }
        let flight = self.try_begin()?;

        let mut data = AppData::clone(&self.snapshot());
        let now = Utc::now();
        let saved: Vec<BankBranch> = branches
            .into_iter()
            .map(|branch| apply_upsert(&mut data, branch, &self.ids, now).0)
            .collect();

        let mut payload = Map::new();
        payload.insert(
            EntityKind::Branch.collection_key().to_string(),
            serde_json::to_value(&saved)?,
        );

        self.dispatch(
            &flight,
            Command {
                action: RemoteAction::BatchUpsertBranches,
                payload: Value::Object(payload),
                snapshot: data,
            },
        )
        .await?;

        Ok(saved)
    }

    /// Delete a record nothing else references. Returns the removed record.
    pub async fn delete<E: Entity>(&self, id: u64) -> Result<E, SyncError> {
        let flight = self.try_begin()?;

        let current = self.snapshot();
        if !current.contains::<E>(id) {
            return Err(SyncError::NotFound { kind: E::KIND, id });
        }
        integrity::check_delete(&current, E::KIND, id)?;

        let mut data = AppData::clone(&current);
        let removed =
            apply_delete::<E>(&mut data, id).ok_or(SyncError::NotFound { kind: E::KIND, id })?;

        let mut payload = Map::new();
        payload.insert(E::KIND.id_field().to_string(), Value::from(id));

        self.dispatch(
            &flight,
            Command {
                action: RemoteAction::Delete(E::KIND),
                payload: Value::Object(payload),
                snapshot: data,
            },
        )
        .await?;

        Ok(removed)
    }

    pub async fn delete_json(&self, kind: EntityKind, id: u64) -> Result<Value, SyncError> {
        let removed = match kind {
            EntityKind::User => serde_json::to_value(self.delete::<User>(id).await?)?,
            EntityKind::Department => serde_json::to_value(self.delete::<Department>(id).await?)?,
            EntityKind::Office => serde_json::to_value(self.delete::<Office>(id).await?)?,
            EntityKind::Bank => serde_json::to_value(self.delete::<Bank>(id).await?)?,
            EntityKind::Branch => serde_json::to_value(self.delete::<BankBranch>(id).await?)?,
            EntityKind::Post => serde_json::to_value(self.delete::<Post>(id).await?)?,
            EntityKind::Payscale => serde_json::to_value(self.delete::<Payscale>(id).await?)?,
            EntityKind::Employee => serde_json::to_value(self.delete::<Employee>(id).await?)?,
        };
        Ok(removed)
    }

    /// Select the post for the user if unselected, otherwise unselect it.
    /// Returns the user's selections afterwards.
    pub async fn toggle_user_post_selection(
        &self,
        user_id: u64,
        post_id: u64,
    ) -> Result<Vec<u64>, SyncError> {
        let flight = self.try_begin()?;

        let mut data = AppData::clone(&self.snapshot());
        let posts = toggle_selection(&mut data, user_id, post_id);

        let mut payload = Map::new();
        payload.insert(EntityKind::User.id_field().to_string(), Value::from(user_id));
        payload.insert("Post_IDs".to_string(), Value::from(posts.clone()));

        self.dispatch(
            &flight,
            Command {
                action: RemoteAction::UpdateUserPostSelections,
                payload: Value::Object(payload),
                snapshot: data,
            },
        )
        .await?;

        Ok(posts)
    }
}

/// Id the data store assigned to a created record, if the reply carries one.
fn server_id(reply: &RemoteReply, kind: EntityKind) -> Option<u64> {
    reply
        .data
        .as_ref()
        .and_then(|data| data.get(kind.id_field()))
        .and_then(coerce_id_value)
}

// ============================================================================
// Tests
// ============================================================================
