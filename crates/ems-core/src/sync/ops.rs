//! Pure snapshot transforms behind each mutation.
//!
//! These never touch the network or the local cache; `SyncCache` builds the
//! optimistic snapshot with them and then hands it to the dispatcher.

use chrono::{DateTime, Utc};

use crate::ids::IdGenerator;
use crate::models::{AppData, Entity, EntityKind};

/// Whether an upsert inserted a new record or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Insert or replace `record` in its collection, stamping timestamps.
///
/// An id of 0 or one not present in the collection is a create and receives
/// a fresh id. Updates keep the stored `Created_At`.
pub fn apply_upsert<E: Entity>(
    data: &mut AppData,
    mut record: E,
    ids: &IdGenerator,
    now: DateTime<Utc>,
) -> (E, UpsertOutcome) {
    let existing = (record.id() != 0)
        .then(|| E::collection(data).iter().position(|r| r.id() == record.id()))
        .flatten();

    match existing {
        Some(index) => {
            let collection = E::collection_mut(data);
            let created_at = collection[index].stamps().created_at.or(Some(now));
            let stamps = record.stamps_mut();
            stamps.created_at = created_at;
            stamps.updated_at = Some(now);
            collection[index] = record.clone();
            (record, UpsertOutcome::Updated)
        }
        None => {
            let id = ids.next(|candidate| data.contains::<E>(candidate));
            record.set_id(id);
            let stamps = record.stamps_mut();
            stamps.created_at = Some(now);
            stamps.updated_at = Some(now);
            E::collection_mut(data).push(record.clone());
            (record, UpsertOutcome::Created)
        }
    }
}

/// Swap a locally assigned id for the one the data store chose.
pub fn adopt_id<E: Entity>(data: &mut AppData, local_id: u64, remote_id: u64) -> bool {
    if local_id == remote_id || data.contains::<E>(remote_id) {
        return false;
    }
    match E::collection_mut(data).iter_mut().find(|r| r.id() == local_id) {
        Some(record) => {
            record.set_id(remote_id);
            true
        }
        None => false,
    }
}

/// Remove a record and any selections that hang off it. Returns the removed
/// record, or `None` when the id is unknown.
pub fn apply_delete<E: Entity>(data: &mut AppData, id: u64) -> Option<E> {
    let collection = E::collection_mut(data);
    let index = collection.iter().position(|r| r.id() == id)?;
    let removed = collection.remove(index);

    match E::KIND {
        EntityKind::User => {
            data.user_post_selections.remove(&id);
        }
        EntityKind::Post => {
            data.user_post_selections.retain(|_, posts| {
                posts.retain(|post_id| *post_id != id);
                !posts.is_empty()
            });
        }
        _ => {}
    }

    Some(removed)
}

/// Flip membership of `post_id` in the user's selection list and return the
/// resulting list. An emptied list drops the user's entry.
pub fn toggle_selection(data: &mut AppData, user_id: u64, post_id: u64) -> Vec<u64> {
    let mut posts = data
        .user_post_selections
        .remove(&user_id)
        .unwrap_or_default();

    match posts.iter().position(|p| *p == post_id) {
        Some(index) => {
            posts.remove(index);
        }
        None => posts.push(post_id),
    }

    if !posts.is_empty() {
        data.user_post_selections.insert(user_id, posts.clone());
    }
    posts
}
