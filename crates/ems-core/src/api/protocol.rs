//! Wire protocol of the spreadsheet-backed data store.
//!
//! Reads return the whole snapshot. Writes are a single command envelope
//! `{"action": <verb>, "payload": <record>}` answered by
//! `{"status": "ok"|"error", "message"?, "data"?}`.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use super::ApiError;
use crate::models::EntityKind;

/// Mutation verbs understood by the data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteAction {
    Upsert(EntityKind),
    Delete(EntityKind),
    BatchUpsertBranches,
    UpdateUserPostSelections,
}

impl RemoteAction {
    pub fn verb(&self) -> &'static str {
        match self {
            RemoteAction::Upsert(kind) => match kind {
                EntityKind::User => "upsertUser",
                EntityKind::Department => "upsertDepartment",
                EntityKind::Office => "upsertOffice",
                EntityKind::Bank => "upsertBank",
                EntityKind::Branch => "upsertBranch",
                EntityKind::Post => "upsertPost",
                EntityKind::Payscale => "upsertPayscale",
                EntityKind::Employee => "upsertEmployee",
            },
            RemoteAction::Delete(kind) => match kind {
                EntityKind::User => "deleteUser",
                EntityKind::Department => "deleteDepartment",
                EntityKind::Office => "deleteOffice",
                EntityKind::Bank => "deleteBank",
                EntityKind::Branch => "deleteBranch",
                EntityKind::Post => "deletePost",
                EntityKind::Payscale => "deletePayscale",
                EntityKind::Employee => "deleteEmployee",
            },
            RemoteAction::BatchUpsertBranches => "batchUpsertBranches",
            RemoteAction::UpdateUserPostSelections => "updateUserPostSelections",
        }
    }
}

impl std::fmt::Display for RemoteAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.verb())
    }
}

impl Serialize for RemoteAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.verb())
    }
}

/// Body of a write request.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteCommand {
    pub action: RemoteAction,
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    #[serde(alias = "success")]
    Ok,
    Error,
}

/// Reply to a write request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteReply {
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Entity-shaped data, e.g. carrying a server-assigned id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RemoteReply {
    pub fn ok() -> Self {
        Self {
            status: ReplyStatus::Ok,
            message: None,
            data: None,
        }
    }

    pub fn ok_with(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::ok()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Turn an `error` status into `ApiError::Rejected`.
    pub fn into_result(self) -> Result<Self, ApiError> {
        match self.status {
            ReplyStatus::Ok => Ok(self),
            ReplyStatus::Error => Err(ApiError::Rejected(
                self.message
                    .unwrap_or_else(|| "no message from data store".to_string()),
            )),
        }
    }
}

/// The remote system of record.
///
/// Implementations must not retry on their own: the sync cache treats every
/// failed write as final and reconciles by reloading.
pub trait RemoteStore: Send + Sync {
    /// Fetch the full raw snapshot. Sanitization happens in the caller.
    fn fetch_snapshot(&self) -> impl Future<Output = Result<Value, ApiError>> + Send;

    fn send_command(
        &self,
        command: &RemoteCommand,
    ) -> impl Future<Output = Result<RemoteReply, ApiError>> + Send;
}

impl<T: RemoteStore> RemoteStore for Arc<T> {
    fn fetch_snapshot(&self) -> impl Future<Output = Result<Value, ApiError>> + Send {
        (**self).fetch_snapshot()
    }

    fn send_command(
        &self,
        command: &RemoteCommand,
    ) -> impl Future<Output = Result<RemoteReply, ApiError>> + Send {
        (**self).send_command(command)
    }
}
