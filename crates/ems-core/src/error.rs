//! Error types surfaced by the sync cache.

use thiserror::Error;

use crate::api::ApiError;
use crate::models::EntityKind;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Request to the data store timed out")]
    NetworkTimeout,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Data store rejected the request: {0}")]
    RemoteRejected(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Cannot delete {kind} #{id}: still referenced by {count} {dependent} record(s)")]
    ReferentialIntegrityViolation {
        kind: EntityKind,
        id: u64,
        dependent: EntityKind,
        count: usize,
    },

    #[error("Another change is still syncing - try again once it finishes")]
    ConcurrentMutationInProgress,

    #[error("{kind} #{id} does not exist")]
    NotFound { kind: EntityKind, id: u64 },

    #[error("Invalid {kind} record: {message}")]
    InvalidRecord { kind: EntityKind, message: String },

    #[error("Failed to encode payload: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Never returned from the mutation path; logged and swallowed.
    #[error("Local persistence failed: {0}")]
    LocalPersistenceFailure(String),
}

impl SyncError {
    /// Failures caused by the network or the remote store, as opposed to
    /// requests rejected locally before anything was sent.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SyncError::NetworkTimeout
                | SyncError::NetworkError(_)
                | SyncError::RemoteRejected(_)
                | SyncError::MalformedResponse(_)
        )
    }
}

impl From<ApiError> for SyncError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Timeout => SyncError::NetworkTimeout,
            ApiError::Rejected(message) => SyncError::RemoteRejected(message),
            ApiError::InvalidResponse(message) => SyncError::MalformedResponse(message),
            other => SyncError::NetworkError(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Failed to store session: {0}")]
    Storage(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_message_names_target_and_count() {
        let error = SyncError::ReferentialIntegrityViolation {
            kind: EntityKind::Bank,
            id: 1,
            dependent: EntityKind::Branch,
            count: 1,
        };
        assert_eq!(
            error.to_string(),
            "Cannot delete Bank #1: still referenced by 1 Branch record(s)"
        );
        assert!(!error.is_remote());
    }

    #[test]
    fn test_api_error_mapping() {
        assert!(matches!(
            SyncError::from(ApiError::Timeout),
            SyncError::NetworkTimeout
        ));
        assert!(matches!(
            SyncError::from(ApiError::Rejected("sheet locked".to_string())),
            SyncError::RemoteRejected(m) if m == "sheet locked"
        ));
        assert!(matches!(
            SyncError::from(ApiError::InvalidResponse("not json".to_string())),
            SyncError::MalformedResponse(_)
        ));
        let server = SyncError::from(ApiError::ServerError("boom".to_string()));
        assert!(matches!(server, SyncError::NetworkError(_)));
        assert!(server.is_remote());
    }
}
