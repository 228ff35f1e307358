use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::asset::AssetCategory;

#[derive(Debug, thiserror::Error)]
pub enum DecomError {
    #[error("invalid credentials: {detail}")]
    InvalidCredentials { detail: String },

    #[error("mfa code rejected: {detail}")]
    MfaRejected { detail: String },

    #[error("mfa challenge expired, submit credentials again")]
    MfaExpired,

    #[error("account lacks organization admin rights: {detail}")]
    InsufficientPrivilege { detail: String },

    #[error("organization api key limit reached ({detail}); revoke stale keys and retry")]
    KeyLimitExceeded { detail: String },

    #[error("internal session expired: {detail}")]
    SessionExpired { detail: String },

    #[error("ephemeral api key expired at {expired_at}")]
    KeyExpired {
        expired_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("{operation} not valid in state {state}")]
    InvalidState { operation: String, state: String },

    #[error("{category} {id} rejected: {detail}")]
    ClientRejected {
        category: AssetCategory,
        id: String,
        detail: String,
    },

    #[error("transient failure (status={status:?}): {detail}")]
    TransientFailure { status: Option<u16>, detail: String },

    #[error("delete failed after {attempts} attempt(s): {detail}")]
    DeleteFailed { attempts: u32, detail: String },

    #[error("api error: status={status}, body={body}")]
    Api { status: u16, body: String },

    #[error("unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("config parse error in {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DecomError>;

/// Stable, reportable code for each failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidCredentials,
    MfaRejected,
    MfaExpired,
    InsufficientPrivilege,
    KeyLimitExceeded,
    SessionExpired,
    KeyExpired,
    InvalidState,
    ClientRejected,
    TransientFailure,
    DeleteFailed,
    Api,
    Decode,
    Config,
    Io,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl DecomError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DecomError::InvalidCredentials { .. } => ErrorCode::InvalidCredentials,
            DecomError::MfaRejected { .. } => ErrorCode::MfaRejected,
            DecomError::MfaExpired => ErrorCode::MfaExpired,
            DecomError::InsufficientPrivilege { .. } => ErrorCode::InsufficientPrivilege,
            DecomError::KeyLimitExceeded { .. } => ErrorCode::KeyLimitExceeded,
            DecomError::SessionExpired { .. } => ErrorCode::SessionExpired,
            DecomError::KeyExpired { .. } => ErrorCode::KeyExpired,
            DecomError::InvalidState { .. } => ErrorCode::InvalidState,
            DecomError::ClientRejected { .. } => ErrorCode::ClientRejected,
            DecomError::TransientFailure { .. } => ErrorCode::TransientFailure,
            DecomError::DeleteFailed { .. } => ErrorCode::DeleteFailed,
            DecomError::Api { .. } => ErrorCode::Api,
            DecomError::Decode { .. } | DecomError::Json(_) => ErrorCode::Decode,
            DecomError::ConfigParse { .. } | DecomError::InvalidConfig { .. } => ErrorCode::Config,
            DecomError::Io(_) => ErrorCode::Io,
        }
    }

    /// Network timeouts, 5xx and 429 responses.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DecomError::TransientFailure { .. })
    }

    /// Errors after which no further remote action may be started in this run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DecomError::InsufficientPrivilege { .. }
                | DecomError::KeyLimitExceeded { .. }
                | DecomError::SessionExpired { .. }
                | DecomError::KeyExpired { .. }
                | DecomError::InvalidState { .. }
        )
    }

    pub(crate) fn invalid_state(operation: &str, state: impl std::fmt::Display) -> Self {
        DecomError::InvalidState {
            operation: operation.to_string(),
            state: state.to_string(),
        }
    }
}
