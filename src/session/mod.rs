pub mod context;
pub mod credentials;

pub use credentials::{Credentials, SecureString, SessionTokens};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authentication handshake states.
///
/// `AuthFailed` is terminal for the attempt; the caller must `reset()` before
/// submitting credentials again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthState {
    Unauthenticated,
    CredentialsSubmitted,
    MfaRequired,
    MfaVerified,
    Authenticated,
    KeyIssued,
    AuthFailed,
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuthState::Unauthenticated => "UNAUTHENTICATED",
            AuthState::CredentialsSubmitted => "CREDENTIALS_SUBMITTED",
            AuthState::MfaRequired => "MFA_REQUIRED",
            AuthState::MfaVerified => "MFA_VERIFIED",
            AuthState::Authenticated => "AUTHENTICATED",
            AuthState::KeyIssued => "KEY_ISSUED",
            AuthState::AuthFailed => "AUTH_FAILED",
        };
        f.write_str(name)
    }
}

/// A pending second-factor challenge. The submitted credentials are replayed
/// together with the code.
#[derive(Debug, Clone)]
pub struct MfaChallenge {
    pub(crate) credentials: Credentials,
    /// Masked phone number the code was sent to, when the server says so.
    pub sms_contact: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A time-boxed public-API key minted for this run.
#[derive(Debug, Clone)]
pub struct EphemeralKey {
    pub(crate) api_key: SecureString,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub(crate) api_token: Option<ApiToken>,
}

/// Short-lived bearer token exchanged from the ephemeral key.
#[derive(Debug, Clone)]
pub(crate) struct ApiToken {
    pub(crate) token: SecureString,
    pub(crate) expires_at: DateTime<Utc>,
}

impl EphemeralKey {
    pub fn new(api_key: impl Into<SecureString>, issued_at: DateTime<Utc>, lifetime: chrono::Duration) -> Self {
        Self {
            api_key: api_key.into(),
            issued_at,
            expires_at: issued_at + lifetime,
            api_token: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.expires_at - now).max(chrono::Duration::zero())
    }

    /// The exchanged token if it is still usable at `now`.
    pub(crate) fn live_token(&self, now: DateTime<Utc>) -> Option<&str> {
        self.api_token
            .as_ref()
            .filter(|t| now < t.expires_at)
            .map(|t| t.token.expose_secret())
    }
}

/// Mutable authentication/authorization state shared by both clients.
///
/// Owned by the caller and lent to each client call; fields change only
/// through the transition methods in `context.rs`.
#[derive(Debug, Clone)]
pub struct SessionContext {
    org_short_name: String,
    shard: String,
    region: String,
    state: AuthState,
    elevated: bool,
    tokens: Option<SessionTokens>,
    challenge: Option<MfaChallenge>,
    key: Option<EphemeralKey>,
    operator_email: Option<String>,
}
