use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::{DecomError, Result};
use crate::session::{
    ApiToken, AuthState, Credentials, EphemeralKey, MfaChallenge, SecureString, SessionContext,
    SessionTokens,
};

impl SessionContext {
    /// An empty, unauthenticated context for one organization.
    pub fn new(
        org_short_name: impl Into<String>,
        shard: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            org_short_name: org_short_name.into(),
            shard: shard.into(),
            region: region.into(),
            state: AuthState::Unauthenticated,
            elevated: false,
            tokens: None,
            challenge: None,
            key: None,
            operator_email: None,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(&config.org_short_name, &config.shard, &config.region)
    }

    pub fn org_short_name(&self) -> &str {
        &self.org_short_name
    }

    pub fn shard(&self) -> &str {
        &self.shard
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Logged in (with or without a key).
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated | AuthState::KeyIssued)
    }

    pub fn is_elevated(&self) -> bool {
        self.elevated
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.organization_id.as_str())
    }

    /// The operator's own user id; the run never deletes this user.
    pub fn user_id(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.user_id.as_str())
    }

    pub fn operator_email(&self) -> Option<&str> {
        self.operator_email.as_deref()
    }

    pub fn challenge(&self) -> Option<&MfaChallenge> {
        self.challenge.as_ref()
    }

    pub fn key(&self) -> Option<&EphemeralKey> {
        self.key.as_ref()
    }

    pub(crate) fn tokens(&self) -> Option<&SessionTokens> {
        self.tokens.as_ref()
    }

    /// Fail with `InvalidState` unless the current state is one of `allowed`.
    pub(crate) fn require(&self, operation: &str, allowed: &[AuthState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(DecomError::invalid_state(operation, self.state))
        }
    }

    /// Session material for an internal call; only after authentication completes.
    pub(crate) fn require_internal(&self, operation: &str) -> Result<&SessionTokens> {
        match (&self.tokens, self.is_authenticated()) {
            (Some(tokens), true) => Ok(tokens),
            _ => Err(DecomError::invalid_state(operation, self.state)),
        }
    }

    /// The ephemeral key, provided it exists and has not expired at `now`.
    pub fn require_live_key(&self, operation: &str, now: DateTime<Utc>) -> Result<&EphemeralKey> {
        let key = match (&self.key, self.state) {
            (Some(key), AuthState::KeyIssued) => key,
            _ => return Err(DecomError::invalid_state(operation, self.state)),
        };
        if key.is_expired_at(now) {
            return Err(DecomError::KeyExpired {
                expired_at: key.expires_at,
            });
        }
        Ok(key)
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    pub(crate) fn begin_credentials(&mut self, email: &str) -> Result<()> {
        self.require("submit credentials", &[AuthState::Unauthenticated])?;
        self.state = AuthState::CredentialsSubmitted;
        self.operator_email = Some(email.to_string());
        Ok(())
    }

    pub(crate) fn challenge_issued(
        &mut self,
        credentials: Credentials,
        sms_contact: Option<String>,
        ttl: chrono::Duration,
    ) {
        let issued_at = Utc::now();
        self.challenge = Some(MfaChallenge {
            credentials,
            sms_contact,
            issued_at,
            expires_at: issued_at + ttl,
        });
        self.state = AuthState::MfaRequired;
        info!(org = %self.org_short_name, "second factor required");
    }

    /// Take the pending challenge for an MFA submission, expiring it if stale.
    pub(crate) fn pending_challenge(&mut self, now: DateTime<Utc>) -> Result<MfaChallenge> {
        self.require("submit mfa code", &[AuthState::MfaRequired])?;
        let challenge = match &self.challenge {
            Some(c) => c.clone(),
            None => return Err(DecomError::invalid_state("submit mfa code", self.state)),
        };
        if now >= challenge.expires_at {
            self.mfa_expired();
            return Err(DecomError::MfaExpired);
        }
        Ok(challenge)
    }

    pub(crate) fn mfa_verified(&mut self) {
        self.state = AuthState::MfaVerified;
        self.challenge = None;
    }

    /// The challenge can no longer be answered; credentials must be resubmitted.
    pub(crate) fn mfa_expired(&mut self) {
        self.challenge = None;
        self.state = AuthState::Unauthenticated;
    }

    pub(crate) fn authenticated(&mut self, tokens: SessionTokens) {
        debug!(organization_id = %tokens.organization_id, user_id = %tokens.user_id, "session established");
        self.tokens = Some(tokens);
        self.challenge = None;
        self.state = AuthState::Authenticated;
    }

    pub(crate) fn mark_elevated(&mut self) {
        self.elevated = true;
    }

    pub(crate) fn key_issued(&mut self, key: EphemeralKey) {
        info!(expires_at = %key.expires_at, "ephemeral api key issued");
        self.key = Some(key);
        self.state = AuthState::KeyIssued;
    }

    pub(crate) fn store_api_token(&mut self, token: SecureString, expires_at: DateTime<Utc>) {
        if let Some(key) = self.key.as_mut() {
            key.api_token = Some(ApiToken {
                token,
                expires_at: expires_at.min(key.expires_at),
            });
        }
    }

    /// Terminal failure for this authentication attempt.
    pub(crate) fn fail(&mut self) {
        self.state = AuthState::AuthFailed;
        self.challenge = None;
    }

    /// The server no longer honours our session; everything must be redone.
    pub(crate) fn expire_session(&mut self, reason: &str) {
        warn!(reason, "internal session expired");
        self.tokens = None;
        self.key = None;
        self.challenge = None;
        self.elevated = false;
        self.state = AuthState::Unauthenticated;
    }

    /// Apply CSRF rotation observed on an internal response.
    pub(crate) fn rotate_csrf(&mut self, csrf: &str) {
        if let Some(tokens) = self.tokens.as_mut() {
            if tokens.csrf() != csrf {
                debug!("csrf token rotated");
                tokens.csrf_token = SecureString::from(csrf);
            }
        }
    }

    /// Apply a refreshed session cookie observed on an internal response.
    pub(crate) fn refresh_user_token(&mut self, user_token: &str) {
        if let Some(tokens) = self.tokens.as_mut() {
            tokens.user_token = SecureString::from(user_token);
        }
    }

    /// Forget the ephemeral key. The session stays authenticated.
    pub fn discard_key(&mut self) {
        if self.key.take().is_some() {
            info!("ephemeral api key discarded");
        }
        if self.state == AuthState::KeyIssued {
            self.state = AuthState::Authenticated;
        }
    }

    /// Return to a blank context so a fresh login can start.
    pub fn reset(&mut self) {
        *self = Self::new(
            std::mem::take(&mut self.org_short_name),
            std::mem::take(&mut self.shard),
            std::mem::take(&mut self.region),
        );
    }
}
