//! Entry points for a presentation layer (console, GUI or automation).
//!
//! The orchestrator owns the session and both clients. A caller drives it
//! step by step: authenticate (suspending at `MFA_REQUIRED` when a second
//! factor is needed), authorize, scan, plan, then decommission.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::client::{ExternalClient, InternalClient, LoginOutcome, Router};
use crate::config::RunConfig;
use crate::decommission::{self, DecommissionReport, DeletionPlan, ProgressSink, Selection, StopHandle};
use crate::error::{DecomError, Result};
use crate::inventory::{self, Inventory, SCAN_ORDER};
use crate::session::{AuthState, Credentials, SessionContext};

pub struct Orchestrator {
    config: Arc<RunConfig>,
    session: SessionContext,
    internal: InternalClient,
    external: ExternalClient,
    inventory: Option<Inventory>,
}

impl Orchestrator {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        Ok(Self {
            session: SessionContext::from_config(&config),
            internal: InternalClient::new(Arc::clone(&config))?,
            external: ExternalClient::new(Arc::clone(&config))?,
            inventory: None,
            config,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Submit credentials. A previous failed attempt is cleared first.
    pub async fn begin_authentication(&mut self, credentials: Credentials) -> Result<LoginOutcome> {
        if self.session.state() == AuthState::AuthFailed {
            self.session.reset();
        }
        self.internal
            .submit_credentials(&mut self.session, credentials)
            .await
    }

    pub async fn submit_mfa_code(&mut self, code: &str) -> Result<()> {
        self.internal.submit_mfa_code(&mut self.session, code).await
    }

    /// Escalate privileges (once), issue the ephemeral key and exchange it
    /// for a public API token. Returns the key expiry.
    pub async fn authorize(&mut self) -> Result<DateTime<Utc>> {
        if !self.session.is_elevated() {
            self.internal.escalate_privilege(&mut self.session).await?;
        }
        let expires_at = self.internal.issue_ephemeral_key(&mut self.session).await?;
        self.external
            .ensure_token(&mut self.session, "exchange api token")
            .await?;
        info!(%expires_at, "run authorized");
        Ok(expires_at)
    }

    /// Replace an expired or expiring key without logging in again.
    pub async fn reissue_key(&mut self) -> Result<DateTime<Utc>> {
        self.session.discard_key();
        self.authorize().await
    }

    /// List every category and build the deduplicated inventory.
    pub async fn scan_inventory(&mut self) -> Result<&Inventory> {
        self.session.require_live_key("scan inventory", Utc::now())?;
        let mut router = Router::new(&self.internal, &self.external, &mut self.session);
        let scanned = inventory::scan(&mut router, &SCAN_ORDER, &self.config.catalog).await?;
        Ok(&*self.inventory.insert(scanned))
    }

    /// The most recent scan, if any.
    pub fn inventory(&self) -> Option<&Inventory> {
        self.inventory.as_ref()
    }

    pub fn plan(&self, selection: &Selection) -> Result<DeletionPlan> {
        match &self.inventory {
            Some(inventory) => Ok(DeletionPlan::build(inventory, selection)),
            None => Err(DecomError::invalid_state("plan deletion", "no inventory scanned")),
        }
    }

    /// Execute a caller-confirmed plan. Fails before any deletion when the
    /// key is missing or expired.
    pub async fn decommission(
        &mut self,
        plan: &DeletionPlan,
        progress: &mut dyn ProgressSink,
        stop: &StopHandle,
    ) -> Result<DecommissionReport> {
        self.session.require_live_key("decommission", Utc::now())?;
        let mut router = Router::new(&self.internal, &self.external, &mut self.session);
        let report = decommission::execute(plan, &mut router, progress, stop).await;
        info!(
            attempted = report.attempted(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            not_attempted = report.not_attempted(),
            "decommission finished"
        );
        Ok(report)
    }

    /// End of run: forget the ephemeral key and log out of the internal
    /// surface. The session is blank afterwards.
    pub async fn finish(&mut self) {
        self.session.discard_key();
        self.internal.logout(&mut self.session).await;
    }
}
