//! Key-authenticated client for the public API.
//!
//! Every call first checks the ephemeral key in the session; an expired key
//! fails with `KeyExpired` before any request is built. The bearer token
//! exchanged from the key is cached in the session and refreshed on demand.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::asset::{Asset, AssetCategory, Visitor};
use crate::client::{build_http, delete_error, send, ApiResponse};
use crate::config::RunConfig;
use crate::error::{DecomError, Result};
use crate::inventory::records::{self, text};
use crate::session::{SecureString, SessionContext};

/// The camera listing answers 400 with this text when the org has no cameras.
const NO_CAMERAS_SIGNATURE: &str = "must include cameras";

const VISITS_PAGE_SIZE: u32 = 100;

pub struct ExternalClient {
    http: reqwest::Client,
    config: Arc<RunConfig>,
}

impl ExternalClient {
    pub fn new(config: Arc<RunConfig>) -> Result<Self> {
        Ok(Self {
            http: build_http(&config)?,
            config,
        })
    }

    /// A usable bearer token plus the key expiry that bounds any retry.
    pub(crate) async fn ensure_token(
        &self,
        session: &mut SessionContext,
        operation: &str,
    ) -> Result<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let key = session.require_live_key(operation, now)?;
        let deadline = key.expires_at;
        if let Some(token) = key.live_token(now) {
            return Ok((token.to_string(), deadline));
        }

        let api_key = key.api_key.expose_secret().to_string();
        let url = self.config.external_url("token");
        let policy = &self.config.retry;
        let http = &self.http;
        let url_ref = url.as_str();
        let api_key_ref = api_key.as_str();

        let response = policy
            .execute("exchange api token", Some(deadline), move || {
                let request = http
                    .post(url_ref)
                    .header("accept", "application/json")
                    .header("x-api-key", api_key_ref);
                async move { send(request, "token").await?.retry_gate(policy) }
            })
            .await?
            .into_result(policy)?;

        let body: Value = response.json()?;
        let token = text(&body, &["token"]).ok_or_else(|| DecomError::Decode {
            endpoint: response.endpoint.clone(),
            reason: "response has no `token`".into(),
        })?;
        let expires_at = now + chrono::Duration::seconds(self.config.token_lifetime_secs as i64);
        session.store_api_token(SecureString::from(token.as_str()), expires_at);
        debug!("public api token refreshed");
        Ok((token, deadline))
    }

    /// One authenticated request with retry. Non-retryable statuses are
    /// returned for the caller to classify.
    async fn request(
        &self,
        method: Method,
        path: &str,
        token: &str,
        query: &[(&str, String)],
        deadline: DateTime<Utc>,
    ) -> Result<ApiResponse> {
        let url = self.config.external_url(path);
        let policy = &self.config.retry;
        let http = &self.http;
        let url = url.as_str();

        policy
            .execute(path, Some(deadline), move || {
                let request = http
                    .request(method.clone(), url)
                    .header("accept", "application/json")
                    .header("x-verkada-auth", token)
                    .query(query);
                async move { send(request, path).await?.retry_gate(policy) }
            })
            .await
    }

    /// List a publicly-listed category, following `next_page_token`.
    ///
    /// The user listing never includes the operator running the session.
    /// A page token seen before ends the walk.
    pub async fn list(&self, session: &mut SessionContext, category: AssetCategory) -> Result<Vec<Asset>> {
        let path = match category {
            AssetCategory::Camera => "cameras/v1/devices",
            AssetCategory::GuestSite => "guest/v1/sites",
            AssetCategory::User => "access/v1/access_users",
            other => {
                return Err(DecomError::InvalidConfig {
                    reason: format!("{other} is not listed on the public api"),
                })
            }
        };
        let policy = &self.config.retry;

        let mut assets = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen = HashSet::new();
        loop {
            let (token, deadline) = self.ensure_token(session, "list inventory").await?;
            let mut query = vec![("page_size", self.config.page_size.to_string())];
            if let Some(page) = &page_token {
                query.push(("page_token", page.clone()));
            }

            let response = self
                .request(Method::GET, path, &token, &query, deadline)
                .await?;
            if category == AssetCategory::Camera
                && response.status == 400
                && response.body.contains(NO_CAMERAS_SIGNATURE)
            {
                info!("organization has no cameras");
                return Ok(Vec::new());
            }
            let response = response.into_result(policy)?;
            let body: Value = response.json()?;
            assets.extend(records::normalize_collection(category, &body, path)?);

            let Some(next) = text(&body, &["next_page_token"]) else {
                break;
            };
            if !seen.insert(next.clone()) {
                warn!(category = %category, page_token = %next, "page token repeated, stopping pagination");
                break;
            }
            page_token = Some(next);
        }

        if category == AssetCategory::User {
            assets = exclude_operator(assets, session.user_id(), session.operator_email());
        }
        debug!(category = %category, count = assets.len(), "public listing");
        Ok(assets)
    }

    /// Visitors recorded at a guest site in `[start, end)` (UNIX seconds).
    pub async fn list_guest_visits(
        &self,
        session: &mut SessionContext,
        site_id: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Visitor>> {
        let (token, deadline) = self.ensure_token(session, "list guest visits").await?;
        let query = [
            ("site_id", site_id.to_string()),
            ("start_time", start.to_string()),
            ("end_time", end.to_string()),
            ("page_size", VISITS_PAGE_SIZE.to_string()),
        ];
        let response = self
            .request(Method::GET, "guest/v1/visits", &token, &query, deadline)
            .await?
            .into_result(&self.config.retry)?;
        let body: Value = response.json()?;

        let visitors = body
            .get("visits")
            .and_then(Value::as_array)
            .map(|visits| {
                visits
                    .iter()
                    .map(|visit| {
                        let name = text(visit, &["guest", "full_name"]).unwrap_or_default();
                        Visitor::from_full_name(&name, text(visit, &["guest", "email"]))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(visitors)
    }

    /// Delete one asset through the public API. Only users are deleted here.
    pub async fn delete(&self, session: &mut SessionContext, asset: &Asset) -> Result<()> {
        match asset.category {
            AssetCategory::User => self.delete_user(session, &asset.id).await,
            other => Err(DecomError::InvalidConfig {
                reason: format!("{} are not deleted through the public api", other.label()),
            }),
        }
    }

    pub async fn delete_user(&self, session: &mut SessionContext, user_id: &str) -> Result<()> {
        let (token, deadline) = self.ensure_token(session, "delete user").await?;
        let policy = &self.config.retry;
        let query = [("user_id", user_id.to_string())];
        self.request(Method::DELETE, "core/v1/user", &token, &query, deadline)
            .await
            .and_then(|response| response.into_result(policy))
            .map_err(|e| delete_error(e, AssetCategory::User, user_id, policy))?;
        info!(category = %AssetCategory::User, asset_id = %user_id, "deleted");
        Ok(())
    }
}

/// `[start, end)` UNIX seconds covering one UTC calendar day.
pub fn day_range(day: NaiveDate) -> (i64, i64) {
    let start = day.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
    (start, start + 24 * 60 * 60)
}

fn exclude_operator(users: Vec<Asset>, user_id: Option<&str>, email: Option<&str>) -> Vec<Asset> {
    let email = email.map(|e| e.trim().to_ascii_lowercase());
    let before = users.len();
    let kept: Vec<Asset> = users
        .into_iter()
        .filter(|u| Some(u.id.trim()) != user_id.map(str::trim))
        .filter(|u| match (&email, &u.email) {
            (Some(operator), Some(candidate)) => candidate.trim().to_ascii_lowercase() != *operator,
            _ => true,
        })
        .collect();
    if kept.len() < before {
        info!("operator account left out of the user listing");
    }
    kept
}
