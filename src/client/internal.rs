//! Browser-emulating client for the cookie/CSRF-authenticated surface.
//!
//! Drives the login handshake, privilege escalation and ephemeral key
//! issuance, lists the categories only visible internally and performs the
//! internal deletes. Every call goes through [`SessionContext`] guards first,
//! so an out-of-order call fails with `InvalidState` before touching the
//! network.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, SET_COOKIE};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::asset::{Asset, AssetCategory};
use crate::client::{build_http, delete_error, send, ApiResponse};
use crate::config::RunConfig;
use crate::error::{DecomError, Result};
use crate::inventory::records::{self, text};
use crate::session::{AuthState, Credentials, EphemeralKey, SessionContext, SessionTokens};

/// Roles granted to the ephemeral key.
const KEY_ROLES: [&str; 7] = [
    "PUBLIC_API_CAMERA_READ_WRITE",
    "PUBLIC_API_SENSORS_READ_WRITE",
    "PUBLIC_API_ACCESS_READ_WRITE",
    "PUBLIC_API_ALARMS_READ_WRITE",
    "PUBLIC_API_CORE_READ_WRITE",
    "PUBLIC_API_WORKPLACE_READ_WRITE",
    "PUBLIC_API_INTERCOM_READ_WRITE",
];

const ESCALATED_ROLES: [&str; 2] = ["ACCESS_CONTROL_SYSTEM_ADMIN", "ACCESS_CONTROL_USER_ADMIN"];

const MFA_MARKERS: [&str; 2] = ["mfa_required_for_org_admin", "2FA invalid"];

const MIN_MFA_CODE_LEN: usize = 6;

/// Result of submitting credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated,
    /// The caller must collect a code and call `submit_mfa_code`.
    MfaRequired { sms_contact: Option<String> },
}

/// One internal request.
struct Call {
    operation: &'static str,
    method: Method,
    service: &'static str,
    path: String,
    body: Option<Value>,
    /// 403 means "not an admin" rather than "session gone".
    privileged: bool,
    /// No backoff may end past this instant.
    deadline: Option<DateTime<Utc>>,
}

impl Call {
    fn get(operation: &'static str, service: &'static str, path: impl Into<String>) -> Self {
        Self {
            operation,
            method: Method::GET,
            service,
            path: path.into(),
            body: None,
            privileged: false,
            deadline: None,
        }
    }

    fn post(
        operation: &'static str,
        service: &'static str,
        path: impl Into<String>,
        body: Value,
    ) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::get(operation, service, path)
        }
    }

    fn delete(operation: &'static str, service: &'static str, path: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            ..Self::get(operation, service, path)
        }
    }

    fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    fn until(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

pub struct InternalClient {
    http: reqwest::Client,
    config: Arc<RunConfig>,
}

impl InternalClient {
    pub fn new(config: Arc<RunConfig>) -> Result<Self> {
        Ok(Self {
            http: build_http(&config)?,
            config,
        })
    }

    // -----------------------------------------------------------------------
    // Authentication
    // -----------------------------------------------------------------------

    /// Post the operator's credentials. Either completes the login or leaves
    /// the session suspended in `MFA_REQUIRED`.
    pub async fn submit_credentials(
        &self,
        session: &mut SessionContext,
        credentials: Credentials,
    ) -> Result<LoginOutcome> {
        session.begin_credentials(&credentials.email)?;
        info!(email = %credentials.email, org = %session.org_short_name(), "submitting credentials");

        let url = self.config.internal_url("vprovision", "user/login");
        let payload = self.login_payload(&credentials, None);
        let response = match send(self.http.post(&url).json(&payload), "user/login").await {
            Ok(response) => response,
            Err(e) => {
                session.reset();
                return Err(e);
            }
        };

        if response.status == 200 {
            let body = response.json::<Value>().unwrap_or(Value::Null);
            if body.get("loggedIn").and_then(Value::as_bool) == Some(true) {
                let tokens = match parse_login(&body, &response.endpoint) {
                    Ok(tokens) => tokens,
                    Err(e) => {
                        session.fail();
                        return Err(e);
                    }
                };
                session.authenticated(tokens);
                info!("logged in without a second factor");
                return Ok(LoginOutcome::Authenticated);
            }
        }

        let message = response.message();
        if response.status == 400 && MFA_MARKERS.iter().any(|m| message.contains(m)) {
            let sms_contact = serde_json::from_str::<Value>(&response.body)
                .ok()
                .and_then(|body| text(&body, &["data", "smsSent"]));
            if let Some(contact) = &sms_contact {
                info!(contact = %contact, "verification code sent by sms");
            }
            let ttl = chrono::Duration::seconds(self.config.mfa_challenge_ttl_secs as i64);
            session.challenge_issued(credentials, sms_contact.clone(), ttl);
            return Ok(LoginOutcome::MfaRequired { sms_contact });
        }

        if self.config.retry.is_retryable_status(response.status) {
            session.reset();
            return Err(DecomError::TransientFailure {
                status: Some(response.status),
                detail: format!("user/login: {message}"),
            });
        }

        warn!(status = response.status, "login rejected");
        session.fail();
        Err(DecomError::InvalidCredentials { detail: message })
    }

    /// Answer the pending second-factor challenge.
    ///
    /// A rejected code leaves the challenge open for another try; an expired
    /// challenge sends the session back to `UNAUTHENTICATED`.
    pub async fn submit_mfa_code(&self, session: &mut SessionContext, code: &str) -> Result<()> {
        let challenge = session.pending_challenge(Utc::now())?;
        let code = code.trim();
        if code.len() < MIN_MFA_CODE_LEN || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(DecomError::MfaRejected {
                detail: format!("code must be at least {MIN_MFA_CODE_LEN} digits"),
            });
        }

        let url = self.config.internal_url("vprovision", "user/login");
        let payload = self.login_payload(&challenge.credentials, Some(code));
        let response = send(self.http.post(&url).json(&payload), "user/login").await?;

        if response.status == 200 {
            let tokens = response
                .json::<Value>()
                .and_then(|body| parse_login(&body, &response.endpoint));
            return match tokens {
                Ok(tokens) => {
                    session.mfa_verified();
                    session.authenticated(tokens);
                    info!("second factor accepted");
                    Ok(())
                }
                Err(e) => {
                    session.fail();
                    Err(e)
                }
            };
        }

        let message = response.message();
        if message.to_ascii_lowercase().contains("expired") {
            session.mfa_expired();
            return Err(DecomError::MfaExpired);
        }
        if self.config.retry.is_retryable_status(response.status) {
            return Err(DecomError::TransientFailure {
                status: Some(response.status),
                detail: format!("user/login: {message}"),
            });
        }
        if response.status == 400 {
            warn!("verification code rejected");
            return Err(DecomError::MfaRejected { detail: message });
        }

        session.fail();
        Err(DecomError::InvalidCredentials { detail: message })
    }

    /// Grant the operator the access-control admin roles and enable global
    /// site admin for the organization.
    pub async fn escalate_privilege(&self, session: &mut SessionContext) -> Result<()> {
        session.require("escalate privilege", &[AuthState::Authenticated])?;
        let (org_id, user_id) = {
            let tokens = session.require_internal("escalate privilege")?;
            (tokens.organization_id.clone(), tokens.user_id.clone())
        };

        let grants: Vec<Value> = ESCALATED_ROLES
            .iter()
            .map(|role| {
                json!({
                    "entityId": org_id,
                    "granteeId": user_id,
                    "roleKey": role,
                    "role": role,
                })
            })
            .collect();
        self.call(
            session,
            Call::post(
                "grant access admin roles",
                "vcerberus",
                "access/v2/user/roles/modify",
                json!({ "grants": grants }),
            )
            .privileged(),
        )
        .await?;

        self.call(
            session,
            Call::post(
                "enable global site admin",
                "vprovision",
                "org/settings/update",
                json!({ "organizationId": org_id, "settings": { "globalSiteAdmin": true } }),
            )
            .privileged(),
        )
        .await?;

        session.mark_elevated();
        info!("operator privileges escalated");
        Ok(())
    }

    /// Mint a time-boxed public API key and store it in the session.
    /// Returns the key's expiry.
    pub async fn issue_ephemeral_key(&self, session: &mut SessionContext) -> Result<DateTime<Utc>> {
        const OPERATION: &str = "issue ephemeral key";
        session.require(OPERATION, &[AuthState::Authenticated, AuthState::KeyIssued])?;
        if !session.is_elevated() {
            return Err(DecomError::invalid_state(
                OPERATION,
                format!("{} (privileges not escalated)", session.state()),
            ));
        }
        let org_id = match session.organization_id() {
            Some(id) => id.to_string(),
            None => return Err(DecomError::invalid_state(OPERATION, session.state())),
        };

        let issued_at = Utc::now();
        let lifetime = chrono::Duration::seconds(self.config.key_lifetime_secs as i64);
        let payload = json!({
            "api_key_name": format!("Decommissioning API Key - {}", issued_at.format("%Y-%m-%d %H:%M:%S")),
            "expires_at": (issued_at + lifetime).timestamp(),
            "roles": KEY_ROLES,
        });

        let response = self
            .call(
                session,
                Call::post(
                    OPERATION,
                    "apiadmin",
                    format!("admin/orgs/{org_id}/v2/granular_apikeys"),
                    payload,
                ),
            )
            .await
            .map_err(|e| match e {
                DecomError::Api { status: 400, body }
                    if body.to_ascii_lowercase().contains("api keys limit") =>
                {
                    DecomError::KeyLimitExceeded { detail: body }
                }
                other => other,
            })?;

        let body: Value = response.json()?;
        let api_key = text(&body, &["apiKey"]).ok_or_else(|| DecomError::Decode {
            endpoint: response.endpoint.clone(),
            reason: "response has no `apiKey`".into(),
        })?;

        let key = EphemeralKey::new(api_key, issued_at, lifetime);
        let expires_at = key.expires_at;
        session.key_issued(key);
        Ok(expires_at)
    }

    // -----------------------------------------------------------------------
    // Inventory and deletes
    // -----------------------------------------------------------------------

    /// List one internally-observable category.
    pub async fn list(&self, session: &mut SessionContext, category: AssetCategory) -> Result<Vec<Asset>> {
        let org_id = session
            .require_internal("list inventory")?
            .organization_id
            .clone();
        let call = match category {
            AssetCategory::Intercom | AssetCategory::DeskStation => Call::get(
                "list intercom devices",
                "api",
                format!("vinter/v1/user/organization/{org_id}/device"),
            ),
            AssetCategory::AccessController => Call::get(
                "list access controllers",
                "vcerberus",
                "access/v2/user/access_controllers",
            ),
            AssetCategory::Sensor => Call::post(
                "list sensors",
                "vsensor",
                "devices/list",
                json!({ "organizationId": org_id }),
            ),
            AssetCategory::MailroomSite => Call::get(
                "list mailroom sites",
                "vdoorman",
                format!("package_site/org/{org_id}"),
            ),
            AssetCategory::AlarmSite => Call::post(
                "list alarm sites",
                "vproresponse",
                "response/site/list",
                json!({ "includeResponseConfigs": true }),
            ),
            AssetCategory::AlarmDevice => Call::post(
                "list alarm devices",
                "vproconfig",
                "org/get_devices_and_alarm_systems",
                json!({}),
            ),
            AssetCategory::UnassignedDevice => Call::get(
                "list unassigned devices",
                "vconductor",
                format!("org/{org_id}/unassigned_devices"),
            ),
            AssetCategory::Camera | AssetCategory::GuestSite | AssetCategory::User => {
                return Err(DecomError::InvalidConfig {
                    reason: format!("{category} is not listed on the internal surface"),
                })
            }
        };

        let response = self.call(session, call).await?;
        let body: Value = response.json()?;
        let assets = records::normalize_collection(category, &body, &response.endpoint)?;
        debug!(category = %category, count = assets.len(), "internal listing");
        Ok(assets)
    }

    /// Delete one asset through the internal surface.
    ///
    /// Alarm sites take two calls: the embedded alarm system first, then the
    /// site itself. Needs a live key; its expiry bounds every retry.
    pub async fn delete(&self, session: &mut SessionContext, asset: &Asset) -> Result<()> {
        let deadline = session.require_live_key("delete asset", Utc::now())?.expires_at;
        let org_id = session
            .require_internal("delete asset")?
            .organization_id
            .clone();
        let id = asset.id.as_str();
        let call = match asset.category {
            AssetCategory::Sensor => Call::post(
                "decommission sensor",
                "vsensor",
                "devices/decommission",
                json!({ "deviceId": id, "sharding": true }),
            ),
            AssetCategory::Intercom | AssetCategory::DeskStation => Call::delete(
                "remove intercom device",
                "api",
                format!("vinter/v1/user/async/organization/{org_id}/device/{id}"),
            ),
            AssetCategory::MailroomSite => Call::delete(
                "delete mailroom site",
                "vdoorman",
                format!("package_site/org/{org_id}?siteId={id}"),
            ),
            AssetCategory::AccessController => Call::post(
                "decommission access controller",
                "vcerberus",
                "access_device/decommission",
                json!({ "deviceId": id, "sharding": true }),
            ),
            AssetCategory::Camera => Call::post(
                "decommission camera",
                "vprovision",
                "camera/decommission",
                json!({ "cameraId": id }),
            ),
            AssetCategory::GuestSite => Call::delete(
                "delete guest site",
                "vdoorman",
                format!("site/org/{org_id}?siteId={id}"),
            ),
            AssetCategory::AlarmDevice => Call::post(
                "decommission alarm device",
                "vproconfig",
                "device/decommission",
                json!({ "deviceId": id }),
            ),
            AssetCategory::AlarmSite => {
                let site_id = asset.site_id.clone().ok_or_else(|| DecomError::ClientRejected {
                    category: asset.category,
                    id: id.to_string(),
                    detail: "alarm site has no underlying site id".into(),
                })?;
                if let Some(system_id) = &asset.alarm_system_id {
                    self.call(
                        session,
                        Call::post(
                            "delete alarm system",
                            "vproconfig",
                            "alarm_system/delete",
                            json!({ "alarmSystemId": system_id }),
                        )
                        .until(deadline),
                    )
                    .await
                    .map_err(|e| delete_error(e, asset.category, id, &self.config.retry))?;
                    debug!(asset_id = %id, alarm_system_id = %system_id, "alarm system deleted");
                }
                Call::post(
                    "delete alarm site",
                    "vproresponse",
                    "response/site/delete",
                    json!({ "responseSiteId": id, "siteId": site_id }),
                )
            }
            AssetCategory::User | AssetCategory::UnassignedDevice => {
                return Err(DecomError::InvalidConfig {
                    reason: format!("{} are not deleted on the internal surface", asset.category.label()),
                })
            }
        };

        self.call(session, call.until(deadline))
            .await
            .map_err(|e| delete_error(e, asset.category, id, &self.config.retry))?;
        info!(category = %asset.category, asset_id = %id, "deleted");
        Ok(())
    }

    /// End the internal session server-side, then return to a blank
    /// context. A failed logout is logged and otherwise ignored.
    pub async fn logout(&self, session: &mut SessionContext) {
        if session.tokens().is_some() {
            let call = Call::post(
                "log out",
                "vprovision",
                "user/logout",
                json!({
                    "logoutCurrentEmailOnly": false,
                    "orgShortName": self.config.org_short_name,
                }),
            );
            match self.call(session, call).await {
                Ok(_) => info!(org = %self.config.org_short_name, "logged out"),
                Err(e) => warn!(error = %e, "logout failed"),
            }
        }
        session.reset();
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    fn login_payload(&self, credentials: &Credentials, otp: Option<&str>) -> Value {
        let mut payload = json!({
            "email": credentials.email,
            "org_short_name": self.config.org_short_name,
            "termsAcked": true,
            "password": credentials.password.expose_secret(),
            "shard": self.config.shard,
            "subdomain": true,
        });
        if let Some(otp) = otp {
            payload["otp"] = Value::from(otp);
        }
        payload
    }

    fn session_headers(&self, tokens: &SessionTokens) -> Result<HeaderMap> {
        let origin = self.config.command_origin();
        let pairs = [
            ("accept", "*/*".to_string()),
            ("cookie", tokens.cookie()),
            ("x-verkada-organization-id", tokens.organization_id.clone()),
            ("x-verkada-token", tokens.csrf().to_string()),
            ("x-verkada-user-id", tokens.user_id.clone()),
            ("referer", format!("{origin}/")),
            ("origin", origin),
        ];
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            let value = HeaderValue::from_str(&value).map_err(|_| DecomError::InvalidConfig {
                reason: format!("session value for `{name}` is not a valid header"),
            })?;
            headers.insert(HeaderName::from_static(name), value);
        }
        Ok(headers)
    }

    /// Send an authenticated request with retry, then apply the response's
    /// session side effects.
    async fn call(&self, session: &mut SessionContext, call: Call) -> Result<ApiResponse> {
        let headers = self.session_headers(session.require_internal(call.operation)?)?;
        let url = self.config.internal_url(call.service, &call.path);
        let policy = &self.config.retry;

        let http = &self.http;
        let headers = &headers;
        let url = url.as_str();
        let endpoint = call.path.as_str();
        let body = call.body.as_ref();
        let method = call.method.clone();

        let response = policy
            .execute(call.operation, call.deadline, move || {
                let mut request = http.request(method.clone(), url).headers(headers.clone());
                if let Some(body) = body {
                    request = request.json(body);
                }
                async move { send(request, endpoint).await?.retry_gate(policy) }
            })
            .await?;

        self.observe(session, &response, call.privileged)?;
        response.into_result(policy)
    }

    /// Session bookkeeping for every internal response: auth failures,
    /// CSRF rotation and cookie refresh.
    fn observe(&self, session: &mut SessionContext, response: &ApiResponse, privileged: bool) -> Result<()> {
        match response.status {
            401 => {
                session.expire_session("401 from internal surface");
                return Err(DecomError::SessionExpired {
                    detail: format!("{}: {}", response.endpoint, response.message()),
                });
            }
            403 if privileged => {
                return Err(DecomError::InsufficientPrivilege {
                    detail: format!("{}: {}", response.endpoint, response.message()),
                });
            }
            403 => {
                session.expire_session("403 from internal surface");
                return Err(DecomError::SessionExpired {
                    detail: format!("{}: {}", response.endpoint, response.message()),
                });
            }
            _ => {}
        }

        let header_csrf = response
            .headers
            .get("x-verkada-token")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let cookie_csrf = set_cookie_value(&response.headers, "token");
        if let (Some(header), Some(cookie)) = (&header_csrf, &cookie_csrf) {
            if header != cookie {
                session.expire_session("csrf token does not match session cookie");
                return Err(DecomError::SessionExpired {
                    detail: format!("{}: csrf token does not match session cookie", response.endpoint),
                });
            }
        }
        if let Some(csrf) = header_csrf.or(cookie_csrf) {
            session.rotate_csrf(&csrf);
        }
        if let Some(user_token) = set_cookie_value(&response.headers, "auth") {
            session.refresh_user_token(&user_token);
        }
        Ok(())
    }
}

fn parse_login(body: &Value, endpoint: &str) -> Result<SessionTokens> {
    let field = |key: &str| {
        text(body, &[key]).ok_or_else(|| DecomError::Decode {
            endpoint: endpoint.to_string(),
            reason: format!("login response missing `{key}`"),
        })
    };
    Ok(SessionTokens::new(
        field("userToken")?,
        field("csrfToken")?,
        field("organizationId")?,
        field("userId")?,
    ))
}

/// Value of cookie `name` among the response's `Set-Cookie` headers.
fn set_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
