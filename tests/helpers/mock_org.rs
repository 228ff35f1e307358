//! Mock organization using wiremock: both API surfaces on one local host.

#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use org_decommission::client::RetryPolicy;
use org_decommission::config::{Endpoints, RunConfig};
use org_decommission::session::Credentials;

pub const ORG: &str = "acme";
pub const ORG_ID: &str = "org-1";
pub const OPERATOR_ID: &str = "user-1";
pub const OPERATOR_EMAIL: &str = "admin@acme.example";
pub const API_KEY: &str = "key-abc";
pub const API_TOKEN: &str = "tok-1";

pub struct MockOrg {
    pub server: MockServer,
}

impl MockOrg {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Run config pointed at the mock, with millisecond retry delays.
    pub fn config(&self) -> RunConfig {
        let mut config = RunConfig::new(ORG);
        config.endpoints = Endpoints::single_host(&self.server.uri());
        config.retry = RetryPolicy::new(3, 1);
        config
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(OPERATOR_EMAIL, "hunter2")
    }

    pub fn internal(path_suffix: &str) -> String {
        format!("/__v/{ORG}/{path_suffix}")
    }

    pub fn login_body() -> Value {
        json!({
            "loggedIn": true,
            "userToken": "ut-1",
            "csrfToken": "csrf-1",
            "organizationId": ORG_ID,
            "userId": OPERATOR_ID,
        })
    }

    pub async fn mount_login(&self) {
        Mock::given(method("POST"))
            .and(path(Self::internal("user/login")))
            .respond_with(ResponseTemplate::new(200).set_body_json(Self::login_body()))
            .mount(&self.server)
            .await;
    }

    /// First submission asks for a second factor; `code` completes it.
    pub async fn mount_mfa_login(&self, code: &str) {
        Mock::given(method("POST"))
            .and(path(Self::internal("user/login")))
            .and(body_partial_json(json!({ "otp": code })))
            .respond_with(ResponseTemplate::new(200).set_body_json(Self::login_body()))
            .with_priority(1)
            .mount(&self.server)
            .await;
        Mock::given(method("POST"))
            .and(path(Self::internal("user/login")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "message": "mfa_required_for_org_admin",
                "data": { "smsSent": "+1 ***-***-1234" },
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_escalation(&self) {
        Mock::given(method("POST"))
            .and(path(Self::internal("access/v2/user/roles/modify")))
            .and(header("x-verkada-token", "csrf-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&self.server)
            .await;
        Mock::given(method("POST"))
            .and(path(Self::internal("org/settings/update")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_key_issuance(&self) {
        Mock::given(method("POST"))
            .and(path(Self::internal(&format!("admin/orgs/{ORG_ID}/v2/granular_apikeys"))))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "apiKey": API_KEY })))
            .mount(&self.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("x-api-key", API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": API_TOKEN })))
            .mount(&self.server)
            .await;
    }

    /// Login, escalation and key issuance all succeed.
    pub async fn mount_authorized(&self) {
        self.mount_login().await;
        self.mount_escalation().await;
        self.mount_key_issuance().await;
    }

    /// Listing content. Takes precedence over `mount_empty_org`.
    pub async fn mount_internal_listing(&self, http_method: &str, suffix: &str, body: Value) {
        self.internal_listing(http_method, suffix, body, 1).await;
    }

    /// Listing content. Takes precedence over `mount_empty_org`.
    pub async fn mount_public_listing(&self, route: &str, body: Value) {
        self.public_listing(route, body, 1).await;
    }

    /// Every category lists empty.
    pub async fn mount_empty_org(&self) {
        for (http_method, suffix, body) in [
            (
                "GET",
                format!("vinter/v1/user/organization/{ORG_ID}/device"),
                json!({ "intercoms": [], "deskApps": [] }),
            ),
            ("GET", "access/v2/user/access_controllers".to_string(), json!({ "accessControllers": [] })),
            ("POST", "devices/list".to_string(), json!({ "sensorDevice": [] })),
            ("GET", format!("package_site/org/{ORG_ID}"), json!({ "package_sites": [] })),
            ("POST", "response/site/list".to_string(), json!({ "responseSites": [] })),
            ("POST", "org/get_devices_and_alarm_systems".to_string(), json!({ "devices": [] })),
            ("GET", format!("org/{ORG_ID}/unassigned_devices"), json!({ "devices": [] })),
        ] {
            self.internal_listing(http_method, &suffix, body, 10).await;
        }
        self.public_listing("/cameras/v1/devices", json!({ "cameras": [] }), 10).await;
        self.public_listing("/guest/v1/sites", json!({ "guest_sites": [] }), 10).await;
        self.public_listing("/access/v1/access_users", json!({ "access_members": [] }), 10)
            .await;
    }

    async fn internal_listing(&self, http_method: &str, suffix: &str, body: Value, priority: u8) {
        Mock::given(method(http_method))
            .and(path(Self::internal(suffix)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .with_priority(priority)
            .mount(&self.server)
            .await;
    }

    async fn public_listing(&self, route: &str, body: Value, priority: u8) {
        Mock::given(method("GET"))
            .and(path(route))
            .and(header("x-verkada-auth", API_TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .with_priority(priority)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_user_delete(&self, user_id: &str, status: u16) {
        Mock::given(method("DELETE"))
            .and(path("/core/v1/user"))
            .and(query_param("user_id", user_id))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "message": "done" })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_logout(&self) {
        Mock::given(method("POST"))
            .and(path(Self::internal("user/logout")))
            .and(body_partial_json(json!({
                "logoutCurrentEmailOnly": false,
                "orgShortName": ORG,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Requests received whose path equals `route`.
    pub async fn hits(&self, route: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == route)
            .count()
    }

    pub async fn total_hits(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or_default()
    }
}
