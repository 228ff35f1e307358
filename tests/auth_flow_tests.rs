//! Login, second factor, escalation and key issuance against a mock org.

mod helpers;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use helpers::mock_org::{MockOrg, ORG_ID};
use org_decommission::client::{InternalClient, LoginOutcome};
use org_decommission::session::{AuthState, SessionContext};
use org_decommission::{DecomError, Orchestrator};

fn client_and_session(org: &MockOrg) -> (InternalClient, SessionContext) {
    let config = Arc::new(org.config());
    let session = SessionContext::from_config(&config);
    (InternalClient::new(config).unwrap(), session)
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_login_authenticates() {
    let org = MockOrg::start().await;
    org.mount_login().await;
    let (client, mut session) = client_and_session(&org);

    let outcome = client
        .submit_credentials(&mut session, org.credentials())
        .await
        .unwrap();

    assert_eq!(outcome, LoginOutcome::Authenticated);
    assert_eq!(session.state(), AuthState::Authenticated);
    assert_eq!(session.organization_id(), Some(ORG_ID));
    assert!(!session.is_elevated());
}

#[tokio::test]
async fn mfa_challenge_then_valid_code() {
    let org = MockOrg::start().await;
    org.mount_mfa_login("123456").await;
    let (client, mut session) = client_and_session(&org);

    let outcome = client
        .submit_credentials(&mut session, org.credentials())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        LoginOutcome::MfaRequired {
            sms_contact: Some("+1 ***-***-1234".into())
        }
    );
    assert_eq!(session.state(), AuthState::MfaRequired);

    client.submit_mfa_code(&mut session, "123456").await.unwrap();
    assert_eq!(session.state(), AuthState::Authenticated);
    assert!(session.challenge().is_none());
}

#[tokio::test]
async fn rejected_code_keeps_challenge_open() {
    let org = MockOrg::start().await;
    org.mount_mfa_login("123456").await;
    let (client, mut session) = client_and_session(&org);
    client
        .submit_credentials(&mut session, org.credentials())
        .await
        .unwrap();

    let err = client.submit_mfa_code(&mut session, "999999").await.unwrap_err();
    assert!(matches!(err, DecomError::MfaRejected { .. }));
    assert_eq!(session.state(), AuthState::MfaRequired);

    client.submit_mfa_code(&mut session, "123456").await.unwrap();
    assert_eq!(session.state(), AuthState::Authenticated);
}

#[tokio::test]
async fn expired_code_drops_the_challenge() {
    let org = MockOrg::start().await;
    Mock::given(method("POST"))
        .and(path(MockOrg::internal("user/login")))
        .and(body_partial_json(json!({ "otp": "111111" })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "message": "code expired" })))
        .with_priority(1)
        .mount(&org.server)
        .await;
    org.mount_mfa_login("123456").await;
    let (client, mut session) = client_and_session(&org);
    client
        .submit_credentials(&mut session, org.credentials())
        .await
        .unwrap();

    let err = client.submit_mfa_code(&mut session, "111111").await.unwrap_err();
    assert!(matches!(err, DecomError::MfaExpired));
    assert_eq!(session.state(), AuthState::Unauthenticated);
    assert!(session.challenge().is_none());

    // The old challenge cannot be answered any more.
    let err = client.submit_mfa_code(&mut session, "123456").await.unwrap_err();
    assert!(matches!(err, DecomError::InvalidState { .. }));
}

#[tokio::test]
async fn short_code_is_rejected_without_a_request() {
    let org = MockOrg::start().await;
    org.mount_mfa_login("123456").await;
    let (client, mut session) = client_and_session(&org);
    client
        .submit_credentials(&mut session, org.credentials())
        .await
        .unwrap();
    let before = org.total_hits().await;

    let err = client.submit_mfa_code(&mut session, "12a").await.unwrap_err();
    assert!(matches!(err, DecomError::MfaRejected { .. }));
    assert_eq!(org.total_hits().await, before);
}

#[tokio::test]
async fn wrong_password_fails_the_session() {
    let org = MockOrg::start().await;
    Mock::given(method("POST"))
        .and(path(MockOrg::internal("user/login")))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "invalid email or password" })),
        )
        .mount(&org.server)
        .await;
    let (client, mut session) = client_and_session(&org);

    let err = client
        .submit_credentials(&mut session, org.credentials())
        .await
        .unwrap_err();
    assert!(matches!(err, DecomError::InvalidCredentials { .. }));
    assert_eq!(session.state(), AuthState::AuthFailed);
}

#[tokio::test]
async fn login_outage_resets_for_a_retry() {
    let org = MockOrg::start().await;
    Mock::given(method("POST"))
        .and(path(MockOrg::internal("user/login")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&org.server)
        .await;
    let (client, mut session) = client_and_session(&org);

    let err = client
        .submit_credentials(&mut session, org.credentials())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(session.state(), AuthState::Unauthenticated);
}

// ---------------------------------------------------------------------------
// Escalation and key issuance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn key_issuance_requires_escalation_first() {
    let org = MockOrg::start().await;
    org.mount_authorized().await;
    let (client, mut session) = client_and_session(&org);
    client
        .submit_credentials(&mut session, org.credentials())
        .await
        .unwrap();

    let err = client.issue_ephemeral_key(&mut session).await.unwrap_err();
    assert!(matches!(err, DecomError::InvalidState { .. }));
    assert_eq!(
        org.hits(&MockOrg::internal(&format!("admin/orgs/{ORG_ID}/v2/granular_apikeys")))
            .await,
        0
    );
}

#[tokio::test]
async fn escalation_then_key_issuance() {
    let org = MockOrg::start().await;
    org.mount_authorized().await;
    let (client, mut session) = client_and_session(&org);
    client
        .submit_credentials(&mut session, org.credentials())
        .await
        .unwrap();

    client.escalate_privilege(&mut session).await.unwrap();
    assert!(session.is_elevated());
    let expires_at = client.issue_ephemeral_key(&mut session).await.unwrap();

    assert_eq!(session.state(), AuthState::KeyIssued);
    let key = session.key().unwrap();
    assert_eq!(key.expires_at, expires_at);
    assert_eq!((key.expires_at - key.issued_at).num_seconds(), 3600);
}

#[tokio::test]
async fn escalation_forbidden_is_insufficient_privilege() {
    let org = MockOrg::start().await;
    org.mount_login().await;
    Mock::given(method("POST"))
        .and(path(MockOrg::internal("access/v2/user/roles/modify")))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "message": "not an org admin" })))
        .mount(&org.server)
        .await;
    let (client, mut session) = client_and_session(&org);
    client
        .submit_credentials(&mut session, org.credentials())
        .await
        .unwrap();

    let err = client.escalate_privilege(&mut session).await.unwrap_err();
    assert!(matches!(err, DecomError::InsufficientPrivilege { .. }));
    assert!(err.is_fatal());
    assert!(!session.is_elevated());
    assert_eq!(session.state(), AuthState::Authenticated);
}

#[tokio::test]
async fn unauthorized_internal_call_expires_the_session() {
    let org = MockOrg::start().await;
    org.mount_login().await;
    Mock::given(method("POST"))
        .and(path(MockOrg::internal("access/v2/user/roles/modify")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&org.server)
        .await;
    let (client, mut session) = client_and_session(&org);
    client
        .submit_credentials(&mut session, org.credentials())
        .await
        .unwrap();

    let err = client.escalate_privilege(&mut session).await.unwrap_err();
    assert!(matches!(err, DecomError::SessionExpired { .. }));
    assert_eq!(session.state(), AuthState::Unauthenticated);
    assert!(session.organization_id().is_none());
}

#[tokio::test]
async fn csrf_header_disagreeing_with_cookie_expires_the_session() {
    let org = MockOrg::start().await;
    org.mount_login().await;
    Mock::given(method("POST"))
        .and(path(MockOrg::internal("access/v2/user/roles/modify")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-verkada-token", "csrf-other")
                .insert_header("set-cookie", "token=csrf-x; Path=/; Secure")
                .set_body_json(json!({})),
        )
        .mount(&org.server)
        .await;
    let (client, mut session) = client_and_session(&org);
    client
        .submit_credentials(&mut session, org.credentials())
        .await
        .unwrap();

    let err = client.escalate_privilege(&mut session).await.unwrap_err();
    assert!(matches!(err, DecomError::SessionExpired { .. }));
    assert_eq!(session.state(), AuthState::Unauthenticated);
    assert_eq!(
        org.hits(&MockOrg::internal("org/settings/update")).await,
        0
    );
}

#[tokio::test]
async fn rotated_csrf_token_is_sent_on_the_next_call() {
    let org = MockOrg::start().await;
    org.mount_login().await;
    Mock::given(method("POST"))
        .and(path(MockOrg::internal("access/v2/user/roles/modify")))
        .and(header("x-verkada-token", "csrf-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-verkada-token", "csrf-2")
                .set_body_json(json!({})),
        )
        .expect(1)
        .mount(&org.server)
        .await;
    Mock::given(method("POST"))
        .and(path(MockOrg::internal("org/settings/update")))
        .and(header("x-verkada-token", "csrf-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&org.server)
        .await;
    let (client, mut session) = client_and_session(&org);
    client
        .submit_credentials(&mut session, org.credentials())
        .await
        .unwrap();

    client.escalate_privilege(&mut session).await.unwrap();
    assert!(session.is_elevated());
}

#[tokio::test]
async fn key_limit_is_reported_as_such() {
    let org = MockOrg::start().await;
    org.mount_login().await;
    org.mount_escalation().await;
    Mock::given(method("POST"))
        .and(path(MockOrg::internal(&format!("admin/orgs/{ORG_ID}/v2/granular_apikeys"))))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "API keys limit reached" })),
        )
        .mount(&org.server)
        .await;
    let mut orchestrator = Orchestrator::new(org.config()).unwrap();
    orchestrator
        .begin_authentication(org.credentials())
        .await
        .unwrap();

    let err = orchestrator.authorize().await.unwrap_err();
    assert!(matches!(err, DecomError::KeyLimitExceeded { .. }));
    assert!(orchestrator.session().key().is_none());
}

#[tokio::test]
async fn orchestrator_authorize_exchanges_a_token() {
    let org = MockOrg::start().await;
    org.mount_authorized().await;
    let mut orchestrator = Orchestrator::new(org.config()).unwrap();
    orchestrator
        .begin_authentication(org.credentials())
        .await
        .unwrap();

    orchestrator.authorize().await.unwrap();

    assert_eq!(orchestrator.session().state(), AuthState::KeyIssued);
    // The token mock only answers to the issued key.
    assert_eq!(org.hits("/token").await, 1);

    orchestrator.finish().await;
    assert!(orchestrator.session().key().is_none());
}

#[tokio::test]
async fn finish_logs_out_and_clears_the_session() {
    let org = MockOrg::start().await;
    org.mount_authorized().await;
    org.mount_logout().await;
    let mut orchestrator = Orchestrator::new(org.config()).unwrap();
    orchestrator
        .begin_authentication(org.credentials())
        .await
        .unwrap();
    orchestrator.authorize().await.unwrap();

    orchestrator.finish().await;

    assert_eq!(org.hits(&MockOrg::internal("user/logout")).await, 1);
    let session = orchestrator.session();
    assert_eq!(session.state(), AuthState::Unauthenticated);
    assert!(session.key().is_none());
    assert!(session.organization_id().is_none());
    assert!(!session.is_elevated());
}

#[tokio::test]
async fn failed_logout_still_clears_the_session() {
    let org = MockOrg::start().await;
    org.mount_login().await;
    Mock::given(method("POST"))
        .and(path(MockOrg::internal("user/logout")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&org.server)
        .await;
    let (client, mut session) = client_and_session(&org);
    client
        .submit_credentials(&mut session, org.credentials())
        .await
        .unwrap();

    client.logout(&mut session).await;

    assert_eq!(session.state(), AuthState::Unauthenticated);
    assert!(session.organization_id().is_none());
}

#[tokio::test]
async fn logout_without_a_session_sends_nothing() {
    let org = MockOrg::start().await;
    let (client, mut session) = client_and_session(&org);

    client.logout(&mut session).await;

    assert_eq!(session.state(), AuthState::Unauthenticated);
    assert_eq!(org.total_hits().await, 0);
}
