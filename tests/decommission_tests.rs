//! End-to-end runs through the orchestrator against a mock organization.

mod helpers;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use helpers::mock_org::{MockOrg, OPERATOR_EMAIL, OPERATOR_ID, ORG_ID};
use org_decommission::decommission::{NoProgress, Selection, StopHandle};
use org_decommission::{AssetCategory, AssetRef, DecomError, ErrorCode, Orchestrator};

/// Three users besides the operator, two cameras of which one sits inside
/// the single intercom.
async fn mount_small_org(org: &MockOrg) {
    org.mount_authorized().await;
    org.mount_empty_org().await;
    org.mount_internal_listing(
        "GET",
        &format!("vinter/v1/user/organization/{ORG_ID}/device"),
        json!({
            "intercoms": [{ "deviceId": "ic-1", "name": "Lobby", "cameraId": "cam-2" }],
            "deskApps": [],
        }),
    )
    .await;
    org.mount_public_listing(
        "/cameras/v1/devices",
        json!({
            "cameras": [
                { "camera_id": "cam-1", "name": "Dock", "serial": "CAM-AAA" },
                { "camera_id": "cam-2", "name": "Lobby camera", "serial": "CAM-BBB" },
            ],
        }),
    )
    .await;
    org.mount_public_listing(
        "/access/v1/access_users",
        json!({
            "access_members": [
                { "user_id": OPERATOR_ID, "full_name": "Admin", "email": OPERATOR_EMAIL },
                { "user_id": "u-2", "full_name": "Ada Lovelace" },
                { "user_id": "u-3", "full_name": "Grace Hopper" },
                { "user_id": "u-4", "full_name": "Alan Turing" },
            ],
        }),
    )
    .await;
}

async fn authorized_orchestrator(org: &MockOrg) -> Orchestrator {
    let mut orchestrator = Orchestrator::new(org.config()).unwrap();
    orchestrator
        .begin_authentication(org.credentials())
        .await
        .unwrap();
    orchestrator.authorize().await.unwrap();
    orchestrator
}

#[tokio::test]
async fn scan_dedups_embedded_camera() {
    let org = MockOrg::start().await;
    mount_small_org(&org).await;
    let mut orchestrator = authorized_orchestrator(&org).await;

    let inventory = orchestrator.scan_inventory().await.unwrap();

    assert!(inventory.issues().is_empty());
    assert_eq!(inventory.count(AssetCategory::User), 3);
    assert_eq!(inventory.count(AssetCategory::Intercom), 1);
    let cameras: Vec<&str> = inventory
        .assets(AssetCategory::Camera)
        .iter()
        .map(|c| c.id.as_str())
        .collect();
    assert_eq!(cameras, vec!["cam-1"]);

    let intercom = AssetRef::new(AssetCategory::Intercom, "ic-1");
    let embedded: Vec<&str> = inventory
        .embedded_in(&intercom)
        .map(|a| a.id.as_str())
        .collect();
    assert_eq!(embedded, vec!["cam-2"]);
    assert_eq!(inventory.total(), 5);
}

#[tokio::test]
async fn failed_listing_is_reported_not_fatal() {
    let org = MockOrg::start().await;
    mount_small_org(&org).await;
    Mock::given(method("POST"))
        .and(path(MockOrg::internal("devices/list")))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&org.server)
        .await;
    let mut orchestrator = authorized_orchestrator(&org).await;

    let inventory = orchestrator.scan_inventory().await.unwrap();

    assert_eq!(inventory.issues().len(), 1);
    assert_eq!(inventory.issues()[0].category, AssetCategory::Sensor);
    assert_eq!(inventory.issues()[0].code, ErrorCode::TransientFailure);
    assert_eq!(inventory.count(AssetCategory::User), 3);
}

#[tokio::test]
async fn decommission_runs_in_order_and_reports_rejections() {
    let org = MockOrg::start().await;
    mount_small_org(&org).await;
    org.mount_user_delete("u-2", 200).await;
    org.mount_user_delete("u-3", 404).await;
    org.mount_user_delete("u-4", 200).await;
    Mock::given(method("DELETE"))
        .and(path(MockOrg::internal(&format!(
            "vinter/v1/user/async/organization/{ORG_ID}/device/ic-1"
        ))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&org.server)
        .await;
    Mock::given(method("POST"))
        .and(path(MockOrg::internal("camera/decommission")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&org.server)
        .await;

    let mut orchestrator = authorized_orchestrator(&org).await;
    orchestrator.scan_inventory().await.unwrap();
    let plan = orchestrator.plan(&Selection::all()).unwrap();
    assert_eq!(
        plan.categories(),
        vec![AssetCategory::User, AssetCategory::Intercom, AssetCategory::Camera]
    );

    let report = orchestrator
        .decommission(&plan, &mut NoProgress, &StopHandle::new())
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 4);
    assert_eq!(report.failed(), 1);
    assert!(report.halted.is_none());
    assert!(!report.is_complete());

    let users = report.result(AssetCategory::User).unwrap();
    assert_eq!(users.failed.len(), 1);
    assert_eq!(users.failed[0].id, "u-3");
    assert_eq!(users.failed[0].code, ErrorCode::ClientRejected);

    // The embedded camera goes with its intercom.
    let cameras = report.result(AssetCategory::Camera).unwrap();
    assert_eq!(cameras.succeeded, vec!["cam-1".to_string()]);

    // Intercoms are deleted only after every user.
    let requests = org.server.received_requests().await.unwrap();
    let position = |needle: &str| requests.iter().rposition(|r| r.url.path().contains(needle));
    let last_user = position("/core/v1/user").unwrap();
    let intercom = position("/device/ic-1").unwrap();
    let camera = position("camera/decommission").unwrap();
    assert!(last_user < intercom && intercom < camera);
}

#[tokio::test]
async fn stop_request_prevents_any_delete() {
    let org = MockOrg::start().await;
    mount_small_org(&org).await;
    let mut orchestrator = authorized_orchestrator(&org).await;
    orchestrator.scan_inventory().await.unwrap();
    let plan = orchestrator.plan(&Selection::all()).unwrap();

    let stop = StopHandle::new();
    stop.request_stop();
    let report = orchestrator
        .decommission(&plan, &mut NoProgress, &stop)
        .await
        .unwrap();

    assert!(report.stopped);
    assert_eq!(report.attempted(), 0);
    assert_eq!(report.not_attempted(), plan.total());
    assert_eq!(org.hits("/core/v1/user").await, 0);
}

#[tokio::test]
async fn decommission_needs_a_scan_and_a_key() {
    let org = MockOrg::start().await;
    mount_small_org(&org).await;
    let mut orchestrator = authorized_orchestrator(&org).await;

    let err = orchestrator.plan(&Selection::all()).unwrap_err();
    assert!(matches!(err, DecomError::InvalidState { .. }));

    orchestrator.scan_inventory().await.unwrap();
    let plan = orchestrator.plan(&Selection::all()).unwrap();
    orchestrator.finish().await;
    let err = orchestrator
        .decommission(&plan, &mut NoProgress, &StopHandle::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DecomError::InvalidState { .. }));
    assert_eq!(org.hits("/core/v1/user").await, 0);
}

#[tokio::test]
async fn reissued_key_gets_a_fresh_token() {
    let org = MockOrg::start().await;
    mount_small_org(&org).await;
    let mut orchestrator = authorized_orchestrator(&org).await;
    let first = orchestrator.session().key().unwrap().issued_at;

    orchestrator.reissue_key().await.unwrap();

    assert!(orchestrator.session().key().unwrap().issued_at >= first);
    assert_eq!(org.hits("/token").await, 2);
    // Escalation is not repeated for a new key.
    assert_eq!(
        org.hits(&MockOrg::internal("access/v2/user/roles/modify")).await,
        1
    );
}
