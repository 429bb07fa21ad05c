#![allow(clippy::unwrap_used)]
// Session manager: region fallback, idempotent login, re-authentication.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dreamectl_core::{CoreError, OperationalState, Region, SessionManager, SessionState, VacuumClient};

use common::{cloud_config, forbid_all, mount_devices, mount_login};

async fn manager(de: &MockServer, cn: &MockServer) -> SessionManager {
    let config = cloud_config(de, cn);
    SessionManager::new(config.connection.clone(), config.transport())
}

// ── Region fallback ─────────────────────────────────────────────────

#[tokio::test]
async fn test_declared_region_succeeds_without_fallback() {
    let de = MockServer::start().await;
    let cn = MockServer::start().await;
    mount_login(&de, 1).await;
    forbid_all(&cn).await;

    let sessions = manager(&de, &cn).await;
    let session = sessions.login().await.unwrap();

    assert_eq!(session.region(), Some(Region::De));
    assert_eq!(sessions.state().await, SessionState::Active);
}

#[tokio::test]
async fn test_transport_failure_falls_back_to_cn() {
    let de = MockServer::start().await;
    let cn = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/iot/app/loginStep1"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&de)
        .await;
    mount_login(&cn, 1).await;

    let sessions = manager(&de, &cn).await;
    let session = sessions.login().await.unwrap();

    assert_eq!(session.region(), Some(Region::Cn));
}

#[tokio::test]
async fn test_denial_aborts_remaining_regions() {
    let de = MockServer::start().await;
    let cn = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/iot/app/loginStep1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "nonce": "n" })))
        .expect(1)
        .mount(&de)
        .await;
    Mock::given(method("POST"))
        .and(path("/iot/app/loginStep2"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&de)
        .await;
    forbid_all(&cn).await;

    let sessions = manager(&de, &cn).await;
    let result = sessions.login().await;

    assert!(matches!(result, Err(CoreError::Auth { .. })), "got: {result:?}");
    assert_eq!(sessions.state().await, SessionState::Terminated);
}

#[tokio::test]
async fn test_exhausted_regions_report_last_transport_cause() {
    let de = MockServer::start().await;
    let cn = MockServer::start().await;

    for server in [&de, &cn] {
        Mock::given(method("POST"))
            .and(path("/iot/app/loginStep1"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(server)
            .await;
    }

    let sessions = manager(&de, &cn).await;
    let err = sessions.login().await.unwrap_err();

    match err {
        CoreError::Transport { ref message } => {
            assert!(message.contains("every region"), "message: {message}");
        }
        other => panic!("expected Transport, got: {other:?}"),
    }
    assert_eq!(sessions.state().await, SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_login_after_logout_tries_declared_region_first() {
    let de = MockServer::start().await;
    let cn = MockServer::start().await;

    // `de` is down for the first attempt only.
    Mock::given(method("POST"))
        .and(path("/iot/app/loginStep1"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&de)
        .await;
    mount_login(&de, 1).await;
    mount_login(&cn, 1).await;

    let sessions = manager(&de, &cn).await;
    let first = sessions.login().await.unwrap();
    assert_eq!(first.region(), Some(Region::Cn));

    sessions.logout().await;
    let second = sessions.login().await.unwrap();
    assert_eq!(second.region(), Some(Region::De));
}

#[tokio::test]
async fn test_login_after_failure_tries_declared_region_first() {
    let de = MockServer::start().await;
    let cn = MockServer::start().await;

    for server in [&de, &cn] {
        Mock::given(method("POST"))
            .and(path("/iot/app/loginStep1"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(server)
            .await;
    }
    mount_login(&de, 1).await;

    let sessions = manager(&de, &cn).await;
    assert!(matches!(sessions.login().await, Err(CoreError::Transport { .. })));

    let session = sessions.login().await.unwrap();
    assert_eq!(session.region(), Some(Region::De));
}

// ── Idempotence ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_second_login_reuses_active_session() {
    let de = MockServer::start().await;
    let cn = MockServer::start().await;
    mount_login(&de, 1).await;

    let sessions = manager(&de, &cn).await;
    let first = sessions.login().await.unwrap();
    let second = sessions.login().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_current_session_requires_login() {
    let de = MockServer::start().await;
    let cn = MockServer::start().await;

    let sessions = manager(&de, &cn).await;
    let result = sessions.current_session().await;

    assert!(matches!(result, Err(CoreError::NotAuthenticated)));
    assert_eq!(sessions.state().await, SessionState::Unauthenticated);
}

// ── Re-authentication ───────────────────────────────────────────────

#[tokio::test]
async fn test_reauthenticate_replaces_stale_session_once() {
    let de = MockServer::start().await;
    let cn = MockServer::start().await;
    mount_login(&de, 2).await;

    let sessions = manager(&de, &cn).await;
    let stale = sessions.login().await.unwrap();

    let renewed = sessions.reauthenticate(&stale).await.unwrap();
    assert!(!Arc::ptr_eq(&stale, &renewed));
    assert_eq!(renewed.region(), Some(Region::De));

    // A second caller holding the same stale session gets the renewed one
    // without another login.
    let again = sessions.reauthenticate(&stale).await.unwrap();
    assert!(Arc::ptr_eq(&renewed, &again));
}

#[tokio::test]
async fn test_failed_reauthentication_terminates() {
    let de = MockServer::start().await;
    let cn = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/iot/app/loginStep1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "nonce": "n" })))
        .mount(&de)
        .await;
    // First step 2 succeeds, every later one is refused.
    Mock::given(method("POST"))
        .and(path("/iot/app/loginStep2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "sid": "s" })))
        .up_to_n_times(1)
        .mount(&de)
        .await;
    Mock::given(method("POST"))
        .and(path("/iot/app/loginStep2"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&de)
        .await;

    let sessions = manager(&de, &cn).await;
    let stale = sessions.login().await.unwrap();

    let result = sessions.reauthenticate(&stale).await;
    assert!(matches!(result, Err(CoreError::Auth { .. })), "got: {result:?}");
    assert_eq!(sessions.state().await, SessionState::Terminated);
    assert!(matches!(
        sessions.current_session().await,
        Err(CoreError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_concurrent_expiry_triggers_one_login() {
    let de = MockServer::start().await;
    let cn = MockServer::start().await;
    // Initial login plus exactly one renewal.
    mount_login(&de, 2).await;
    mount_devices(&de).await;

    // Both reads are in flight on the old session when it expires.
    Mock::given(method("POST"))
        .and(path("/device/getStatus"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(200)))
        .up_to_n_times(2)
        .expect(2)
        .mount(&de)
        .await;
    Mock::given(method("POST"))
        .and(path("/device/getStatus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "battery": 90, "state": "docked", "docked": true, "error": 0 }
        })))
        .expect(2)
        .mount(&de)
        .await;

    let client = VacuumClient::new(cloud_config(&de, &cn));
    client.connect().await.unwrap();

    let (a, b) = tokio::join!(client.status(), client.status());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.battery, Some(90));
    assert_eq!(b.state, Some(OperationalState::Docked));
    assert_eq!(client.session_state().await, SessionState::Active);
}
